//! Machine context: admission, homing and the tick entry point.
//!
//! [`MotionCore`] owns the queue, the planner and the scheduler. The feeding
//! context calls [`MotionCore::enqueue_move`], [`MotionCore::request_home`] and
//! [`MotionCore::service`]; the timer context calls [`MotionCore::tick`]. The
//! embedding firmware serializes the two.

use heapless::Deque;
use libm::{ceilf, fabsf, sqrtf};

use crate::config::{
    validate_config, JamPolicy, MachineConfig, MachineParameters, ParameterOverrides,
};
use crate::error::{ConfigError, HomingError, MotionError, QueueError, Result};
use crate::kinematics::{Axis, AxisSet, GeometryResolver, Kinematics, Position, NUM_AXES};
use crate::motion::{
    JunctionPlanner, Move, MoveFlags, MoveQueue, PulseScheduler, Segmenter, StepSink,
    TickOutcome, ZCompensator,
};

use super::axis::{AxisState, HomeState};
use super::endstop::EndstopMonitor;
use super::homing::{HomingAction, HomingReport, HomingSession};
use super::state::{JamResponse, MotionEvent, RunState};

/// Pending events kept for the feeder; the oldest is dropped when full.
pub const EVENT_QUEUE_DEPTH: usize = 16;

/// Segments of an admitted move that are not queued yet.
#[derive(Debug, Clone, Copy)]
struct SegmentFeed {
    template: Move,
    from: Position,
    to: Position,
    count: usize,
    /// Next endpoint, 1-based.
    next: usize,
    /// Last queued endpoint and its actuator steps.
    last: (Position, [i32; NUM_AXES]),
    segment_length: f32,
}

/// Planner, scheduler and machine state of one machine.
pub struct MotionCore<S, M>
where
    S: StepSink,
    M: EndstopMonitor,
{
    config: MachineConfig,
    params: MachineParameters,
    resolver: GeometryResolver,
    planner: JunctionPlanner,
    segmenter: Segmenter,
    compensator: ZCompensator,
    queue: MoveQueue,
    scheduler: PulseScheduler,
    axes: [AxisState; NUM_AXES],
    sink: S,
    endstops: M,

    /// Logical end position of the last admitted move.
    planned_position: Position,
    /// Actuator end position of the last admitted move.
    planned_steps: [i32; NUM_AXES],
    next_id: u32,
    feed: Option<SegmentFeed>,

    homing: Option<HomingSession>,
    homing_triggered: AxisSet,
    last_homing: Option<HomingReport>,

    emergency_stopped: bool,
    paused: bool,
    door_open: bool,
    jam_blocked: bool,
    jam_factor: f32,

    events: Deque<MotionEvent, EVENT_QUEUE_DEPTH>,
}

impl<S, M> MotionCore<S, M>
where
    S: StepSink,
    M: EndstopMonitor,
{
    /// Create a core for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if validation fails.
    pub fn new(config: MachineConfig, sink: S, endstops: M) -> Result<Self> {
        validate_config(&config)?;

        let params = MachineParameters::from_config(&config);
        let resolver = GeometryResolver::new(
            Kinematics::from_config(&config.kinematics)?,
            params.steps_per_mm(),
        );
        let queue = MoveQueue::new(config.planner.queue_capacity);
        let segmenter = Segmenter::new(&config.planner);
        let planner = JunctionPlanner::new(&config.planner, &params);
        let compensator =
            ZCompensator::from_config(&config.leveling, resolver.kinematics().bed_radius())?;
        let scheduler = PulseScheduler::new(&config.stepper);

        let burst = if config.stepper.allow_quad_stepping { 4 } else { 2 };
        let ceiling = config.stepper.tick_frequency_hz.saturating_mul(burst) as f32;
        for axis in Axis::ALL {
            if params.axis(axis).max_step_rate > ceiling {
                warn!("{} max feedrate exceeds the tick rate; steps will lag", axis);
            }
        }

        info!(
            "motion core ready: queue {} slots, tick {} Hz",
            queue.capacity(),
            config.stepper.tick_frequency_hz
        );

        Ok(Self {
            config,
            params,
            resolver,
            planner,
            segmenter,
            compensator,
            queue,
            scheduler,
            axes: [AxisState::new(); NUM_AXES],
            sink,
            endstops,
            planned_position: Position::default(),
            planned_steps: [0; NUM_AXES],
            next_id: 0,
            feed: None,
            homing: None,
            homing_triggered: AxisSet::empty(),
            last_homing: None,
            emergency_stopped: false,
            paused: false,
            door_open: false,
            jam_blocked: false,
            jam_factor: 1.0,
            events: Deque::new(),
        })
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    /// Active configuration (with overrides applied).
    #[inline]
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Derived machine parameters.
    #[inline]
    pub fn parameters(&self) -> &MachineParameters {
        &self.params
    }

    /// Geometry resolver.
    #[inline]
    pub fn resolver(&self) -> &GeometryResolver {
        &self.resolver
    }

    /// Move queue.
    #[inline]
    pub fn queue(&self) -> &MoveQueue {
        &self.queue
    }

    /// Runtime state of one axis.
    #[inline]
    pub fn axis_state(&self, axis: Axis) -> &AxisState {
        &self.axes[axis.index()]
    }

    /// Actual actuator positions in steps.
    pub fn actuator_positions(&self) -> [i32; NUM_AXES] {
        self.axes.map(|a| a.position)
    }

    /// Machine-space position of the actuators (linear geometries only).
    pub fn position(&self) -> Option<Position> {
        self.resolver.forward(&self.actuator_positions())
    }

    /// Logical end position of the last admitted move.
    #[inline]
    pub fn planned_position(&self) -> Position {
        self.planned_position
    }

    /// Report of the last finished homing session.
    #[inline]
    pub fn last_homing_report(&self) -> Option<HomingReport> {
        self.last_homing
    }

    /// Z compensation applied to new moves.
    #[inline]
    pub fn compensator(&self) -> &ZCompensator {
        &self.compensator
    }

    /// Mutable Z compensation, e.g. to install a measured grid.
    #[inline]
    pub fn compensator_mut(&mut self) -> &mut ZCompensator {
        &mut self.compensator
    }

    /// Step output stage.
    #[inline]
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Endstop inputs.
    #[inline]
    pub fn endstops_mut(&mut self) -> &mut M {
        &mut self.endstops
    }

    /// Current run state.
    pub fn state(&self) -> RunState {
        if self.emergency_stopped {
            RunState::EmergencyStopped
        } else if self.jam_blocked {
            RunState::JamBlocked
        } else if self.door_open {
            RunState::DoorOpen
        } else if self.paused {
            RunState::Paused
        } else if self.homing.is_some() {
            RunState::Homing
        } else if self.is_busy() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    /// Whether moves are queued, executing or still being fed.
    #[inline]
    pub fn is_busy(&self) -> bool {
        !self.queue.is_empty() || self.scheduler.is_busy() || self.feed.is_some()
    }

    /// Whether any queued or executing move still steps `axis`.
    pub fn is_axis_moving(&self, axis: Axis) -> bool {
        let i = axis.index();
        if self.feed.is_some_and(|feed| feed.last.1[i] != self.planned_steps[i]) {
            return true;
        }
        let skip = match self.scheduler.cursor() {
            Some(cursor) if cursor.remaining(axis) > 0 => return true,
            Some(_) => 1,
            None => 0,
        };
        self.queue.iter().skip(skip).any(|m| m.steps[i] != 0)
    }

    /// Take the oldest pending event.
    pub fn poll_event(&mut self) -> Option<MotionEvent> {
        self.events.pop_front()
    }

    // ---------------------------------------------------------------------
    // Admission
    // ---------------------------------------------------------------------

    /// Queue a straight machine-space move to `target` at `feedrate` mm/s.
    ///
    /// # Errors
    ///
    /// - `MotionError::ReservedFlags` if `flags` contains `HOMING`
    /// - `MotionError` if admission is closed, an axis is not homed or a soft
    ///   limit rejects the target
    /// - `KinematicsError::Unreachable` if any endpoint is outside the envelope
    /// - `QueueError::Full` if the queue lacks room or the previous move is
    ///   still being fed; retry after some ticks
    ///
    /// On error nothing is queued. Long segmented moves are queued in
    /// batches; [`MotionCore::service`] feeds the rest as slots free up.
    pub fn enqueue_move(&mut self, target: Position, feedrate: f32, flags: MoveFlags) -> Result<()> {
        if !(feedrate > 0.0) {
            return Err(MotionError::InvalidFeedrate(feedrate).into());
        }
        if flags.contains(MoveFlags::HOMING) {
            return Err(MotionError::ReservedFlags.into());
        }
        self.check_admission()?;

        let target = self.apply_soft_limits(target)?;
        self.check_homed(&target)?;
        self.admit(target, feedrate, flags)
    }

    fn check_admission(&self) -> Result<()> {
        if self.emergency_stopped {
            return Err(MotionError::EmergencyStopped.into());
        }
        if self.paused || self.door_open || self.jam_blocked || self.homing.is_some() {
            return Err(MotionError::AdmissionClosed.into());
        }
        Ok(())
    }

    fn apply_soft_limits(&self, mut target: Position) -> Result<Position> {
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let Some(limits) = self.params.axis(axis).limits else {
                continue;
            };
            let requested = target.get(axis);
            let value = limits.apply(requested).ok_or(MotionError::SoftLimit {
                axis,
                position: requested,
                min: limits.min.0,
                max: limits.max.0,
            })?;
            target.set(axis, value);
        }
        Ok(target)
    }

    fn check_homed(&self, target: &Position) -> Result<()> {
        if !self.config.homing.require_homing {
            return Ok(());
        }

        let from = &self.planned_position;
        let changed = |axis: Axis| target.get(axis) != from.get(axis);
        let towers = self.resolver.is_nonlinear();
        let xyz_changed = [Axis::X, Axis::Y, Axis::Z].into_iter().any(changed);

        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let needed = if towers { xyz_changed } else { changed(axis) };
            if needed && !self.axes[axis.index()].is_homed() {
                return Err(MotionError::AxisNotHomed { axis }.into());
            }
        }
        Ok(())
    }

    /// Build and resolve a move from the planned position and start feeding
    /// its segments to the queue.
    fn admit(&mut self, target: Position, feedrate: f32, flags: MoveFlags) -> Result<()> {
        self.feed_segments()?;

        let from = self.planned_position;
        let mut d = [0.0f32; NUM_AXES];
        let (a, b) = (from.to_array(), target.to_array());
        for i in 0..NUM_AXES {
            d[i] = b[i] - a[i];
        }

        let xyz = sqrtf(d[0] * d[0] + d[1] * d[1] + d[2] * d[2]);
        let length = if xyz > 0.0 { xyz } else { fabsf(d[3]) };
        if length <= f32::EPSILON {
            trace!("zero-length move skipped");
            return Ok(());
        }

        let homing = flags.contains(MoveFlags::HOMING);
        let speed = if homing {
            feedrate
        } else {
            feedrate * self.config.planner.feedrate_multiplier * self.jam_factor
        };

        let mut template = Move {
            flags,
            unit: d.map(|v| v / length),
            length,
            requested_feedrate: speed,
            ..Move::EMPTY
        };
        self.planner.apply_limits(&mut template, &self.params);
        if !homing && self.planner.clamp_low_water(&mut template, self.queue.len()) {
            debug!("low water: cruise reduced to {} mm/s", template.cruise);
        }

        let travel = flags.contains(MoveFlags::TRAVEL);
        let count = self.segment_count(&from, &target, length, template.cruise, travel);

        // Every endpoint must resolve before anything is queued.
        let mut final_steps = self.planned_steps;
        for point in Segmenter::endpoints(from, target, count) {
            final_steps = self.resolve_compensated(&point)?;
        }
        if self.feed.is_some() {
            return Err(QueueError::Full { needed: 1, free: 0 }.into());
        }
        self.queue.reserve(1)?;

        if count > 1 {
            trace!("move split into {} segments", count);
        }
        self.feed = Some(SegmentFeed {
            template,
            from,
            to: target,
            count,
            next: 1,
            last: (from, self.planned_steps),
            segment_length: length / count as f32,
        });
        self.planned_position = target;
        self.planned_steps = final_steps;
        self.feed_segments()
    }

    /// Segments needed for a straight move.
    ///
    /// Nonlinear geometries follow the segment rate. Linear geometries are
    /// split only while a distortion grid applies, so the correction follows
    /// the grid between its nodes.
    fn segment_count(&self, from: &Position, to: &Position, length: f32, speed: f32, travel: bool) -> usize {
        if self.resolver.is_nonlinear() {
            return self.segmenter.segment_count(length, speed, travel);
        }
        let Some(max_length) = self.compensator.max_segment_length() else {
            return 1;
        };
        if self.compensator.degrade(from.z) == 0.0 && self.compensator.degrade(to.z) == 0.0 {
            return 1;
        }
        let (dx, dy) = (to.x - from.x, to.y - from.y);
        (ceilf(sqrtf(dx * dx + dy * dy) / max_length) as usize).max(1)
    }

    /// Queue the next batch of the move being fed, as far as slots allow.
    fn feed_segments(&mut self) -> Result<()> {
        let Some(mut feed) = self.feed.take() else {
            return Ok(());
        };

        let mut pushed = 0;
        while feed.next <= feed.count && pushed < self.segmenter.batch() && self.queue.free() > 0 {
            let point = Segmenter::endpoint(feed.from, feed.to, feed.count, feed.next);
            let steps = match self.resolve_compensated(&point) {
                Ok(steps) => steps,
                Err(e) => {
                    // The compensation changed since admission.
                    self.planned_position = feed.last.0;
                    self.planned_steps = feed.last.1;
                    return Err(e);
                }
            };
            self.push_segment(&feed.template, feed.last, (point, steps), feed.segment_length)?;
            feed.last = (point, steps);
            feed.next += 1;
            pushed += 1;
        }

        if pushed > 0 {
            self.planner.replan(&mut self.queue);
        }
        if feed.next <= feed.count {
            self.feed = Some(feed);
        }
        Ok(())
    }

    fn resolve_compensated(&self, p: &Position) -> Result<[i32; NUM_AXES]> {
        let mut q = *p;
        q.z += self.compensator.correct(p.x, p.y, p.z);
        self.resolver.resolve(&q)
    }

    fn push_segment(
        &mut self,
        template: &Move,
        from: (Position, [i32; NUM_AXES]),
        to: (Position, [i32; NUM_AXES]),
        length: f32,
    ) -> Result<()> {
        let mut steps = [0i32; NUM_AXES];
        for i in 0..NUM_AXES {
            steps[i] = to.1[i] - from.1[i];
        }
        let logical = {
            let (a, b) = (from.0.to_array(), to.0.to_array());
            let mut l = [0.0; NUM_AXES];
            for i in 0..NUM_AXES {
                l[i] = b[i] - a[i];
            }
            Position::from_array(l)
        };

        let primary_steps = self.resolver.primary_steps(&steps, &logical);
        if primary_steps == 0 {
            return Ok(());
        }

        let mut mv = Move {
            id: self.next_id,
            from: from.0,
            to: to.0,
            steps,
            target: to.1,
            primary_steps,
            primary_axis: primary_axis(&steps),
            length,
            ..*template
        };
        self.planner.link(self.queue.tail(), &mut mv);
        self.queue.push(mv)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(())
    }

    /// Queue a homing move of `distance` mm on every axis of `axes`,
    /// relative to the current actuators.
    fn enqueue_seek(&mut self, axes: AxisSet, distance: f32, feedrate: f32) -> Result<()> {
        let mut steps = [0i32; NUM_AXES];
        let mut logical = Position::default();
        let mut lead = Axis::Z;
        for axis in axes.axes() {
            let delta = self.resolver.homing_delta(axis, distance);
            for i in 0..NUM_AXES {
                steps[i] += delta[i];
            }
            logical.set(axis, distance);
            lead = axis;
        }
        let primary_steps = self.resolver.primary_steps(&steps, &logical);
        if primary_steps == 0 {
            return Ok(());
        }

        let mut target = self.planned_steps;
        for i in 0..NUM_AXES {
            target[i] += steps[i];
        }
        // Towers moving together travel like a Z move.
        let mut unit = [0.0; NUM_AXES];
        unit[lead.index()] = if distance < 0.0 { -1.0 } else { 1.0 };

        let to = self.resolver.forward(&target).unwrap_or(self.planned_position);
        let mut mv = Move {
            id: self.next_id,
            flags: MoveFlags::HOMING,
            from: self.planned_position,
            to,
            steps,
            target,
            primary_steps,
            primary_axis: primary_axis(&steps),
            unit,
            length: fabsf(distance),
            requested_feedrate: feedrate,
            ..Move::EMPTY
        };
        self.planner.apply_limits(&mut mv, &self.params);
        self.planner.link(self.queue.tail(), &mut mv);
        self.queue.push(mv)?;
        self.next_id = self.next_id.wrapping_add(1);

        self.planned_steps = target;
        self.planned_position = to;
        self.planner.replan(&mut self.queue);
        Ok(())
    }

    /// Re-run the junction planner over the queue. Returns the number of
    /// moves whose speeds changed.
    pub fn replan(&mut self) -> usize {
        self.planner.replan(&mut self.queue)
    }

    // ---------------------------------------------------------------------
    // Homing
    // ---------------------------------------------------------------------

    /// Start homing `axes` in the configured order.
    ///
    /// Delta machines always home all three towers, moving them together so
    /// each carriage stops on its own endstop. The session is advanced by
    /// [`MotionCore::service`].
    ///
    /// # Errors
    ///
    /// - `HomingError::InProgress` if a session is running
    /// - `HomingError::NoEndstop` if a requested axis has no endstop
    /// - `MotionError::Busy` if moves are still queued
    pub fn request_home(&mut self, axes: AxisSet) -> Result<()> {
        if self.homing.is_some() {
            return Err(HomingError::InProgress.into());
        }
        if self.paused || self.door_open || self.jam_blocked {
            return Err(MotionError::AdmissionClosed.into());
        }
        if self.is_busy() {
            return Err(MotionError::Busy.into());
        }

        let mut axes = axes & AxisSet::XYZ;
        if self.resolver.is_nonlinear() && !axes.is_empty() {
            axes = AxisSet::XYZ;
        }
        for axis in axes.axes() {
            if self.config.axis(axis).endstop.is_none() || !self.endstops.has_endstop(axis) {
                return Err(HomingError::NoEndstop { axis }.into());
            }
        }

        self.emergency_stopped = false;
        for axis in axes.axes() {
            self.axes[axis.index()].home = HomeState::Unknown;
        }
        let group = match self.resolver.kinematics() {
            Kinematics::Delta(_) => AxisSet::XYZ,
            _ => AxisSet::empty(),
        };
        self.homing = Some(HomingSession::new(&self.config.homing.order, axes, group));
        self.homing_triggered = AxisSet::empty();
        info!("homing started (axes {})", axes.bits());

        self.service()
    }

    /// Open the probe-heat gate of a waiting homing session.
    pub fn on_probe_heated(&mut self) {
        if let Some(session) = self.homing.as_mut() {
            session.on_probe_heated();
        }
    }

    /// Advance background work from the feeding context.
    ///
    /// Queues further segments of a long move and issues the next homing
    /// move once the previous one has finished.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped segment feeding or aborted the homing
    /// session, if any.
    pub fn service(&mut self) -> Result<()> {
        self.feed_segments()?;
        if self.homing.is_none() || self.is_busy() {
            return Ok(());
        }
        // Axes halted on their endstops stop short of the planned target.
        self.planned_steps = self.actuator_positions();

        let towers = self.resolver.is_nonlinear();
        loop {
            let Some(session) = self.homing.as_mut() else {
                return Ok(());
            };
            let action = session.next_action(&self.config, towers, self.homing_triggered);

            let step = match action {
                HomingAction::Seek {
                    axes,
                    distance,
                    feedrate,
                    ..
                } => {
                    self.homing_triggered = AxisSet::empty();
                    self.enqueue_seek(axes, distance, feedrate)
                }
                HomingAction::Settle { axes } => self.settle(axes),
                HomingAction::MoveTo {
                    axis,
                    position,
                    feedrate,
                } => {
                    let mut target = self.planned_position;
                    target.set(axis, position);
                    self.admit(target, feedrate, MoveFlags::HOMING)
                }
                HomingAction::AxisFailed { axes } => {
                    for axis in axes.axes() {
                        warn!("homing: endstop of {} not found", axis);
                        self.axes[axis.index()].home = HomeState::Failed;
                        self.push_event(MotionEvent::EndstopNotFound { axis });
                    }
                    Ok(())
                }
                HomingAction::AwaitProbeHeat => return Ok(()),
                HomingAction::Finished(report) => {
                    info!(
                        "homing finished (homed {}, failed {})",
                        report.homed.bits(),
                        report.failed.bits()
                    );
                    self.homing = None;
                    self.last_homing = Some(report);
                    self.push_event(MotionEvent::HomingFinished(report));
                    return Ok(());
                }
            };

            if let Err(e) = step {
                self.homing = None;
                return Err(e);
            }
            if self.is_busy() {
                return Ok(());
            }
        }
    }

    /// Set `axes` to their home positions after their endstops triggered.
    fn settle(&mut self, axes: AxisSet) -> Result<()> {
        if self.resolver.is_nonlinear() {
            let home = self.tower_home_position();
            let steps = self.resolver.resolve(&home)?;
            for axis in axes.axes() {
                let i = axis.index();
                self.axes[i].position = steps[i] + self.config.axis(axis).endstop_offset_steps;
                self.planned_steps[i] = self.axes[i].position;
                self.axes[i].home = HomeState::Homed;
            }

            let all = [Axis::X, Axis::Y, Axis::Z];
            if all.iter().all(|a| self.axes[a.index()].is_homed()) {
                self.planned_position = home.with_e(self.planned_position.e);
            }
        } else {
            for axis in axes.axes() {
                let actual = self.actuator_positions();
                let mut logical = self.resolver.forward(&actual).unwrap_or(self.planned_position);
                logical.set(axis, self.config.axis(axis).home_position().0);
                let steps = self.resolver.resolve(&logical)?;
                for (state, s) in self.axes.iter_mut().zip(steps) {
                    state.position = s;
                }
                self.planned_steps = steps;
                self.planned_position = logical;
                self.axes[axis.index()].home = HomeState::Homed;
            }
        }
        debug!("homing: axes {} settled", axes.bits());
        Ok(())
    }

    /// Machine-space position with every tower at its endstop.
    fn tower_home_position(&self) -> Position {
        let z = self.config.axes.z.home_position().0;
        match self.resolver.kinematics() {
            Kinematics::Delta(_) => Position::xyz(0.0, 0.0, z),
            _ => Position::xyz(
                self.config.axes.x.home_position().0,
                self.config.axes.y.home_position().0,
                z,
            ),
        }
    }

    // ---------------------------------------------------------------------
    // Real-time entry point
    // ---------------------------------------------------------------------

    /// Run one scheduler tick. Call at `tick_frequency_hz`.
    pub fn tick(&mut self) -> TickOutcome {
        if let Some(head) = self.queue.head().copied() {
            if head.flags.contains(MoveFlags::HOMING) {
                let watched = self
                    .homing
                    .as_ref()
                    .map_or(AxisSet::empty(), HomingSession::watched_axes);
                if !watched.is_empty() && self.check_homing_endstops(watched) {
                    return self.abort_motion(None);
                }
            } else if head.flags.contains(MoveFlags::PROBE) {
                if self.endstops.probe_triggered() {
                    let progress = self.scheduler.cursor().map(|c| c.progress()).unwrap_or(0.0);
                    let position = head.from.lerp(&head.to, progress);
                    let outcome = self.abort_motion(Some(position));
                    info!("probe triggered at z = {}", position.z);
                    self.push_event(MotionEvent::ProbeTriggered {
                        position,
                        steps: self.actuator_positions(),
                    });
                    return outcome;
                }
            } else if self.config.safety.always_check_endstops {
                self.check_endstops_in_motion();
            }

            let outcome = self.scheduler.tick(&mut self.queue, &mut self.axes, &mut self.sink);
            if outcome.completed == Some(head.id) && head.flags.contains(MoveFlags::PROBE) {
                warn!("probe move finished without trigger");
                self.push_event(MotionEvent::ProbeNotTriggered);
            }
            self.handle_disabled(outcome.disabled);
            return outcome;
        }

        let outcome = self.scheduler.tick(&mut self.queue, &mut self.axes, &mut self.sink);
        self.handle_disabled(outcome.disabled);
        outcome
    }

    /// Halt each watched axis on its endstop. Returns whether all stopped.
    fn check_homing_endstops(&mut self, watched: AxisSet) -> bool {
        for axis in watched.axes() {
            if !self.endstops.is_triggered(axis) {
                continue;
            }
            if !self.homing_triggered.has(axis) {
                trace!("homing: {} endstop hit", axis);
                self.homing_triggered |= axis.set();
            }
            if let Some(cursor) = self.scheduler.cursor_mut() {
                cursor.halt_axis(axis);
            }
        }
        self.homing_triggered.contains(watched)
    }

    fn check_endstops_in_motion(&mut self) {
        let Some(cursor) = self.scheduler.cursor_mut() else {
            return;
        };
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            if cursor.remaining(axis) == 0
                || !self.resolver.is_direct(axis)
                || !self.endstops.has_endstop(axis)
            {
                continue;
            }
            let toward_switch = cursor.direction(axis).sign() as f32
                == self.config.axis(axis).home_direction.sign();
            if toward_switch && self.endstops.is_triggered(axis) {
                warn!("endstop {} hit during move", axis);
                cursor.halt_axis(axis);
                self.axes[axis.index()].home = HomeState::Unknown;
                push_event(&mut self.events, MotionEvent::EndstopHit { axis });
            }
        }
    }

    fn handle_disabled(&mut self, disabled: AxisSet) {
        if disabled.is_empty() {
            return;
        }
        let positioning = disabled & AxisSet::XYZ;
        let lost = if self.resolver.is_nonlinear() && !positioning.is_empty() {
            AxisSet::XYZ
        } else {
            positioning
        };
        for axis in lost.axes() {
            self.axes[axis.index()].home = HomeState::Unknown;
        }
        info!("motors disabled after inactivity ({})", disabled.bits());
        self.push_event(MotionEvent::MotorsDisabled(disabled));
    }

    /// Drop all motion and resync the plan to the actuators.
    fn abort_motion(&mut self, position: Option<Position>) -> TickOutcome {
        let completed = self.queue.head().map(|m| m.id);
        self.feed = None;
        self.queue.clear();
        self.scheduler.reset();
        self.resync(position);
        TickOutcome {
            completed,
            multiplier: 1,
            ..TickOutcome::default()
        }
    }

    fn resync(&mut self, position: Option<Position>) {
        self.planned_steps = self.actuator_positions();
        if let Some(p) = position {
            self.planned_position = p;
        } else if let Some(mut p) = self.resolver.forward(&self.planned_steps) {
            p.z -= self.compensator.correct(p.x, p.y, p.z);
            self.planned_position = p;
        }
    }

    // ---------------------------------------------------------------------
    // Operator and safety inputs
    // ---------------------------------------------------------------------

    /// Stop immediately: clear the queue, drop the executing move and require
    /// a re-home before new moves are admitted.
    pub fn emergency_stop(&mut self) {
        error!("emergency stop");
        self.feed = None;
        self.queue.clear();
        self.scheduler.reset();
        self.homing = None;
        self.homing_triggered = AxisSet::empty();
        self.emergency_stopped = true;
        for state in self.axes.iter_mut() {
            state.home = HomeState::Unknown;
        }
        self.resync(None);
        self.push_event(MotionEvent::EmergencyStop);
    }

    /// Stop admitting moves; queued moves drain.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Reopen admission after a pause or a blocking jam.
    pub fn resume(&mut self) {
        self.paused = false;
        self.jam_blocked = false;
        self.jam_factor = 1.0;
        for state in self.axes.iter_mut() {
            state.jammed = false;
        }
    }

    /// Door opened: stop admitting moves.
    pub fn on_door_open(&mut self) {
        self.door_open = true;
    }

    /// Door closed: admission reopens unless otherwise blocked.
    pub fn on_door_closed(&mut self) {
        self.door_open = false;
    }

    /// Apply the configured jam policy to a jam on `axis`.
    pub fn on_jam_detected(&mut self, axis: Axis) -> JamResponse {
        let policy = self.config.safety.jam_policy;
        self.axes[axis.index()].jammed = true;
        warn!("jam on {}", axis);

        let response = match policy {
            JamPolicy::MarkOnly => JamResponse::Marked,
            JamPolicy::BlockAndAlert => {
                self.jam_blocked = true;
                JamResponse::Blocked
            }
            JamPolicy::NotifyAndContinue => {
                let percent = self.config.safety.jam_slowdown_percent;
                self.jam_factor = f32::from(percent) / 100.0;
                JamResponse::SlowedDown { percent }
            }
        };
        self.push_event(MotionEvent::JamDetected { axis, policy });
        response
    }

    /// Change the factor applied to the feedrate of new moves.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFeedrateMultiplier` unless `factor > 0`.
    pub fn set_feedrate_multiplier(&mut self, factor: f32) -> Result<()> {
        if !(factor > 0.0) {
            return Err(ConfigError::InvalidFeedrateMultiplier(factor).into());
        }
        self.config.planner.feedrate_multiplier = factor;
        Ok(())
    }

    /// Apply a parameter override table at runtime.
    ///
    /// The actuator positions are re-expressed in the new calibration so the
    /// machine-space position is kept.
    ///
    /// # Errors
    ///
    /// - `MotionError::Busy` unless the queue is idle and no homing runs
    /// - a configuration error if the result does not validate
    pub fn apply_overrides(&mut self, overrides: &ParameterOverrides) -> Result<()> {
        if self.is_busy() || self.homing.is_some() {
            return Err(MotionError::Busy.into());
        }
        let config = self.config.with_overrides(overrides)?;
        let kinematics = Kinematics::from_config(&config.kinematics)?;

        self.params = MachineParameters::from_config(&config);
        self.resolver = GeometryResolver::new(kinematics, self.params.steps_per_mm());
        self.planner = JunctionPlanner::new(&config.planner, &self.params);
        self.segmenter = Segmenter::new(&config.planner);
        self.config = config;

        match self.resolve_compensated(&self.planned_position) {
            Ok(steps) => {
                for (state, s) in self.axes.iter_mut().zip(steps) {
                    state.position = s;
                }
                self.planned_steps = steps;
            }
            Err(_) => {
                warn!("position unreachable after overrides, re-home required");
                for axis in [Axis::X, Axis::Y, Axis::Z] {
                    self.axes[axis.index()].home = HomeState::Unknown;
                }
                self.planned_steps = self.actuator_positions();
            }
        }
        info!("parameter overrides applied");
        Ok(())
    }

    fn push_event(&mut self, event: MotionEvent) {
        push_event(&mut self.events, event);
    }
}

fn push_event(events: &mut Deque<MotionEvent, EVENT_QUEUE_DEPTH>, event: MotionEvent) {
    if events.is_full() {
        events.pop_front();
    }
    // Cannot fail after making room.
    let _ = events.push_back(event);
}

/// Axis with the largest step delta.
fn primary_axis(steps: &[i32; NUM_AXES]) -> Axis {
    let mut best = Axis::X;
    for axis in Axis::ALL {
        if steps[axis.index()].unsigned_abs() > steps[best.index()].unsigned_abs() {
            best = axis;
        }
    }
    best
}
