//! Fixed-rate pulse scheduler.
//!
//! Called once per timer tick from the real-time context. Each call does a
//! bounded amount of work: at most one step event of up to four primary steps.

use crate::config::StepperConfig;
use crate::kinematics::{Axis, AxisSet, NUM_AXES};
use crate::machine::AxisState;

use super::executor::MoveCursor;
use super::profile::Direction;
use super::queue::MoveQueue;

/// Output stage receiving direction and step commands.
pub trait StepSink {
    /// Set the direction of an axis before its next step.
    fn set_direction(&mut self, axis: Axis, direction: Direction);

    /// Pulse the step outputs of every axis in `axes` once.
    fn step(&mut self, axes: AxisSet);

    /// Enable or disable an axis driver.
    fn set_enabled(&mut self, axis: Axis, enabled: bool) {
        let _ = (axis, enabled);
    }

    /// Wait between the steps of one doubled or quadrupled step event.
    fn pulse_gap(&mut self) {}
}

/// Primary steps issued per step event at `rate` steps/s.
///
/// Above `threshold` steps are doubled; above twice the threshold they are
/// quadrupled when allowed.
pub fn step_multiplier(rate: f32, threshold: f32, allow_quad: bool) -> u32 {
    if allow_quad && rate > 2.0 * threshold {
        4
    } else if rate > threshold {
        2
    } else {
        1
    }
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    /// Move that started executing on this tick.
    pub started: Option<u32>,
    /// Move that finished on this tick.
    pub completed: Option<u32>,
    /// Axes that stepped.
    pub stepped: AxisSet,
    /// Primary steps issued.
    pub primary_steps: u32,
    /// Step multiplier in effect.
    pub multiplier: u32,
    /// Axes disabled by the inactivity timeout.
    pub disabled: AxisSet,
}

/// Drains the move queue head at the tick rate.
#[derive(Debug, Clone)]
pub struct PulseScheduler {
    tick_period: f32,
    doubler_threshold: f32,
    allow_quad: bool,
    inactive_ticks: Option<u32>,
    cursor: Option<MoveCursor>,
}

impl PulseScheduler {
    /// Create a scheduler from stepper configuration.
    pub fn new(config: &StepperConfig) -> Self {
        Self {
            tick_period: 1.0 / config.tick_frequency_hz.max(1) as f32,
            doubler_threshold: config.step_doubler_frequency_hz as f32,
            allow_quad: config.allow_quad_stepping,
            inactive_ticks: config.inactive_ticks(),
            cursor: None,
        }
    }

    /// Tick period in seconds.
    #[inline]
    pub fn tick_period(&self) -> f32 {
        self.tick_period
    }

    /// Inactivity timeout in ticks.
    #[inline]
    pub fn inactive_ticks(&self) -> Option<u32> {
        self.inactive_ticks
    }

    /// Cursor of the executing head, if any.
    #[inline]
    pub fn cursor(&self) -> Option<&MoveCursor> {
        self.cursor.as_ref()
    }

    /// Mutable cursor of the executing head.
    #[inline]
    pub fn cursor_mut(&mut self) -> Option<&mut MoveCursor> {
        self.cursor.as_mut()
    }

    /// Whether a move is executing.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.cursor.is_some()
    }

    /// Drop the executing move without popping it.
    pub fn reset(&mut self) {
        self.cursor = None;
    }

    /// Run one tick.
    pub fn tick<S: StepSink>(
        &mut self,
        queue: &mut MoveQueue,
        axes: &mut [AxisState; NUM_AXES],
        sink: &mut S,
    ) -> TickOutcome {
        let mut outcome = TickOutcome {
            multiplier: 1,
            ..TickOutcome::default()
        };

        if self.cursor.is_none() {
            if let Some(head) = queue.head_mut() {
                head.started = true;
                let head = *head;
                let cursor = MoveCursor::begin(&head, axes);
                for axis in head.axes().axes() {
                    let state = &mut axes[axis.index()];
                    sink.set_direction(axis, cursor.direction(axis));
                    if !state.enabled {
                        sink.set_enabled(axis, true);
                        state.enabled = true;
                    }
                }
                trace!("move {} started", head.id);
                outcome.started = Some(head.id);
                self.cursor = Some(cursor);
            }
        }

        if let Some(cursor) = self.cursor.as_mut() {
            cursor.ramp(self.tick_period);
            let multiplier = step_multiplier(cursor.rate(), self.doubler_threshold, self.allow_quad);
            let due = cursor.take_due(self.tick_period, multiplier);
            for i in 0..due {
                if i > 0 {
                    sink.pulse_gap();
                }
                let stepped = cursor.step_primary(axes);
                if !stepped.is_empty() {
                    sink.step(stepped);
                    outcome.stepped |= stepped;
                }
            }
            outcome.primary_steps = due;
            outcome.multiplier = multiplier;

            if cursor.is_done() {
                let id = cursor.id();
                self.cursor = None;
                queue.pop();
                trace!("move {} completed", id);
                outcome.completed = Some(id);
            }
        }

        for axis in Axis::ALL {
            let state = &mut axes[axis.index()];
            if outcome.stepped.has(axis) || self.moving(axis) {
                state.touch(self.inactive_ticks);
            } else if state.idle_tick() {
                sink.set_enabled(axis, false);
                state.enabled = false;
                outcome.disabled |= axis.set();
            }
        }

        outcome
    }

    fn moving(&self, axis: Axis) -> bool {
        self.cursor
            .as_ref()
            .map(|c| c.remaining(axis) > 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::block::Move;
    use crate::motion::profile::MotionProfile;

    #[derive(Default)]
    struct Recorder {
        steps: [i32; NUM_AXES],
        directions: [i32; NUM_AXES],
        gaps: u32,
        disabled: AxisSet,
    }

    impl StepSink for Recorder {
        fn set_direction(&mut self, axis: Axis, direction: Direction) {
            self.directions[axis.index()] = direction.sign();
        }

        fn step(&mut self, axes: AxisSet) {
            for axis in axes.axes() {
                self.steps[axis.index()] += self.directions[axis.index()];
            }
        }

        fn set_enabled(&mut self, axis: Axis, enabled: bool) {
            if !enabled {
                self.disabled |= axis.set();
            }
        }

        fn pulse_gap(&mut self) {
            self.gaps += 1;
        }
    }

    fn cruise_move(id: u32, steps: i32, rate: f32) -> Move {
        let total = steps.unsigned_abs();
        Move {
            id,
            steps: [steps, steps / 2, 0, 0],
            primary_steps: total,
            profile: MotionProfile::plan(total, rate, rate, rate, 1.0e6),
            ..Move::EMPTY
        }
    }

    #[test]
    fn test_step_multiplier() {
        assert_eq!(step_multiplier(10_000.0, 12_000.0, true), 1);
        assert_eq!(step_multiplier(13_000.0, 12_000.0, true), 2);
        assert_eq!(step_multiplier(35_000.0, 12_000.0, true), 4);
        assert_eq!(step_multiplier(35_000.0, 12_000.0, false), 2);
    }

    #[test]
    fn test_drains_queue_in_order() {
        let config = StepperConfig::default();
        let mut scheduler = PulseScheduler::new(&config);
        let mut queue = MoveQueue::new(8);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut sink = Recorder::default();

        queue.push(cruise_move(1, 40, 4000.0)).unwrap();
        queue.push(cruise_move(2, -20, 4000.0)).unwrap();

        let mut completed = heapless::Vec::<u32, 4>::new();
        for _ in 0..10_000 {
            let outcome = scheduler.tick(&mut queue, &mut axes, &mut sink);
            if let Some(id) = outcome.completed {
                completed.push(id).unwrap();
            }
            if queue.is_empty() {
                break;
            }
        }

        assert_eq!(completed.as_slice(), &[1, 2]);
        assert_eq!(axes[0].position, 20);
        assert_eq!(axes[1].position, 10);
        assert_eq!(sink.steps[0], 20);
        assert_eq!(sink.steps[1], 10);
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_quad_stepping_above_twice_threshold() {
        let config = StepperConfig {
            tick_frequency_hz: 16_000,
            step_doubler_frequency_hz: 12_000,
            ..StepperConfig::default()
        };
        let mut scheduler = PulseScheduler::new(&config);
        let mut queue = MoveQueue::new(8);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut sink = Recorder::default();
        queue.push(cruise_move(1, 4000, 35_000.0)).unwrap();

        let mut events = 0;
        for _ in 0..100 {
            let outcome = scheduler.tick(&mut queue, &mut axes, &mut sink);
            if outcome.primary_steps > 0 {
                assert_eq!(outcome.multiplier, 4);
                assert_eq!(outcome.primary_steps, 4);
                events += 1;
            }
        }
        assert!(events > 0);
        assert_eq!(sink.gaps, events * 3);
    }

    #[test]
    fn test_inactivity_disables_idle_axes() {
        let config = StepperConfig {
            tick_frequency_hz: 16_000,
            inactive_time_s: 1,
            ..StepperConfig::default()
        };
        let mut scheduler = PulseScheduler::new(&config);
        let mut queue = MoveQueue::new(8);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut sink = Recorder::default();
        queue.push(cruise_move(1, 10, 4000.0)).unwrap();

        let mut disabled = AxisSet::empty();
        for _ in 0..20_000 {
            disabled |= scheduler.tick(&mut queue, &mut axes, &mut sink).disabled;
        }
        assert_eq!(disabled, AxisSet::X | AxisSet::Y);
        assert_eq!(sink.disabled, AxisSet::X | AxisSet::Y);
        assert!(!axes[0].enabled);
    }
}
