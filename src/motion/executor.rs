//! Move execution: speed ramp, DDA and Bresenham stepping.

use crate::kinematics::{Axis, AxisSet, NUM_AXES};
use crate::machine::AxisState;

use super::block::Move;
use super::profile::{Direction, MotionPhase};

/// Runtime state of the executing head move.
#[derive(Debug, Clone)]
pub struct MoveCursor {
    /// Id of the move being executed.
    id: u32,

    /// Total primary steps.
    total: u32,

    /// Primary steps issued.
    done: u32,

    /// Current primary step rate in steps/s.
    rate: f32,

    /// Peak rate of the planned profile.
    peak_rate: f32,

    /// Planned exit rate.
    exit_rate: f32,

    /// Ramp rate in steps/s².
    accel_rate: f32,

    /// Lowest rate the cursor runs at.
    min_rate: f32,

    /// DDA accumulator in primary steps.
    accumulator: f32,

    /// Absolute step delta per axis.
    deltas: [u32; NUM_AXES],

    /// Step direction per axis.
    directions: [Direction; NUM_AXES],

    /// Steps issued per axis.
    issued: [u32; NUM_AXES],

    /// Axes stopped mid-move.
    halted: AxisSet,

    /// Current phase of motion.
    phase: MotionPhase,
}

impl MoveCursor {
    /// Start executing `mv`. Seeds the Bresenham accumulators of `axes`.
    pub fn begin(mv: &Move, axes: &mut [AxisState; NUM_AXES]) -> Self {
        let profile = &mv.profile;
        let total = profile.total_steps;
        let min_rate = profile.min_rate();
        let rate = profile.entry_rate.max(min_rate);

        let mut deltas = [0u32; NUM_AXES];
        let mut directions = [Direction::Positive; NUM_AXES];
        for axis in Axis::ALL {
            let i = axis.index();
            deltas[i] = mv.steps[i].unsigned_abs();
            directions[i] = mv.direction(axis);
            if deltas[i] != 0 {
                axes[i].error = i64::from(total / 2);
                axes[i].direction = directions[i];
            }
        }

        let phase = if total == 0 {
            MotionPhase::Done
        } else if rate < profile.peak_rate {
            MotionPhase::Accelerate
        } else {
            MotionPhase::Cruise
        };

        Self {
            id: mv.id,
            total,
            done: 0,
            rate,
            peak_rate: profile.peak_rate.max(min_rate),
            exit_rate: profile.exit_rate,
            accel_rate: profile.accel_rate,
            min_rate,
            accumulator: 0.0,
            deltas,
            directions,
            issued: [0; NUM_AXES],
            halted: AxisSet::empty(),
            phase,
        }
    }

    /// Id of the executing move.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Check if all steps have been issued.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.phase == MotionPhase::Done
    }

    /// Get the current phase.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Current primary step rate in steps/s.
    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Primary steps issued so far.
    #[inline]
    pub fn steps_done(&self) -> u32 {
        self.done
    }

    /// Primary steps remaining.
    #[inline]
    pub fn steps_remaining(&self) -> u32 {
        self.total - self.done
    }

    /// Fraction of the move completed (0.0 to 1.0).
    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }

    /// Step direction of an axis in this move.
    #[inline]
    pub fn direction(&self, axis: Axis) -> Direction {
        self.directions[axis.index()]
    }

    /// Axes that still have steps to issue.
    pub fn moving_axes(&self) -> AxisSet {
        let mut set = AxisSet::empty();
        for axis in Axis::ALL {
            if self.remaining(axis) > 0 {
                set |= axis.set();
            }
        }
        set
    }

    /// Steps left for one axis (0 once halted).
    pub fn remaining(&self, axis: Axis) -> u32 {
        if self.halted.has(axis) {
            return 0;
        }
        let i = axis.index();
        self.deltas[i] - self.issued[i]
    }

    /// Stop stepping one axis; the rest of the move continues.
    pub fn halt_axis(&mut self, axis: Axis) {
        self.halted |= axis.set();
    }

    /// Advance the speed ramp by `dt` seconds.
    pub fn ramp(&mut self, dt: f32) {
        let delta = self.accel_rate * dt;
        match self.phase {
            MotionPhase::Accelerate => {
                self.rate += delta;
                if self.rate >= self.peak_rate {
                    self.rate = self.peak_rate;
                    self.phase = MotionPhase::Cruise;
                }
            }
            MotionPhase::Decelerate => {
                self.rate = (self.rate - delta).max(self.exit_rate);
            }
            MotionPhase::Cruise | MotionPhase::Done => {}
        }

        if matches!(self.phase, MotionPhase::Accelerate | MotionPhase::Cruise)
            && self.accel_rate > 0.0
        {
            // d = (v² - v_exit²) / 2a
            let braking =
                (self.rate * self.rate - self.exit_rate * self.exit_rate) / (2.0 * self.accel_rate);
            if self.steps_remaining() as f32 <= braking {
                self.phase = MotionPhase::Decelerate;
            }
        }

        self.rate = self.rate.max(self.min_rate);
    }

    /// Primary steps due after `dt` seconds, issued in groups of `multiplier`.
    ///
    /// Returns 0 or a group size of at most `multiplier`.
    pub fn take_due(&mut self, dt: f32, multiplier: u32) -> u32 {
        if self.is_done() {
            return 0;
        }
        let group = multiplier.max(1) as f32;
        self.accumulator += self.rate * dt;
        if self.accumulator < group {
            return 0;
        }
        // Drop any backlog the tick rate cannot carry.
        self.accumulator = (self.accumulator - group).min(group);
        multiplier.max(1).min(self.steps_remaining())
    }

    /// Issue one primary step and return the axes that step on it.
    ///
    /// Updates positions and Bresenham accumulators in `axes`.
    pub fn step_primary(&mut self, axes: &mut [AxisState; NUM_AXES]) -> AxisSet {
        let mut stepped = AxisSet::empty();
        if self.is_done() {
            return stepped;
        }

        let total = i64::from(self.total);
        for axis in Axis::ALL {
            let i = axis.index();
            if self.deltas[i] == 0 || self.halted.has(axis) {
                continue;
            }
            let state = &mut axes[i];
            state.error -= i64::from(self.deltas[i]);
            if state.error < 0 {
                state.error += total;
                state.position += self.directions[i].sign();
                self.issued[i] += 1;
                stepped |= axis.set();
            }
        }

        self.done += 1;
        if self.done >= self.total {
            self.phase = MotionPhase::Done;
        }
        stepped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::profile::MotionProfile;

    fn test_move(steps: [i32; NUM_AXES]) -> Move {
        let total = steps.iter().map(|s| s.unsigned_abs()).max().unwrap();
        Move {
            id: 7,
            steps,
            primary_steps: total,
            profile: MotionProfile::from_rest(total, 1000.0, 20_000.0),
            ..Move::EMPTY
        }
    }

    fn run(cursor: &mut MoveCursor, axes: &mut [AxisState; NUM_AXES]) -> u32 {
        let mut ticks = 0;
        while !cursor.is_done() {
            cursor.ramp(1e-4);
            let n = cursor.take_due(1e-4, 1);
            for _ in 0..n {
                cursor.step_primary(axes);
            }
            ticks += 1;
            assert!(ticks < 1_000_000);
        }
        ticks
    }

    #[test]
    fn test_bresenham_reaches_every_target() {
        let mv = test_move([100, -37, 3, 0]);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut cursor = MoveCursor::begin(&mv, &mut axes);
        run(&mut cursor, &mut axes);

        assert_eq!(axes[0].position, 100);
        assert_eq!(axes[1].position, -37);
        assert_eq!(axes[2].position, 3);
        assert_eq!(axes[3].position, 0);
        assert_eq!(cursor.steps_done(), 100);
        assert_eq!(cursor.moving_axes(), AxisSet::empty());
    }

    #[test]
    fn test_phases_progress_in_order() {
        let mv = test_move([400, 0, 0, 0]);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut cursor = MoveCursor::begin(&mv, &mut axes);
        assert_eq!(cursor.phase(), MotionPhase::Accelerate);

        let mut seen = heapless::Vec::<MotionPhase, 8>::new();
        while !cursor.is_done() {
            cursor.ramp(1e-4);
            for _ in 0..cursor.take_due(1e-4, 1) {
                cursor.step_primary(&mut axes);
            }
            if seen.last() != Some(&cursor.phase()) {
                seen.push(cursor.phase()).unwrap();
            }
        }
        assert_eq!(
            seen.as_slice(),
            &[MotionPhase::Accelerate, MotionPhase::Cruise, MotionPhase::Decelerate, MotionPhase::Done]
        );
    }

    #[test]
    fn test_rate_never_below_floor() {
        let mv = test_move([50, 0, 0, 0]);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut cursor = MoveCursor::begin(&mv, &mut axes);
        let floor = mv.profile.min_rate();
        while !cursor.is_done() {
            cursor.ramp(1e-4);
            assert!(cursor.rate() >= floor);
            for _ in 0..cursor.take_due(1e-4, 1) {
                cursor.step_primary(&mut axes);
            }
        }
    }

    #[test]
    fn test_groups_capped_by_remaining() {
        let mv = test_move([3, 0, 0, 0]);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut cursor = MoveCursor::begin(&mv, &mut axes);
        cursor.accumulator = 10.0;
        assert_eq!(cursor.take_due(0.0, 4), 3);
    }

    #[test]
    fn test_halted_axis_stops_stepping() {
        let mv = test_move([100, 100, 0, 0]);
        let mut axes = [AxisState::new(); NUM_AXES];
        let mut cursor = MoveCursor::begin(&mv, &mut axes);
        for _ in 0..10 {
            cursor.step_primary(&mut axes);
        }
        cursor.halt_axis(Axis::Y);
        run(&mut cursor, &mut axes);

        assert_eq!(axes[0].position, 100);
        assert_eq!(axes[1].position, 10);
        assert_eq!(cursor.remaining(Axis::Y), 0);
    }

    #[test]
    fn test_zero_move_is_done() {
        let mv = Move::EMPTY;
        let mut axes = [AxisState::new(); NUM_AXES];
        let cursor = MoveCursor::begin(&mv, &mut axes);
        assert!(cursor.is_done());
        assert_eq!(cursor.progress(), 1.0);
    }
}
