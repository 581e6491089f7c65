//! Queued move representation.

use bitflags::bitflags;

use crate::kinematics::{Axis, AxisSet, Position, NUM_AXES};

use super::profile::{Direction, MotionProfile};

bitflags! {
    /// Mode flags of a queued move.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MoveFlags: u8 {
        /// Part of a homing sequence; bypasses the homed-axis check.
        const HOMING = 0b0001;
        /// Stops when the probe input triggers.
        const PROBE = 0b0010;
        /// Non-printing move; uses travel acceleration and segment rate.
        const TRAVEL = 0b0100;
    }
}

impl Default for MoveFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// A fully resolved move in the queue.
///
/// Geometry fields are fixed once queued. The junction planner rewrites
/// `entry`, `exit` and `profile` while `started` is false.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    /// Sequence number assigned at admission.
    pub id: u32,
    /// Mode flags.
    pub flags: MoveFlags,

    /// Machine-space start position in mm.
    pub from: Position,
    /// Machine-space end position in mm.
    pub to: Position,

    /// Signed actuator step delta per axis.
    pub steps: [i32; NUM_AXES],
    /// Absolute actuator target per axis.
    pub target: [i32; NUM_AXES],
    /// Bresenham primary count (may exceed every axis delta, see H-gantry).
    pub primary_steps: u32,
    /// Actuator with the largest step delta.
    pub primary_axis: Axis,

    /// Machine-space direction per axis (extruder relative to path length).
    pub unit: [f32; NUM_AXES],
    /// Path length in mm.
    pub length: f32,

    /// Feedrate requested at admission in mm/s.
    pub requested_feedrate: f32,
    /// Cruise speed cap after axis limits and low-water clamp in mm/s.
    pub cruise: f32,
    /// Planned entry speed in mm/s.
    pub entry: f32,
    /// Planned exit speed in mm/s.
    pub exit: f32,
    /// Junction speed limit with the previous move in mm/s.
    pub max_entry: f32,
    /// Speed this move may start or stop at without a ramp in mm/s.
    pub safe_speed: f32,
    /// Path acceleration in mm/s².
    pub acceleration: f32,

    /// Step profile derived from the planned speeds.
    pub profile: MotionProfile,
    /// Set by the scheduler once execution begins.
    pub started: bool,
}

impl Move {
    /// An empty queue slot.
    pub const EMPTY: Self = Self {
        id: 0,
        flags: MoveFlags::empty(),
        from: Position::xyz(0.0, 0.0, 0.0),
        to: Position::xyz(0.0, 0.0, 0.0),
        steps: [0; NUM_AXES],
        target: [0; NUM_AXES],
        primary_steps: 0,
        primary_axis: Axis::X,
        unit: [0.0; NUM_AXES],
        length: 0.0,
        requested_feedrate: 0.0,
        cruise: 0.0,
        entry: 0.0,
        exit: 0.0,
        max_entry: 0.0,
        safe_speed: 0.0,
        acceleration: 0.0,
        profile: MotionProfile::ZERO,
        started: false,
    };

    /// Primary steps per millimeter of path.
    #[inline]
    pub fn steps_per_mm(&self) -> f32 {
        if self.length > 0.0 {
            self.primary_steps as f32 / self.length
        } else {
            0.0
        }
    }

    /// Rebuild the step profile from the planned speeds.
    pub fn update_profile(&mut self) {
        let k = self.steps_per_mm();
        self.profile = MotionProfile::plan(
            self.primary_steps,
            self.entry * k,
            self.cruise * k,
            self.exit * k,
            self.acceleration * k,
        );
    }

    /// Axes with a non-zero step delta.
    pub fn axes(&self) -> AxisSet {
        let mut set = AxisSet::empty();
        for axis in Axis::ALL {
            if self.steps[axis.index()] != 0 {
                set |= axis.set();
            }
        }
        set
    }

    /// Step direction of one axis.
    #[inline]
    pub fn direction(&self, axis: Axis) -> Direction {
        Direction::from_steps(self.steps[axis.index()])
    }

    /// Whether this move starts and ends at a stop junction.
    #[inline]
    pub fn is_stop_move(&self) -> bool {
        self.flags.intersects(MoveFlags::HOMING | MoveFlags::PROBE)
    }
}

impl Default for Move {
    fn default() -> Self {
        Self::EMPTY
    }
}
