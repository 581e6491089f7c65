//! Machine run state and operator-visible events.

use crate::config::JamPolicy;
use crate::kinematics::{Axis, AxisSet, Position, NUM_AXES};

use super::homing::HomingReport;

/// Coarse machine state, highest-priority condition first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunState {
    /// Emergency stop latched; homing required.
    EmergencyStopped,
    /// A jam blocked admission until `resume()`.
    JamBlocked,
    /// Door open: admission closed, queue draining.
    DoorOpen,
    /// Paused: admission closed, queue draining.
    Paused,
    /// Homing session in progress.
    Homing,
    /// Moves queued or executing.
    Running,
    /// Queue empty, nothing executing.
    Idle,
}

/// What the core did in response to a jam report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JamResponse {
    /// Axis flagged; motion continues unchanged.
    Marked,
    /// Admission closed until `resume()`.
    Blocked,
    /// New moves run at the given percentage of their feedrate.
    SlowedDown {
        /// Feedrate percentage
        percent: u8,
    },
}

/// Condition reported to the embedding firmware.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionEvent {
    /// A homing session ended.
    HomingFinished(HomingReport),
    /// Homing did not find the endstop of an axis.
    EndstopNotFound {
        /// Axis that failed to home
        axis: Axis,
    },
    /// A jam was reported and the policy applied.
    JamDetected {
        /// Jammed axis
        axis: Axis,
        /// Policy applied
        policy: JamPolicy,
    },
    /// Emergency stop executed.
    EmergencyStop,
    /// An axis ran into its endstop during a normal move and was halted.
    EndstopHit {
        /// Halted axis
        axis: Axis,
    },
    /// The probe triggered during a probe move.
    ProbeTriggered {
        /// Machine-space trigger position
        position: Position,
        /// Actuator positions at the trigger
        steps: [i32; NUM_AXES],
    },
    /// A probe move completed without the probe triggering.
    ProbeNotTriggered,
    /// Drivers disabled by the inactivity timeout.
    MotorsDisabled(AxisSet),
}
