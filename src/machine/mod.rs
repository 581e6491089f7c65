//! Machine module for motion-core.
//!
//! Runtime axis state, pin drivers, endstops, homing and the
//! [`MotionCore`] context that ties them to the planner.

mod axis;
mod builder;
mod context;
mod driver;
mod endstop;
mod homing;
mod state;

pub use self::axis::{AxisState, HomeState};
pub use self::builder::MotionCoreBuilder;
pub use self::context::{MotionCore, EVENT_QUEUE_DEPTH};
pub use self::driver::{AxisDriver, DriverBank};
pub use self::endstop::{Endstop, EndstopBank, EndstopMonitor, NoEndstops};
pub use self::homing::{HomingAction, HomingReport, HomingSession};
pub use self::state::{JamResponse, MotionEvent, RunState};
