//! Motion module for motion-core.
//!
//! Provides the move queue, junction planner, segmenter, Z compensation and
//! the tick-driven pulse scheduler.

mod block;
mod executor;
mod junction;
mod leveling;
mod profile;
mod queue;
mod scheduler;
mod segmenter;

pub use block::{Move, MoveFlags};
pub use executor::MoveCursor;
pub use junction::{JerkLimits, JunctionPlanner};
pub use leveling::{BedPlane, DistortionMap, ZCompensator, ZCorrection};
pub use profile::{Direction, MotionPhase, MotionProfile};
pub use queue::MoveQueue;
pub use scheduler::{step_multiplier, PulseScheduler, StepSink, TickOutcome};
pub use segmenter::Segmenter;

/// Smallest configurable move queue.
pub const MIN_QUEUE_CAPACITY: usize = 5;

/// Largest configurable move queue.
pub const MAX_QUEUE_CAPACITY: usize = 64;
