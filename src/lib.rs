//! # motion-core
//!
//! Trajectory planner and stepper pulse scheduler for multi-axis fabrication
//! machines, with embedded-hal 1.0 support.
//!
//! ## Features
//!
//! - **Configuration-driven**: Machine geometry and limits from TOML files
//! - **Look-ahead planning**: Jerk-limited junction speeds over a bounded move queue
//! - **Kinematics**: Cartesian, CoreXY/CoreXZ, linear delta and Tuga geometries
//! - **Tick-driven pulses**: Constant-rate scheduler with double/quad stepping
//! - **Homing**: Endstop search, back-off and retest per axis, in configured order
//! - **Bed compensation**: Plane fit and distortion grid with height fade
//! - **no_std compatible**: Core library works without standard library
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use motion_core::{AxisSet, MotionCoreBuilder, MoveFlags, Position};
//!
//! let config = motion_core::load_config("machine.toml")?;
//!
//! let mut core = MotionCoreBuilder::new()
//!     .config(config)
//!     .sink(drivers)
//!     .endstops(endstops)
//!     .build()?;
//!
//! core.request_home(AxisSet::XYZ)?;
//! core.enqueue_move(Position::xyz(10.0, 20.0, 0.3), 50.0, MoveFlags::empty())?;
//!
//! // From the timer interrupt:
//! core.tick();
//! ```
//!
//! ## Feature Flags
//!
//! - `std` (default): Enables file I/O and TOML parsing
//! - `alloc`: Enables heap allocation for no_std with allocator
//! - `defmt`: Enables defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Logging macros, must come first
#[macro_use]
mod fmt;

// Core modules
pub mod config;
pub mod error;
pub mod kinematics;
pub mod machine;
pub mod motion;

// Re-exports for ergonomic API
pub use config::{validate_config, MachineConfig, ParameterOverrides};
pub use error::{Error, Result};
pub use kinematics::{Axis, AxisSet, GeometryResolver, Kinematics, Position};
pub use machine::{MotionCore, MotionCoreBuilder, MotionEvent, RunState};
pub use motion::{Direction, Move, MoveFlags, MoveQueue, StepSink, TickOutcome};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, load_config_with_overrides};

// Unit types
pub use config::units::{Millimeters, MmPerSec, MmPerSecSquared};
