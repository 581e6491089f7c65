//! Configuration module for motion-core.
//!
//! Provides types for loading and validating machine configurations from
//! TOML files (with `std` feature) or pre-parsed data, plus the parameter
//! override table layered on top of them.

mod axis;
mod homing;
mod kinematics;
mod leveling;
mod limits;
mod mechanical;
mod overrides;
mod planner;
mod safety;
mod stepper;
mod system;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use axis::{AxisConfig, EndstopConfig, HomeDirection};
pub use homing::{HomingConfig, HomingOrder, HomingStep, MAX_HOMING_STEPS};
pub use kinematics::{DeltaConfig, KinematicsConfig, KinematicsMode, TugaConfig};
pub use leveling::{LevelingConfig, LevelingMethod, MAX_GRID_POINTS, MAX_PROBE_POINTS};
pub use limits::{LimitPolicy, SoftLimits};
pub use mechanical::{AxisConstraints, MachineParameters};
pub use overrides::{AxisOverrides, DeltaOverrides, ParameterOverrides};
pub use planner::PlannerConfig;
pub use safety::{JamPolicy, SafetyConfig};
pub use stepper::StepperConfig;
pub use system::{AxesConfig, MachineConfig};
pub use validation::validate_config;

#[cfg(feature = "std")]
pub use loader::{load_config, load_config_with_overrides, parse_config, parse_overrides};

// Re-export unit types at config level
pub use units::{Millimeters, MmPerSec, MmPerSecSquared};
