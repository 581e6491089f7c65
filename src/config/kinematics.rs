//! Machine geometry configuration.

use serde::Deserialize;

/// Geometry selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KinematicsMode {
    /// Independent X, Y and Z motors.
    #[default]
    Cartesian,
    /// H-gantry with motors `x + y` and `x - y`.
    CoreXyPlus,
    /// H-gantry with motors `x + y` and `y - x`.
    CoreXyMinus,
    /// H-gantry with motors `x + z` and `x - z`.
    CoreXzPlus,
    /// H-gantry with motors `x + z` and `z - x`.
    CoreXzMinus,
    /// Three-tower delta.
    Delta,
    /// Scott-Russell arm.
    Tuga,
}

/// Delta tower geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeltaConfig {
    /// Length of the diagonal rods in mm.
    pub diagonal_rod: f32,

    /// Angle of tower A in degrees.
    #[serde(default = "default_alpha_a")]
    pub alpha_a: f32,

    /// Angle of tower B in degrees.
    #[serde(default = "default_alpha_b")]
    pub alpha_b: f32,

    /// Angle of tower C in degrees.
    #[serde(default = "default_alpha_c")]
    pub alpha_c: f32,

    /// Per-tower radius correction in mm.
    #[serde(default)]
    pub radius_correction: [f32; 3],

    /// Per-tower diagonal rod correction in mm.
    #[serde(default)]
    pub diagonal_correction: [f32; 3],

    /// Horizontal distance from the center to the tower rail in mm.
    pub printer_radius: f32,

    /// Horizontal offset of the rod joints on the effector in mm.
    #[serde(default)]
    pub end_effector_horizontal_offset: f32,

    /// Horizontal offset of the rod joints on the carriage in mm.
    #[serde(default)]
    pub carriage_horizontal_offset: f32,

    /// Largest reachable horizontal radius in mm.
    pub max_radius: f32,
}

fn default_alpha_a() -> f32 {
    210.0
}

fn default_alpha_b() -> f32 {
    330.0
}

fn default_alpha_c() -> f32 {
    90.0
}

/// Scott-Russell arm geometry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TugaConfig {
    /// Arm length in mm.
    pub diagonal_rod: f32,

    /// Y coordinate of the arm pivot line in mm.
    #[serde(default)]
    pub arm_y_offset: f32,
}

/// `[kinematics]` section.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct KinematicsConfig {
    /// Geometry mode.
    #[serde(default)]
    pub mode: KinematicsMode,

    /// Resolve H-gantry moves in motor space instead of doubled virtual steps.
    #[serde(default)]
    pub fast_core: bool,

    /// Delta constants, required for `mode = "delta"`.
    #[serde(default)]
    pub delta: Option<DeltaConfig>,

    /// Tuga constants, required for `mode = "tuga"`.
    #[serde(default)]
    pub tuga: Option<TugaConfig>,
}
