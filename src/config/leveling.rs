//! Distortion and bed leveling configuration.

use heapless::Vec;
use serde::Deserialize;

/// Largest supported distortion grid edge.
pub const MAX_GRID_POINTS: usize = 16;

/// Largest number of probe points in the configuration.
pub const MAX_PROBE_POINTS: usize = 32;

/// How the bed plane is derived from probe points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LevelingMethod {
    /// Plane through exactly three points.
    ThreePoint,
    /// Least-squares plane over a grid of samples.
    GridRegression,
    /// Three points plus a mirrored fourth for cantilevered beds.
    Bending,
}

/// `[leveling]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelingConfig {
    /// Height below which the full correction applies.
    #[serde(default = "default_degrade_start", rename = "degrade_start_mm")]
    pub degrade_start: f32,

    /// Height at and above which no correction applies.
    #[serde(default = "default_degrade_end", rename = "degrade_end_mm")]
    pub degrade_end: f32,

    /// Distortion grid edge length in points.
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,

    /// Build a zeroed distortion grid at startup for measured values.
    #[serde(default)]
    pub distortion_correction: bool,

    /// Radius of the outer grid rows around the origin (round beds).
    /// Delta machines fall back to their printable radius.
    #[serde(default, rename = "grid_radius_mm")]
    pub grid_radius: Option<f32>,

    /// Lower corner `[x, y]` of the grid on rectangular beds.
    #[serde(default = "default_grid_min", rename = "grid_min_mm")]
    pub grid_min: [f32; 2],

    /// Upper corner `[x, y]` of the grid on rectangular beds.
    #[serde(default = "default_grid_max", rename = "grid_max_mm")]
    pub grid_max: [f32; 2],

    /// Largest magnitude stored in a grid node.
    #[serde(default = "default_distortion_limit", rename = "distortion_limit_mm")]
    pub distortion_limit: f32,

    /// Plane construction method for `points`.
    #[serde(default)]
    pub method: Option<LevelingMethod>,

    /// Measured probe points as `[x, y, z]`.
    #[serde(default)]
    pub points: Vec<[f32; 3], MAX_PROBE_POINTS>,

    /// Per-point bending corrections for the `bending` method.
    #[serde(default)]
    pub bending_correction: [f32; 3],
}

fn default_degrade_start() -> f32 {
    0.5
}

fn default_degrade_end() -> f32 {
    1.5
}

fn default_grid_points() -> usize {
    5
}

fn default_grid_min() -> [f32; 2] {
    [10.0, 10.0]
}

fn default_grid_max() -> [f32; 2] {
    [190.0, 190.0]
}

fn default_distortion_limit() -> f32 {
    2.0
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            degrade_start: default_degrade_start(),
            degrade_end: default_degrade_end(),
            grid_points: default_grid_points(),
            distortion_correction: false,
            grid_radius: None,
            grid_min: default_grid_min(),
            grid_max: default_grid_max(),
            distortion_limit: default_distortion_limit(),
            method: None,
            points: Vec::new(),
            bending_correction: [0.0; 3],
        }
    }
}
