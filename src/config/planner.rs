//! Planner and segmenter configuration.

use serde::Deserialize;

use super::units::MmPerSec;

/// `[planner]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlannerConfig {
    /// Move queue capacity in slots.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Junction jerk budget for the XY plane.
    #[serde(default = "default_jerk", rename = "jerk_mm_per_sec")]
    pub jerk: MmPerSec,

    /// Junction jerk budget for Z.
    #[serde(default = "default_z_jerk", rename = "z_jerk_mm_per_sec")]
    pub z_jerk: MmPerSec,

    /// Junction jerk budget for the extruder.
    #[serde(default = "default_e_jerk", rename = "e_jerk_mm_per_sec")]
    pub e_jerk: MmPerSec,

    /// Upper bound on backward/forward pass pairs per replan.
    #[serde(default = "default_planner_iterations")]
    pub planner_iterations: u8,

    /// Occupancy below which new moves are slowed down.
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    /// Minimum duration of a move admitted below the low-water mark.
    #[serde(default = "default_low_water_min_move_time_us")]
    pub low_water_min_move_time_us: u32,

    /// Segment density of print moves on nonlinear geometries.
    #[serde(default = "default_segments_per_second_print")]
    pub segments_per_second_print: f32,

    /// Segment density of travel moves on nonlinear geometries.
    #[serde(default = "default_segments_per_second_travel")]
    pub segments_per_second_travel: f32,

    /// Segments resolved and queued per feeding call. Longer moves are fed
    /// in further batches as queue slots free up.
    #[serde(default = "default_max_segments_per_line")]
    pub max_segments_per_line: usize,

    /// Factor applied to the requested feedrate of new moves.
    #[serde(default = "default_feedrate_multiplier")]
    pub feedrate_multiplier: f32,
}

fn default_queue_capacity() -> usize {
    16
}

fn default_jerk() -> MmPerSec {
    MmPerSec(20.0)
}

fn default_z_jerk() -> MmPerSec {
    MmPerSec(0.3)
}

fn default_e_jerk() -> MmPerSec {
    MmPerSec(10.0)
}

fn default_planner_iterations() -> u8 {
    4
}

fn default_low_water_mark() -> usize {
    10
}

fn default_low_water_min_move_time_us() -> u32 {
    15_625
}

fn default_segments_per_second_print() -> f32 {
    180.0
}

fn default_segments_per_second_travel() -> f32 {
    70.0
}

fn default_max_segments_per_line() -> usize {
    22
}

fn default_feedrate_multiplier() -> f32 {
    1.0
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            jerk: default_jerk(),
            z_jerk: default_z_jerk(),
            e_jerk: default_e_jerk(),
            planner_iterations: default_planner_iterations(),
            low_water_mark: default_low_water_mark(),
            low_water_min_move_time_us: default_low_water_min_move_time_us(),
            segments_per_second_print: default_segments_per_second_print(),
            segments_per_second_travel: default_segments_per_second_travel(),
            max_segments_per_line: default_max_segments_per_line(),
            feedrate_multiplier: default_feedrate_multiplier(),
        }
    }
}

impl PlannerConfig {
    /// Minimum low-water move duration in seconds.
    #[inline]
    pub fn low_water_min_move_time(&self) -> f32 {
        self.low_water_min_move_time_us as f32 * 1e-6
    }
}
