//! Machine configuration - root configuration structure.

use heapless::String;
use serde::Deserialize;

use crate::kinematics::{Axis, NUM_AXES};

use super::axis::{AxisConfig, EndstopConfig, HomeDirection};
use super::homing::HomingConfig;
use super::kinematics::KinematicsConfig;
use super::leveling::LevelingConfig;
use super::limits::LimitPolicy;
use super::planner::PlannerConfig;
use super::safety::SafetyConfig;
use super::stepper::StepperConfig;
use super::units::{Millimeters, MmPerSec, MmPerSecSquared};

/// `[axes]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AxesConfig {
    /// X axis (delta tower A).
    pub x: AxisConfig,
    /// Y axis (delta tower B).
    pub y: AxisConfig,
    /// Z axis (delta tower C).
    pub z: AxisConfig,
    /// Extruder.
    #[serde(default = "AxisConfig::default_extruder")]
    pub e: AxisConfig,
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MachineConfig {
    /// Human-readable machine name (max 32 chars).
    #[serde(default = "default_name")]
    pub name: String<32>,

    /// Per-axis calibration and limits.
    pub axes: AxesConfig,

    /// Geometry.
    #[serde(default)]
    pub kinematics: KinematicsConfig,

    /// Move queue and junction planner.
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Pulse scheduler.
    #[serde(default)]
    pub stepper: StepperConfig,

    /// Homing sequence.
    #[serde(default)]
    pub homing: HomingConfig,

    /// Distortion compensation.
    #[serde(default)]
    pub leveling: LevelingConfig,

    /// Jam and endstop safety.
    #[serde(default)]
    pub safety: SafetyConfig,
}

fn default_name() -> String<32> {
    let mut name = String::new();
    let _ = name.push_str("machine");
    name
}

impl MachineConfig {
    /// Get an axis configuration.
    pub fn axis(&self, axis: Axis) -> &AxisConfig {
        match axis {
            Axis::X => &self.axes.x,
            Axis::Y => &self.axes.y,
            Axis::Z => &self.axes.z,
            Axis::E => &self.axes.e,
        }
    }

    /// Get a mutable axis configuration.
    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisConfig {
        match axis {
            Axis::X => &mut self.axes.x,
            Axis::Y => &mut self.axes.y,
            Axis::Z => &mut self.axes.z,
            Axis::E => &mut self.axes.e,
        }
    }

    /// Steps per millimeter of every axis in index order.
    pub fn steps_per_mm(&self) -> [f32; NUM_AXES] {
        Axis::ALL.map(|axis| self.axis(axis).steps_per_mm)
    }
}

#[allow(clippy::too_many_arguments)]
fn default_axis(
    steps_per_mm: f32,
    max_feedrate: f32,
    max_acceleration: f32,
    travel_acceleration: f32,
    homing_feedrate: f32,
    min: f32,
    max: f32,
    back_off: f32,
) -> AxisConfig {
    AxisConfig {
        steps_per_mm,
        max_feedrate: MmPerSec(max_feedrate),
        max_acceleration: MmPerSecSquared(max_acceleration),
        travel_acceleration: Some(MmPerSecSquared(travel_acceleration)),
        homing_feedrate: MmPerSec(homing_feedrate),
        min_position: Millimeters(min),
        max_position: Millimeters(max),
        limit_policy: LimitPolicy::Reject,
        invert_direction: false,
        home_direction: HomeDirection::Min,
        endstop: Some(EndstopConfig::default()),
        back_off: Millimeters(back_off),
        retest_reduction_factor: 2.0,
        back_on_home: Millimeters(0.0),
        endstop_offset_steps: 0,
    }
}

impl Default for MachineConfig {
    /// A Cartesian machine with typical desktop printer calibration.
    fn default() -> Self {
        Self {
            name: default_name(),
            axes: AxesConfig {
                x: default_axis(80.0, 200.0, 1000.0, 2000.0, 80.0, -40.0, 190.0, 5.0),
                y: default_axis(80.0, 200.0, 1000.0, 2000.0, 80.0, -15.0, 190.0, 5.0),
                z: default_axis(400.0, 5.0, 100.0, 100.0, 4.0, 0.0, 180.0, 2.0),
                e: AxisConfig::default_extruder(),
            },
            kinematics: KinematicsConfig::default(),
            planner: PlannerConfig::default(),
            stepper: StepperConfig::default(),
            homing: HomingConfig::default(),
            leveling: LevelingConfig::default(),
            safety: SafetyConfig::default(),
        }
    }
}
