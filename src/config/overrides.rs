//! Parameter override table.
//!
//! Calibration values stored by the persistence layer take precedence over
//! the TOML configuration. Overrides are applied once at startup through
//! [`MachineConfig::with_overrides`] and may be re-applied at runtime while
//! the machine is idle.

use serde::Deserialize;

use crate::error::Result;
use crate::kinematics::Axis;

use super::system::MachineConfig;
use super::units::{MmPerSec, MmPerSecSquared};

/// Overrides for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct AxisOverrides {
    /// Steps per millimeter.
    #[serde(default)]
    pub steps_per_mm: Option<f32>,

    /// Maximum feedrate in mm/s.
    #[serde(default)]
    pub max_feedrate_mm_per_sec: Option<f32>,

    /// Maximum print acceleration in mm/s².
    #[serde(default)]
    pub max_acceleration_mm_per_sec2: Option<f32>,

    /// Maximum travel acceleration in mm/s².
    #[serde(default)]
    pub travel_acceleration_mm_per_sec2: Option<f32>,

    /// Delta tower endstop correction.
    #[serde(default)]
    pub endstop_offset_steps: Option<i32>,
}

/// Overrides for the delta geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct DeltaOverrides {
    /// Diagonal rod length in mm.
    #[serde(default)]
    pub diagonal_rod: Option<f32>,

    /// Printer radius in mm.
    #[serde(default)]
    pub printer_radius: Option<f32>,

    /// Tower angles A, B, C in degrees.
    #[serde(default)]
    pub tower_angles: Option<[f32; 3]>,

    /// Per-tower radius corrections in mm.
    #[serde(default)]
    pub radius_correction: Option<[f32; 3]>,

    /// Per-tower diagonal corrections in mm.
    #[serde(default)]
    pub diagonal_correction: Option<[f32; 3]>,

    /// Largest reachable radius in mm.
    #[serde(default)]
    pub max_radius: Option<f32>,
}

/// Full override table. Unset entries keep the configured value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct ParameterOverrides {
    /// X axis overrides.
    #[serde(default)]
    pub x: AxisOverrides,
    /// Y axis overrides.
    #[serde(default)]
    pub y: AxisOverrides,
    /// Z axis overrides.
    #[serde(default)]
    pub z: AxisOverrides,
    /// Extruder overrides.
    #[serde(default)]
    pub e: AxisOverrides,

    /// XY jerk in mm/s.
    #[serde(default)]
    pub jerk_mm_per_sec: Option<f32>,

    /// Z jerk in mm/s.
    #[serde(default)]
    pub z_jerk_mm_per_sec: Option<f32>,

    /// Extruder jerk in mm/s.
    #[serde(default)]
    pub e_jerk_mm_per_sec: Option<f32>,

    /// Delta geometry overrides.
    #[serde(default)]
    pub delta: DeltaOverrides,
}

impl ParameterOverrides {
    /// Overrides of one axis.
    pub fn axis(&self, axis: Axis) -> &AxisOverrides {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
            Axis::E => &self.e,
        }
    }
}

impl MachineConfig {
    /// Return a copy of this configuration with `overrides` applied and validated.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if an override produces an invalid value.
    pub fn with_overrides(&self, overrides: &ParameterOverrides) -> Result<MachineConfig> {
        let mut config = self.clone();

        for axis in Axis::ALL {
            let o = overrides.axis(axis);
            let a = config.axis_mut(axis);
            if let Some(v) = o.steps_per_mm {
                a.steps_per_mm = v;
            }
            if let Some(v) = o.max_feedrate_mm_per_sec {
                a.max_feedrate = MmPerSec(v);
            }
            if let Some(v) = o.max_acceleration_mm_per_sec2 {
                a.max_acceleration = MmPerSecSquared(v);
            }
            if let Some(v) = o.travel_acceleration_mm_per_sec2 {
                a.travel_acceleration = Some(MmPerSecSquared(v));
            }
            if let Some(v) = o.endstop_offset_steps {
                a.endstop_offset_steps = v;
            }
        }

        if let Some(v) = overrides.jerk_mm_per_sec {
            config.planner.jerk = MmPerSec(v);
        }
        if let Some(v) = overrides.z_jerk_mm_per_sec {
            config.planner.z_jerk = MmPerSec(v);
        }
        if let Some(v) = overrides.e_jerk_mm_per_sec {
            config.planner.e_jerk = MmPerSec(v);
        }

        if let Some(delta) = config.kinematics.delta.as_mut() {
            let o = &overrides.delta;
            if let Some(v) = o.diagonal_rod {
                delta.diagonal_rod = v;
            }
            if let Some(v) = o.printer_radius {
                delta.printer_radius = v;
            }
            if let Some([a, b, c]) = o.tower_angles {
                delta.alpha_a = a;
                delta.alpha_b = b;
                delta.alpha_c = c;
            }
            if let Some(v) = o.radius_correction {
                delta.radius_correction = v;
            }
            if let Some(v) = o.diagonal_correction {
                delta.diagonal_correction = v;
            }
            if let Some(v) = o.max_radius {
                delta.max_radius = v;
            }
        }

        super::validation::validate_config(&config)?;
        Ok(config)
    }
}
