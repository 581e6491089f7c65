//! Mechanical constraints derived from axis configuration.

use crate::kinematics::{Axis, NUM_AXES};

use super::axis::AxisConfig;
use super::limits::SoftLimits;
use super::system::MachineConfig;

/// Derived per-axis parameters computed from configuration.
///
/// These are computed once at initialization and used for all motion planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisConstraints {
    /// Actuator steps per millimeter.
    pub steps_per_mm: f32,

    /// Maximum feedrate in mm/s.
    pub max_feedrate: f32,

    /// Maximum print acceleration in mm/s².
    pub max_acceleration: f32,

    /// Maximum travel acceleration in mm/s².
    pub travel_acceleration: f32,

    /// Homing approach feedrate in mm/s.
    pub homing_feedrate: f32,

    /// Maximum step rate in steps/s (at max feedrate).
    pub max_step_rate: f32,

    /// Soft limits (`None` for the extruder).
    pub limits: Option<SoftLimits>,
}

impl AxisConstraints {
    /// Compute constraints from axis configuration.
    pub fn from_config(axis: Axis, config: &AxisConfig) -> Self {
        let limits = match axis {
            Axis::E => None,
            _ => Some(config.soft_limits()),
        };

        Self {
            steps_per_mm: config.steps_per_mm,
            max_feedrate: config.max_feedrate.0,
            max_acceleration: config.max_acceleration.0,
            travel_acceleration: config.effective_travel_acceleration().0,
            homing_feedrate: config.homing_feedrate.0,
            max_step_rate: config.max_feedrate.0 * config.steps_per_mm,
            limits,
        }
    }

    /// Axis travel length in mm (0 when unbounded).
    pub fn length(&self) -> f32 {
        self.limits.map(|l| l.length()).unwrap_or(0.0)
    }

    /// Acceleration for print or travel moves.
    #[inline]
    pub fn acceleration(&self, travel: bool) -> f32 {
        if travel {
            self.travel_acceleration
        } else {
            self.max_acceleration
        }
    }
}

/// Machine-wide derived parameters.
///
/// The planner and scheduler read calibration through this struct only, so
/// overrides applied to the configuration take effect on the next rebuild.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineParameters {
    /// Per-axis constraints in index order.
    pub axes: [AxisConstraints; NUM_AXES],

    /// XY junction jerk in mm/s.
    pub jerk: f32,

    /// Z junction jerk in mm/s.
    pub z_jerk: f32,

    /// Extruder junction jerk in mm/s.
    pub e_jerk: f32,
}

impl MachineParameters {
    /// Compute parameters from a machine configuration.
    pub fn from_config(config: &MachineConfig) -> Self {
        Self {
            axes: Axis::ALL.map(|axis| AxisConstraints::from_config(axis, config.axis(axis))),
            jerk: config.planner.jerk.0,
            z_jerk: config.planner.z_jerk.0,
            e_jerk: config.planner.e_jerk.0,
        }
    }

    /// Constraints of one axis.
    #[inline]
    pub fn axis(&self, axis: Axis) -> &AxisConstraints {
        &self.axes[axis.index()]
    }

    /// Steps per millimeter of every axis.
    pub fn steps_per_mm(&self) -> [f32; NUM_AXES] {
        self.axes.map(|a| a.steps_per_mm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_rate() {
        let params = MachineParameters::from_config(&MachineConfig::default());
        let x = params.axis(Axis::X);

        // 200 mm/s * 80 steps/mm
        assert!((x.max_step_rate - 16_000.0).abs() < 0.1);
    }

    #[test]
    fn test_extruder_has_no_limits() {
        let params = MachineParameters::from_config(&MachineConfig::default());
        assert!(params.axis(Axis::E).limits.is_none());
        assert!((params.axis(Axis::X).length() - 230.0).abs() < 1e-4);
    }

    #[test]
    fn test_travel_acceleration_selection() {
        let params = MachineParameters::from_config(&MachineConfig::default());
        let y = params.axis(Axis::Y);
        assert_eq!(y.acceleration(false), 1000.0);
        assert_eq!(y.acceleration(true), 2000.0);
    }
}
