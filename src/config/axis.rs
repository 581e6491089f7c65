//! Per-axis configuration from TOML.

use serde::Deserialize;

use super::limits::{LimitPolicy, SoftLimits};
use super::units::{Millimeters, MmPerSec, MmPerSecSquared};

/// End of travel an axis homes toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomeDirection {
    /// Home toward the minimum position.
    #[default]
    Min,
    /// Home toward the maximum position.
    Max,
}

impl HomeDirection {
    /// Sign of travel toward the endstop.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            HomeDirection::Min => -1.0,
            HomeDirection::Max => 1.0,
        }
    }
}

/// Endstop switch wiring.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EndstopConfig {
    /// Switch reads low when triggered.
    #[serde(default)]
    pub inverting: bool,

    /// Enable the input pull-up (informational for the pin setup).
    #[serde(default = "default_pullup")]
    pub pullup: bool,

    /// Consecutive agreeing samples required before a state change is accepted.
    #[serde(default = "default_debounce")]
    pub debounce_samples: u8,
}

fn default_pullup() -> bool {
    true
}

fn default_debounce() -> u8 {
    1
}

impl Default for EndstopConfig {
    fn default() -> Self {
        Self {
            inverting: false,
            pullup: default_pullup(),
            debounce_samples: default_debounce(),
        }
    }
}

/// Complete axis configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct AxisConfig {
    /// Actuator steps per millimeter of travel.
    pub steps_per_mm: f32,

    /// Maximum feedrate of this axis.
    #[serde(rename = "max_feedrate_mm_per_sec")]
    pub max_feedrate: MmPerSec,

    /// Maximum acceleration for print moves.
    #[serde(rename = "max_acceleration_mm_per_sec2")]
    pub max_acceleration: MmPerSecSquared,

    /// Maximum acceleration for travel moves (defaults to `max_acceleration`).
    #[serde(default, rename = "travel_acceleration_mm_per_sec2")]
    pub travel_acceleration: Option<MmPerSecSquared>,

    /// Feedrate of the first homing approach.
    #[serde(default = "default_homing_feedrate", rename = "homing_feedrate_mm_per_sec")]
    pub homing_feedrate: MmPerSec,

    /// Minimum position.
    #[serde(default, rename = "min_position_mm")]
    pub min_position: Millimeters,

    /// Maximum position.
    #[serde(default = "default_max_position", rename = "max_position_mm")]
    pub max_position: Millimeters,

    /// Soft limit policy for machine-space targets.
    #[serde(default)]
    pub limit_policy: LimitPolicy,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Direction of the homing approach.
    #[serde(default)]
    pub home_direction: HomeDirection,

    /// Endstop wiring; `None` means the axis cannot be homed.
    #[serde(default)]
    pub endstop: Option<EndstopConfig>,

    /// Distance to move away from the switch after the first trigger.
    #[serde(default = "default_back_off", rename = "back_off_mm")]
    pub back_off: Millimeters,

    /// Divisor applied to the homing feedrate for the retest approach.
    #[serde(default = "default_retest_factor")]
    pub retest_reduction_factor: f32,

    /// Optional move away from the switch after homing completes.
    #[serde(default, rename = "back_on_home_mm")]
    pub back_on_home: Millimeters,

    /// Tower endstop correction applied at the end of homing (delta only).
    #[serde(default)]
    pub endstop_offset_steps: i32,
}

fn default_homing_feedrate() -> MmPerSec {
    MmPerSec(40.0)
}

fn default_max_position() -> Millimeters {
    Millimeters(200.0)
}

fn default_back_off() -> Millimeters {
    Millimeters(5.0)
}

fn default_retest_factor() -> f32 {
    2.0
}

impl AxisConfig {
    /// Extruder defaults used when `[axes.e]` is omitted.
    pub fn default_extruder() -> Self {
        Self {
            steps_per_mm: 95.0,
            max_feedrate: MmPerSec(50.0),
            max_acceleration: MmPerSecSquared(5000.0),
            travel_acceleration: None,
            homing_feedrate: default_homing_feedrate(),
            min_position: Millimeters(0.0),
            max_position: Millimeters(0.0),
            limit_policy: LimitPolicy::Reject,
            invert_direction: false,
            home_direction: HomeDirection::Min,
            endstop: None,
            back_off: Millimeters(0.0),
            retest_reduction_factor: default_retest_factor(),
            back_on_home: Millimeters(0.0),
            endstop_offset_steps: 0,
        }
    }

    /// Soft limits of this axis.
    pub fn soft_limits(&self) -> SoftLimits {
        SoftLimits::new(self.min_position, self.max_position, self.limit_policy)
    }

    /// Effective travel acceleration.
    pub fn effective_travel_acceleration(&self) -> MmPerSecSquared {
        self.travel_acceleration.unwrap_or(self.max_acceleration)
    }

    /// Position the axis reports after homing.
    pub fn home_position(&self) -> Millimeters {
        match self.home_direction {
            HomeDirection::Min => self.min_position,
            HomeDirection::Max => self.max_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_position_follows_direction() {
        let mut axis = AxisConfig::default_extruder();
        axis.min_position = Millimeters(-40.0);
        axis.max_position = Millimeters(190.0);

        assert_eq!(axis.home_position(), Millimeters(-40.0));
        axis.home_direction = HomeDirection::Max;
        assert_eq!(axis.home_position(), Millimeters(190.0));
    }

    #[test]
    fn test_travel_acceleration_fallback() {
        let mut axis = AxisConfig::default_extruder();
        assert_eq!(axis.effective_travel_acceleration(), MmPerSecSquared(5000.0));
        axis.travel_acceleration = Some(MmPerSecSquared(8000.0));
        assert_eq!(axis.effective_travel_acceleration(), MmPerSecSquared(8000.0));
    }
}
