//! Homing sequence configuration.

use heapless::Vec;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::kinematics::Axis;

use super::units::Millimeters;

/// Maximum number of steps in a homing order.
pub const MAX_HOMING_STEPS: usize = 8;

/// One step of a homing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomingStep {
    /// Home one axis.
    Home(Axis),
    /// Raise Z to the heat height and wait for the probe to reach temperature.
    HeatProbe,
}

/// Ordered homing steps, parsed from strings like `"XYZ"` or `"ZXYTZ"`.
///
/// `T` raises Z to the heat height and waits for the probe heat gate; it is
/// only valid after Z has been homed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomingOrder(Vec<HomingStep, MAX_HOMING_STEPS>);

impl HomingOrder {
    /// Parse an order string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidHomingOrder` with the offending character.
    pub fn parse(order: &str) -> Result<Self, ConfigError> {
        let mut steps = Vec::new();
        let mut z_homed = false;
        let mut heat_seen = false;

        for c in order.chars() {
            let step = match c.to_ascii_uppercase() {
                'T' if z_homed && !heat_seen => {
                    heat_seen = true;
                    HomingStep::HeatProbe
                }
                'X' | 'Y' | 'Z' => {
                    let axis = Axis::from_char(c).ok_or(ConfigError::InvalidHomingOrder(c))?;
                    if axis == Axis::Z {
                        z_homed = true;
                    }
                    HomingStep::Home(axis)
                }
                _ => return Err(ConfigError::InvalidHomingOrder(c)),
            };
            steps.push(step).map_err(|_| ConfigError::InvalidHomingOrder(c))?;
        }

        if steps.is_empty() {
            return Err(ConfigError::InvalidHomingOrder(' '));
        }
        Ok(Self(steps))
    }

    /// Steps in execution order.
    #[inline]
    pub fn steps(&self) -> &[HomingStep] {
        &self.0
    }
}

impl Default for HomingOrder {
    fn default() -> Self {
        let mut steps = Vec::new();
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let _ = steps.push(HomingStep::Home(axis));
        }
        Self(steps)
    }
}

impl<'de> Deserialize<'de> for HomingOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use core::fmt::Write;
        let raw = heapless::String::<16>::deserialize(deserializer)?;
        HomingOrder::parse(raw.as_str()).map_err(|e| {
            let mut buf = heapless::String::<128>::new();
            let _ = write!(buf, "{}", e);
            serde::de::Error::custom(buf.as_str())
        })
    }
}

/// `[homing]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HomingConfig {
    /// Axis order.
    #[serde(default)]
    pub order: HomingOrder,

    /// Z height for the `T` heat step.
    #[serde(default = "default_heat_height", rename = "heat_height_mm")]
    pub heat_height: Millimeters,

    /// Approach travel limit as a multiple of the axis length.
    #[serde(default = "default_max_travel_factor")]
    pub max_travel_factor: f32,

    /// Reject machine-space moves on axes that are not homed.
    #[serde(default = "default_require_homing")]
    pub require_homing: bool,
}

fn default_heat_height() -> Millimeters {
    Millimeters(20.0)
}

fn default_max_travel_factor() -> f32 {
    1.5
}

fn default_require_homing() -> bool {
    true
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            order: HomingOrder::default(),
            heat_height: default_heat_height(),
            max_travel_factor: default_max_travel_factor(),
            require_homing: default_require_homing(),
        }
    }
}
