//! Tuga geometry: a Scott-Russell arm driven by two carriages on the X rail.

use libm::sqrtf;

use crate::config::TugaConfig;
use crate::error::{ConfigError, Error, Result};

use super::{Position, NUM_AXES};

/// Resolved Scott-Russell arm.
#[derive(Debug, Clone, PartialEq)]
pub struct TugaGeometry {
    arm_length_sq: f32,
    arm_y_offset: f32,
}

impl TugaGeometry {
    /// Build from configuration.
    pub fn from_config(config: &TugaConfig) -> Result<Self> {
        if config.diagonal_rod <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidKinematics(
                "tuga arm length must be > 0",
            )));
        }
        Ok(Self {
            arm_length_sq: config.diagonal_rod * config.diagonal_rod,
            arm_y_offset: config.arm_y_offset,
        })
    }

    /// Motor travel in mm: `[x, x + sqrt(L² − (y − y₀)²), z, e]`.
    ///
    /// Returns `None` where the arm cannot reach.
    pub(super) fn actuators(&self, p: &Position) -> Option<[f32; NUM_AXES]> {
        let dy = p.y - self.arm_y_offset;
        let radicand = self.arm_length_sq - dy * dy;
        if radicand < 0.0 {
            return None;
        }
        Some([p.x, p.x + sqrtf(radicand), p.z, p.e])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_reach() {
        let tuga = TugaGeometry::from_config(&TugaConfig {
            diagonal_rod: 240.0,
            arm_y_offset: 0.0,
        })
        .unwrap();

        let a = tuga.actuators(&Position::xyz(10.0, 0.0, 5.0)).unwrap();
        assert_eq!(a, [10.0, 250.0, 5.0, 0.0]);

        assert!(tuga.actuators(&Position::xyz(0.0, 240.5, 0.0)).is_none());
    }
}
