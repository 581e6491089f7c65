//! Delta geometry: three vertical towers carrying diagonal rods to the effector.

use libm::{cosf, sinf, sqrtf};

use crate::config::DeltaConfig;
use crate::error::{ConfigError, Error, Result};

/// Resolved delta tower layout.
///
/// Tower angles are measured counter-clockwise from the X axis and need not be
/// 120° apart, which lets calibration absorb build imperfections.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaGeometry {
    towers: [(f32, f32); 3],
    diagonal_sq: [f32; 3],
    max_radius: f32,
}

impl DeltaGeometry {
    /// Compute tower positions and rod lengths from configuration.
    pub fn from_config(config: &DeltaConfig) -> Result<Self> {
        let radius = config.printer_radius
            - config.end_effector_horizontal_offset
            - config.carriage_horizontal_offset;
        if config.diagonal_rod <= 0.0 || radius <= 0.0 || config.max_radius <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidKinematics(
                "delta rod length, radius and max radius must be > 0",
            )));
        }

        let angles = [config.alpha_a, config.alpha_b, config.alpha_c];
        let mut towers = [(0.0, 0.0); 3];
        let mut diagonal_sq = [0.0; 3];
        for i in 0..3 {
            let r = radius + config.radius_correction[i];
            let angle = angles[i].to_radians();
            towers[i] = (r * cosf(angle), r * sinf(angle));

            let rod = config.diagonal_rod + config.diagonal_correction[i];
            diagonal_sq[i] = rod * rod;
        }

        Ok(Self {
            towers,
            diagonal_sq,
            max_radius: config.max_radius,
        })
    }

    /// Horizontal position of a tower (0 = A, 1 = B, 2 = C).
    #[inline]
    pub fn tower(&self, index: usize) -> (f32, f32) {
        self.towers[index]
    }

    /// Largest reachable horizontal radius.
    #[inline]
    pub fn max_radius(&self) -> f32 {
        self.max_radius
    }

    /// Carriage heights in mm for an effector position.
    ///
    /// Returns `None` outside the configured radius or where a rod cannot reach.
    pub fn carriage_heights(&self, x: f32, y: f32, z: f32) -> Option<[f32; 3]> {
        if x * x + y * y > self.max_radius * self.max_radius {
            return None;
        }

        let mut heights = [0.0; 3];
        for i in 0..3 {
            let (tx, ty) = self.towers[i];
            let dx = tx - x;
            let dy = ty - y;
            let radicand = self.diagonal_sq[i] - dx * dx - dy * dy;
            if radicand <= 0.0 {
                return None;
            }
            heights[i] = z + sqrtf(radicand);
        }
        Some(heights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> DeltaGeometry {
        DeltaGeometry::from_config(&DeltaConfig {
            diagonal_rod: 345.0,
            alpha_a: 210.0,
            alpha_b: 330.0,
            alpha_c: 90.0,
            radius_correction: [0.0; 3],
            diagonal_correction: [0.0; 3],
            printer_radius: 124.0,
            end_effector_horizontal_offset: 0.0,
            carriage_horizontal_offset: 0.0,
            max_radius: 100.0,
        })
        .unwrap()
    }

    #[test]
    fn test_center_heights_are_equal() {
        let delta = geometry();
        let h = delta.carriage_heights(0.0, 0.0, 10.0).unwrap();
        let expected = 10.0 + sqrtf(345.0 * 345.0 - 124.0 * 124.0);
        for height in h {
            assert!((height - expected).abs() < 0.01);
        }
    }

    #[test]
    fn test_tower_c_on_y_axis() {
        let delta = geometry();
        let (x, y) = delta.tower(2);
        assert!(x.abs() < 1e-3);
        assert!((y - 124.0).abs() < 1e-3);
    }

    #[test]
    fn test_outside_radius_unreachable() {
        let delta = geometry();
        assert!(delta.carriage_heights(100.0, 0.0, 0.0).is_some());
        assert!(delta.carriage_heights(101.0, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_moving_toward_tower_raises_its_carriage() {
        let delta = geometry();
        let center = delta.carriage_heights(0.0, 0.0, 0.0).unwrap();
        let toward_c = delta.carriage_heights(0.0, 50.0, 0.0).unwrap();
        assert!(toward_c[2] > center[2]);
        assert!(toward_c[0] < center[0]);
    }
}
