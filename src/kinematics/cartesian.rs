//! Cartesian geometry: every axis has its own motor.

use super::{Position, NUM_AXES};

/// Actuator travel in mm for a machine position.
#[inline]
pub(super) fn actuators(p: &Position) -> [f32; NUM_AXES] {
    p.to_array()
}

/// Machine position of absolute actuator steps.
pub(super) fn forward(steps: &[i32; NUM_AXES], steps_per_mm: &[f32; NUM_AXES]) -> Position {
    let mut mm = [0.0; NUM_AXES];
    for i in 0..NUM_AXES {
        mm[i] = steps[i] as f32 / steps_per_mm[i];
    }
    Position::from_array(mm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_scales_each_axis() {
        let p = forward(&[800, -160, 400, 0], &[80.0, 80.0, 400.0, 95.0]);
        assert_eq!(p, Position::xyz(10.0, -2.0, 1.0));
    }
}
