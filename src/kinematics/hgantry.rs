//! H-gantry geometries (CoreXY / CoreXZ).
//!
//! Two motors jointly drive two logical axes. Motor A always follows the sum
//! of the pair; the variant selects the sign of motor B.

use super::{Position, NUM_AXES};

/// Sign convention of the second gantry motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoreVariant {
    /// Motor B = first − second (e.g. x − y).
    Plus,
    /// Motor B = second − first (e.g. y − x).
    Minus,
}

impl CoreVariant {
    #[inline]
    fn second_motor(self, first: f32, second: f32) -> f32 {
        match self {
            CoreVariant::Plus => first - second,
            CoreVariant::Minus => second - first,
        }
    }

    /// Recover (first, second) from the motor pair.
    #[inline]
    fn logical(self, a: f32, b: f32) -> (f32, f32) {
        let diff = match self {
            CoreVariant::Plus => b,
            CoreVariant::Minus => -b,
        };
        ((a + diff) * 0.5, (a - diff) * 0.5)
    }
}

/// Motor travel in mm for an XY gantry: `[a, b, z, e]`.
pub(super) fn actuators_xy(p: &Position, variant: CoreVariant) -> [f32; NUM_AXES] {
    [p.x + p.y, variant.second_motor(p.x, p.y), p.z, p.e]
}

/// Motor travel in mm for an XZ gantry: `[a, y, c, e]`.
pub(super) fn actuators_xz(p: &Position, variant: CoreVariant) -> [f32; NUM_AXES] {
    [p.x + p.z, p.y, variant.second_motor(p.x, p.z), p.e]
}

/// Machine position from XY gantry motor travel in mm.
pub(super) fn forward_xy(mm: [f32; NUM_AXES], variant: CoreVariant) -> Position {
    let (x, y) = variant.logical(mm[0], mm[1]);
    Position { x, y, z: mm[2], e: mm[3] }
}

/// Machine position from XZ gantry motor travel in mm.
pub(super) fn forward_xz(mm: [f32; NUM_AXES], variant: CoreVariant) -> Position {
    let (x, z) = variant.logical(mm[0], mm[2]);
    Position { x, y: mm[1], z, e: mm[3] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_differ_in_second_motor_sign() {
        let p = Position::xyz(3.0, 1.0, 0.0);
        assert_eq!(actuators_xy(&p, CoreVariant::Plus)[1], 2.0);
        assert_eq!(actuators_xy(&p, CoreVariant::Minus)[1], -2.0);
    }

    #[test]
    fn test_forward_inverts_both_variants() {
        let p = Position::xyz(12.5, -4.0, 7.0).with_e(1.0);
        for variant in [CoreVariant::Plus, CoreVariant::Minus] {
            assert_eq!(forward_xy(actuators_xy(&p, variant), variant), p);
            assert_eq!(forward_xz(actuators_xz(&p, variant), variant), p);
        }
    }
}
