//! Geometry resolver: machine-space positions to actuator step counts.
//!
//! Every supported machine geometry is a variant of [`Kinematics`]; the
//! [`GeometryResolver`] is the single place that dispatches on it.

mod cartesian;
mod hgantry;
mod delta;
mod tuga;

use core::fmt;

use bitflags::bitflags;
use libm::{fabsf, roundf};
use serde::Deserialize;

use crate::config::{KinematicsConfig, KinematicsMode};
use crate::error::{ConfigError, Error, KinematicsError, Result};

pub use hgantry::CoreVariant;
pub use self::delta::DeltaGeometry;
pub use self::tuga::TugaGeometry;

/// Number of actuated axes (X, Y, Z and the extruder).
pub const NUM_AXES: usize = 4;

/// A machine axis. For delta machines X, Y and Z name the A, B and C towers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    /// X axis (delta tower A).
    X,
    /// Y axis (delta tower B).
    Y,
    /// Z axis (delta tower C).
    Z,
    /// Extruder.
    E,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; NUM_AXES] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    /// Array index of this axis.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Parse an axis letter (case-insensitive).
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'X' => Some(Axis::X),
            'Y' => Some(Axis::Y),
            'Z' => Some(Axis::Z),
            'E' => Some(Axis::E),
            _ => None,
        }
    }

    /// Axis letter.
    pub const fn as_char(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::E => 'E',
        }
    }

    /// Single-axis set.
    pub const fn set(self) -> AxisSet {
        match self {
            Axis::X => AxisSet::X,
            Axis::Y => AxisSet::Y,
            Axis::Z => AxisSet::Z,
            Axis::E => AxisSet::E,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

bitflags! {
    /// A set of axes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AxisSet: u8 {
        /// X axis.
        const X = 0b0001;
        /// Y axis.
        const Y = 0b0010;
        /// Z axis.
        const Z = 0b0100;
        /// Extruder.
        const E = 0b1000;
        /// The three positioning axes.
        const XYZ = Self::X.bits() | Self::Y.bits() | Self::Z.bits();
    }
}

impl AxisSet {
    /// Check membership of a single axis.
    #[inline]
    pub fn has(self, axis: Axis) -> bool {
        self.contains(axis.set())
    }

    /// Iterate member axes in index order.
    pub fn axes(self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().filter(move |a| self.has(*a))
    }
}

impl Default for AxisSet {
    fn default() -> Self {
        Self::empty()
    }
}

/// A machine-space position in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Position {
    /// X in mm.
    pub x: f32,
    /// Y in mm.
    pub y: f32,
    /// Z in mm.
    pub z: f32,
    /// Extruder position in mm of filament.
    pub e: f32,
}

impl Position {
    /// Create a position with the extruder at zero.
    #[inline]
    pub const fn xyz(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, e: 0.0 }
    }

    /// Replace the extruder coordinate.
    #[inline]
    pub const fn with_e(mut self, e: f32) -> Self {
        self.e = e;
        self
    }

    /// Build from an axis-indexed array.
    #[inline]
    pub const fn from_array(a: [f32; NUM_AXES]) -> Self {
        Self { x: a[0], y: a[1], z: a[2], e: a[3] }
    }

    /// Axis-indexed array.
    #[inline]
    pub const fn to_array(self) -> [f32; NUM_AXES] {
        [self.x, self.y, self.z, self.e]
    }

    /// Coordinate of one axis.
    #[inline]
    pub fn get(&self, axis: Axis) -> f32 {
        self.to_array()[axis.index()]
    }

    /// Set the coordinate of one axis.
    pub fn set(&mut self, axis: Axis, value: f32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::E => self.e = value,
        }
    }

    /// Linear interpolation toward `other`.
    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        let a = self.to_array();
        let b = other.to_array();
        let mut out = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            out[i] = a[i] + (b[i] - a[i]) * t;
        }
        Position::from_array(out)
    }
}

/// Active machine geometry, resolved once from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Kinematics {
    /// Independent X, Y and Z motors.
    Cartesian,
    /// Z axis plus an XY H-gantry.
    CoreXy {
        /// Sign convention of the second motor.
        variant: CoreVariant,
        /// Resolve in motor space instead of doubling virtual steps.
        fast: bool,
    },
    /// Y axis plus an XZ H-gantry.
    CoreXz {
        /// Sign convention of the second motor.
        variant: CoreVariant,
        /// Resolve in motor space instead of doubling virtual steps.
        fast: bool,
    },
    /// Three-tower delta.
    Delta(DeltaGeometry),
    /// Scott-Russell arm.
    Tuga(TugaGeometry),
}

impl Kinematics {
    /// Build the geometry variant from its configuration section.
    pub fn from_config(config: &KinematicsConfig) -> Result<Self> {
        let kinematics = match config.mode {
            KinematicsMode::Cartesian => Kinematics::Cartesian,
            KinematicsMode::CoreXyPlus => Kinematics::CoreXy {
                variant: CoreVariant::Plus,
                fast: config.fast_core,
            },
            KinematicsMode::CoreXyMinus => Kinematics::CoreXy {
                variant: CoreVariant::Minus,
                fast: config.fast_core,
            },
            KinematicsMode::CoreXzPlus => Kinematics::CoreXz {
                variant: CoreVariant::Plus,
                fast: config.fast_core,
            },
            KinematicsMode::CoreXzMinus => Kinematics::CoreXz {
                variant: CoreVariant::Minus,
                fast: config.fast_core,
            },
            KinematicsMode::Delta => {
                let delta = config.delta.as_ref().ok_or(Error::Config(
                    ConfigError::InvalidKinematics("delta mode requires [kinematics.delta]"),
                ))?;
                Kinematics::Delta(DeltaGeometry::from_config(delta)?)
            }
            KinematicsMode::Tuga => {
                let tuga = config.tuga.as_ref().ok_or(Error::Config(
                    ConfigError::InvalidKinematics("tuga mode requires [kinematics.tuga]"),
                ))?;
                Kinematics::Tuga(TugaGeometry::from_config(tuga)?)
            }
        };
        Ok(kinematics)
    }

    /// Whether straight machine-space moves curve in actuator space.
    #[inline]
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Kinematics::Delta(_) | Kinematics::Tuga(_))
    }

    /// Printable radius of round beds.
    pub fn bed_radius(&self) -> Option<f32> {
        match self {
            Kinematics::Delta(delta) => Some(delta.max_radius()),
            _ => None,
        }
    }
}

/// Maps machine-space targets to actuator step positions.
#[derive(Debug, Clone)]
pub struct GeometryResolver {
    kinematics: Kinematics,
    steps_per_mm: [f32; NUM_AXES],
}

impl GeometryResolver {
    /// Create a resolver for a geometry and per-axis calibration.
    pub fn new(kinematics: Kinematics, steps_per_mm: [f32; NUM_AXES]) -> Self {
        Self {
            kinematics,
            steps_per_mm,
        }
    }

    /// Active geometry.
    #[inline]
    pub fn kinematics(&self) -> &Kinematics {
        &self.kinematics
    }

    /// Per-axis steps per millimeter.
    #[inline]
    pub fn steps_per_mm(&self) -> &[f32; NUM_AXES] {
        &self.steps_per_mm
    }

    /// Whether moves must be segmented.
    #[inline]
    pub fn is_nonlinear(&self) -> bool {
        self.kinematics.is_nonlinear()
    }

    /// Whether `axis` is driven by a single motor of its own.
    ///
    /// Only such axes can be stopped individually when their endstop
    /// triggers mid-move.
    pub fn is_direct(&self, axis: Axis) -> bool {
        match &self.kinematics {
            Kinematics::Cartesian => true,
            Kinematics::CoreXy { .. } => matches!(axis, Axis::Z | Axis::E),
            Kinematics::CoreXz { .. } => matches!(axis, Axis::Y | Axis::E),
            Kinematics::Delta(_) | Kinematics::Tuga(_) => axis == Axis::E,
        }
    }

    /// Resolve a machine-space position to absolute actuator steps.
    ///
    /// # Errors
    ///
    /// Returns `KinematicsError::Unreachable` if the position is outside the
    /// machine envelope.
    pub fn resolve(&self, p: &Position) -> Result<[i32; NUM_AXES]> {
        let spm = &self.steps_per_mm;
        let actuator_mm = match &self.kinematics {
            Kinematics::Cartesian => cartesian::actuators(p),
            Kinematics::CoreXy { variant, .. } => hgantry::actuators_xy(p, *variant),
            Kinematics::CoreXz { variant, .. } => hgantry::actuators_xz(p, *variant),
            Kinematics::Delta(delta) => {
                let [a, b, c] = delta.carriage_heights(p.x, p.y, p.z).ok_or(
                    KinematicsError::Unreachable {
                        x: p.x,
                        y: p.y,
                        z: p.z,
                    },
                )?;
                [a, b, c, p.e]
            }
            Kinematics::Tuga(tuga) => tuga.actuators(p).ok_or(KinematicsError::Unreachable {
                x: p.x,
                y: p.y,
                z: p.z,
            })?,
        };

        let mut steps = [0i32; NUM_AXES];
        for axis in Axis::ALL {
            let i = axis.index();
            // H-gantry motors share the X calibration.
            let scale = match (&self.kinematics, axis) {
                (Kinematics::CoreXy { .. }, Axis::Y) | (Kinematics::CoreXz { .. }, Axis::Z) => {
                    spm[Axis::X.index()]
                }
                _ => spm[i],
            };
            steps[i] = to_steps(actuator_mm[i] * scale, axis)?;
        }
        Ok(steps)
    }

    /// Machine-space position of absolute actuator steps.
    ///
    /// Only linear geometries have a closed-form inverse; returns `None` for
    /// delta and tuga machines.
    pub fn forward(&self, steps: &[i32; NUM_AXES]) -> Option<Position> {
        let spm = &self.steps_per_mm;
        let x_spm = spm[Axis::X.index()];
        match &self.kinematics {
            Kinematics::Cartesian => Some(cartesian::forward(steps, spm)),
            Kinematics::CoreXy { variant, .. } => {
                let mm = [
                    steps[0] as f32 / x_spm,
                    steps[1] as f32 / x_spm,
                    steps[2] as f32 / spm[2],
                    steps[3] as f32 / spm[3],
                ];
                Some(hgantry::forward_xy(mm, *variant))
            }
            Kinematics::CoreXz { variant, .. } => {
                let mm = [
                    steps[0] as f32 / x_spm,
                    steps[1] as f32 / spm[1],
                    steps[2] as f32 / x_spm,
                    steps[3] as f32 / spm[3],
                ];
                Some(hgantry::forward_xz(mm, *variant))
            }
            Kinematics::Delta(_) | Kinematics::Tuga(_) => None,
        }
    }

    /// Bresenham primary count for a move.
    ///
    /// Normally the largest actuator delta. Non-fast H-gantry moves run on
    /// doubled virtual steps of the logical axes so every motor gets at most
    /// one physical step per step event regardless of direction.
    pub fn primary_steps(&self, actuator_delta: &[i32; NUM_AXES], logical_delta: &Position) -> u32 {
        let largest = actuator_delta
            .iter()
            .map(|d| d.unsigned_abs())
            .max()
            .unwrap_or(0);

        let coupled = match &self.kinematics {
            Kinematics::CoreXy { fast: false, .. } => Some((Axis::X, Axis::Y)),
            Kinematics::CoreXz { fast: false, .. } => Some((Axis::X, Axis::Z)),
            _ => None,
        };

        match coupled {
            Some((a, b)) => {
                let x_spm = self.steps_per_mm[Axis::X.index()];
                let la = roundf(fabsf(logical_delta.get(a) * x_spm)) as u32;
                let lb = roundf(fabsf(logical_delta.get(b) * x_spm)) as u32;
                largest.max(2 * la.max(lb))
            }
            None => largest,
        }
    }

    /// Actuator delta for a homing move of `distance` mm along one axis.
    ///
    /// Delta and tuga machines home each tower/carriage directly; linear
    /// geometries move the logical axis, which may drive two motors.
    pub fn homing_delta(&self, axis: Axis, distance: f32) -> [i32; NUM_AXES] {
        let spm = &self.steps_per_mm;
        let mut delta = [0i32; NUM_AXES];
        let raw = |scale: f32| roundf(distance * scale) as i32;

        match (&self.kinematics, axis) {
            (Kinematics::CoreXy { variant, .. }, Axis::X | Axis::Y) => {
                let mut p = Position::default();
                p.set(axis, distance);
                let mm = hgantry::actuators_xy(&p, *variant);
                delta[0] = roundf(mm[0] * spm[0]) as i32;
                delta[1] = roundf(mm[1] * spm[0]) as i32;
            }
            (Kinematics::CoreXz { variant, .. }, Axis::X | Axis::Z) => {
                let mut p = Position::default();
                p.set(axis, distance);
                let mm = hgantry::actuators_xz(&p, *variant);
                delta[0] = roundf(mm[0] * spm[0]) as i32;
                delta[2] = roundf(mm[2] * spm[0]) as i32;
            }
            _ => delta[axis.index()] = raw(spm[axis.index()]),
        }
        delta
    }
}

fn to_steps(value: f32, axis: Axis) -> Result<i32> {
    let rounded = roundf(value);
    if rounded.is_nan() || rounded >= i32::MAX as f32 || rounded <= i32::MIN as f32 {
        return Err(Error::Kinematics(KinematicsError::StepOverflow(axis)));
    }
    Ok(rounded as i32)
}
