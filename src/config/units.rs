//! Unit types for physical quantities.
//!
//! Provides type-safe representations of lengths, feedrates and accelerations
//! to prevent unit confusion in the configuration.

use core::ops::{Mul, Sub};

use serde::Deserialize;

/// Linear position or distance in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct Millimeters(pub f32);

impl Millimeters {
    /// Create a new Millimeters value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Sub for Millimeters {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Feedrate in millimeters per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSec(pub f32);

impl MmPerSec {
    /// Create a new MmPerSec value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

impl Mul<f32> for MmPerSec {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self(self.0 * rhs)
    }
}

/// Acceleration in millimeters per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize)]
#[serde(transparent)]
pub struct MmPerSecSquared(pub f32);

impl MmPerSecSquared {
    /// Create a new MmPerSecSquared value.
    #[inline]
    pub const fn new(value: f32) -> Self {
        Self(value)
    }

    /// Get the raw value.
    #[inline]
    pub const fn value(self) -> f32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millimeters_difference() {
        assert_eq!(Millimeters(190.0) - Millimeters(-40.0), Millimeters(230.0));
    }

    #[test]
    fn test_feedrate_scaling() {
        assert_eq!((MmPerSec(10.0) * 0.5).value(), 5.0);
        assert_eq!(MmPerSecSquared::new(100.0).value(), 100.0);
    }
}
