//! Soft limit configuration and types.

use serde::Deserialize;

use super::units::Millimeters;

/// Policy for handling limit violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LimitPolicy {
    /// Reject moves that would exceed limits.
    #[default]
    Reject,
    /// Clamp target to nearest limit.
    Clamp,
}

/// Soft limits of one machine axis in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftLimits {
    /// Minimum allowed position.
    pub min: Millimeters,

    /// Maximum allowed position.
    pub max: Millimeters,

    /// What to do when limit is exceeded.
    pub policy: LimitPolicy,
}

impl SoftLimits {
    /// Create new soft limits.
    pub fn new(min: Millimeters, max: Millimeters, policy: LimitPolicy) -> Self {
        Self { min, max, policy }
    }

    /// Check if limits are valid (min < max).
    pub fn is_valid(&self) -> bool {
        self.min.0 < self.max.0
    }

    /// Travel between the limits.
    #[inline]
    pub fn length(&self) -> f32 {
        (self.max - self.min).value()
    }

    /// Check if a position is within limits.
    pub fn contains(&self, position: f32) -> bool {
        position >= self.min.0 && position <= self.max.0
    }

    /// Apply limit policy to a target position.
    ///
    /// Returns `Some(position)` if valid or clamped, `None` if rejected.
    pub fn apply(&self, target: f32) -> Option<f32> {
        if self.contains(target) {
            Some(target)
        } else {
            match self.policy {
                LimitPolicy::Reject => None,
                LimitPolicy::Clamp => {
                    if target < self.min.0 {
                        Some(self.min.0)
                    } else {
                        Some(self.max.0)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_limits_reject() {
        let limits = SoftLimits::new(Millimeters(-40.0), Millimeters(190.0), LimitPolicy::Reject);

        assert!(limits.apply(0.0).is_some());
        assert!(limits.apply(190.0).is_some());
        assert!(limits.apply(-40.0).is_some());
        assert!(limits.apply(190.1).is_none());
        assert!(limits.apply(-40.1).is_none());
    }

    #[test]
    fn test_soft_limits_clamp() {
        let limits = SoftLimits::new(Millimeters(0.0), Millimeters(180.0), LimitPolicy::Clamp);

        assert_eq!(limits.apply(90.0), Some(90.0));
        assert_eq!(limits.apply(250.0), Some(180.0));
        assert_eq!(limits.apply(-3.0), Some(0.0));
        assert!((limits.length() - 180.0).abs() < 1e-6);
    }
}
