//! Motion profile calculation.
//!
//! Provides trapezoidal speed profiles in primary-axis steps with arbitrary
//! entry and exit rates, as required for moves joined at non-zero junction
//! speeds.

use libm::sqrtf;

/// Direction of actuator motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Increasing step count.
    Positive,
    /// Decreasing step count.
    Negative,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i32) -> Self {
        if steps >= 0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }
}

/// Current phase of move execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Ramping up toward the cruise rate.
    Accelerate,
    /// Moving at constant rate.
    Cruise,
    /// Ramping down toward the exit rate.
    Decelerate,
    /// All steps issued.
    Done,
}

/// Computed speed profile for a move, in primary-axis steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    /// Total primary steps.
    pub total_steps: u32,

    /// Steps in acceleration phase.
    pub accel_steps: u32,

    /// Steps in cruise phase (constant rate).
    pub cruise_steps: u32,

    /// Steps in deceleration phase.
    pub decel_steps: u32,

    /// Rate at the start of the move in steps/s.
    pub entry_rate: f32,

    /// Highest rate reached in steps/s.
    pub peak_rate: f32,

    /// Rate at the end of the move in steps/s.
    pub exit_rate: f32,

    /// Acceleration and deceleration rate in steps/s².
    pub accel_rate: f32,
}

impl MotionProfile {
    /// Zero-length profile (no motion).
    pub const ZERO: Self = Self {
        total_steps: 0,
        accel_steps: 0,
        cruise_steps: 0,
        decel_steps: 0,
        entry_rate: 0.0,
        peak_rate: 0.0,
        exit_rate: 0.0,
        accel_rate: 0.0,
    };

    /// Plan a trapezoidal profile between an entry and exit rate.
    ///
    /// Entry and exit are clamped to the cruise rate. If the move is too short
    /// to reach cruise, the profile becomes a triangle with a lower peak.
    ///
    /// # Arguments
    ///
    /// * `total_steps` - Primary step count
    /// * `entry_rate` - Rate at the start in steps/sec
    /// * `cruise_rate` - Maximum rate in steps/sec
    /// * `exit_rate` - Rate at the end in steps/sec
    /// * `accel_rate` - Acceleration in steps/sec²
    pub fn plan(
        total_steps: u32,
        entry_rate: f32,
        cruise_rate: f32,
        exit_rate: f32,
        accel_rate: f32,
    ) -> Self {
        if total_steps == 0 || cruise_rate <= 0.0 || accel_rate <= 0.0 {
            return Self::ZERO;
        }

        let entry = entry_rate.clamp(0.0, cruise_rate);
        let exit = exit_rate.clamp(0.0, cruise_rate);
        let two_a = 2.0 * accel_rate;

        // Distance to ramp between rates: d = (v1² - v0²) / 2a
        let accel_distance = (cruise_rate * cruise_rate - entry * entry) / two_a;
        let decel_distance = (cruise_rate * cruise_rate - exit * exit) / two_a;

        let (peak_rate, accel_steps, cruise_steps, decel_steps) =
            if accel_distance + decel_distance >= total_steps as f32 {
                // Triangle profile: ramps meet before cruise is reached
                let peak_sq = (two_a * total_steps as f32 + entry * entry + exit * exit) / 2.0;
                let peak = sqrtf(peak_sq).min(cruise_rate).max(entry.max(exit));
                let accel_steps = (((peak * peak - entry * entry) / two_a) as u32).min(total_steps);
                (peak, accel_steps, 0u32, total_steps - accel_steps)
            } else {
                // Full trapezoidal profile
                let accel_steps = accel_distance as u32;
                let decel_steps = decel_distance as u32;
                let cruise_steps = total_steps.saturating_sub(accel_steps + decel_steps);
                (cruise_rate, accel_steps, cruise_steps, decel_steps)
            };

        Self {
            total_steps,
            accel_steps,
            cruise_steps,
            decel_steps,
            entry_rate: entry,
            peak_rate,
            exit_rate: exit,
            accel_rate,
        }
    }

    /// Profile that starts and ends at rest.
    pub fn from_rest(total_steps: u32, cruise_rate: f32, accel_rate: f32) -> Self {
        Self::plan(total_steps, 0.0, cruise_rate, 0.0, accel_rate)
    }

    /// Check if this is a zero-length profile.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.total_steps == 0
    }

    /// Rate reached one step after starting from rest.
    ///
    /// The scheduler never runs slower than this, so a planned exit rate of
    /// zero cannot stall the last steps of a move.
    #[inline]
    pub fn min_rate(&self) -> f32 {
        sqrtf(2.0 * self.accel_rate)
    }

    /// Get the planned phase at a given step number.
    pub fn phase_at(&self, step: u32) -> MotionPhase {
        if step >= self.total_steps {
            MotionPhase::Done
        } else if step < self.accel_steps {
            MotionPhase::Accelerate
        } else if step < self.accel_steps + self.cruise_steps {
            MotionPhase::Cruise
        } else {
            MotionPhase::Decelerate
        }
    }

    /// Estimate total duration of the profile in seconds.
    pub fn estimated_duration_secs(&self) -> f32 {
        if self.total_steps == 0 || self.peak_rate <= 0.0 {
            return 0.0;
        }

        let accel_time = (self.peak_rate - self.entry_rate) / self.accel_rate;
        let cruise_time = self.cruise_steps as f32 / self.peak_rate;
        let decel_time = (self.peak_rate - self.exit_rate) / self.accel_rate;

        accel_time + cruise_time + decel_time
    }
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_profile() {
        let profile = MotionProfile::from_rest(
            1000,   // steps
            1000.0, // steps/sec
            2000.0, // steps/sec²
        );

        assert_eq!(profile.total_steps, 1000);
        assert!(profile.accel_steps > 0);
        assert!(profile.cruise_steps > 0);
        assert_eq!(profile.accel_steps, profile.decel_steps);
        assert_eq!(
            profile.accel_steps + profile.cruise_steps + profile.decel_steps,
            1000
        );
    }

    #[test]
    fn test_entry_and_exit_rates_shorten_ramps() {
        let profile = MotionProfile::plan(1000, 800.0, 1000.0, 200.0, 2000.0);

        // (1000² - 800²) / 4000 = 90, (1000² - 200²) / 4000 = 240
        assert_eq!(profile.accel_steps, 90);
        assert_eq!(profile.decel_steps, 240);
        assert_eq!(profile.cruise_steps, 670);
    }

    #[test]
    fn test_triangle_profile() {
        // Very short move that can't reach max rate
        let profile = MotionProfile::from_rest(
            100,     // only 100 steps
            10000.0, // very high max rate
            1000.0,  // moderate acceleration
        );

        // Should be a triangle (no cruise phase)
        assert_eq!(profile.cruise_steps, 0);
        assert!(profile.peak_rate < 10000.0);
        assert_eq!(profile.accel_steps + profile.decel_steps, 100);
    }

    #[test]
    fn test_direction() {
        assert_eq!(Direction::from_steps(100), Direction::Positive);
        assert_eq!(Direction::from_steps(-100), Direction::Negative);
        assert_eq!(Direction::Negative.sign(), -1);
    }

    #[test]
    fn test_zero_profile() {
        let profile = MotionProfile::plan(0, 0.0, 100.0, 0.0, 100.0);
        assert!(profile.is_zero());
        assert_eq!(profile.phase_at(0), MotionPhase::Done);
        assert_eq!(profile.estimated_duration_secs(), 0.0);
    }

    #[test]
    fn test_duration_estimate() {
        // 0 -> 1000 in 0.5 s (250 steps), 500 steps at 1000, 1000 -> 0 in 0.5 s
        let profile = MotionProfile::from_rest(1000, 1000.0, 2000.0);
        assert!((profile.estimated_duration_secs() - 1.5).abs() < 0.01);
    }
}
