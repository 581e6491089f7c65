//! Per-axis runtime state.

use crate::motion::Direction;

/// Homing status of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HomeState {
    /// Position not referenced.
    #[default]
    Unknown,
    /// Referenced against its endstop.
    Homed,
    /// The last homing attempt did not find the endstop.
    Failed,
}

/// Runtime state of one actuator.
///
/// The scheduler is the only writer of `position`, `error` and `direction`
/// while a move executes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisState {
    /// Authoritative actuator position in steps.
    pub position: i32,
    /// Bresenham error accumulator of the executing move.
    pub error: i64,
    /// Direction of the executing or last move.
    pub direction: Direction,
    /// Driver enabled.
    pub enabled: bool,
    /// Ticks left before the driver is disabled (`None` disables the timeout).
    pub inactive_ticks: Option<u32>,
    /// Homing status.
    pub home: HomeState,
    /// Filament jam reported on this axis.
    pub jammed: bool,
}

impl AxisState {
    /// Disabled axis at position zero.
    pub const fn new() -> Self {
        Self {
            position: 0,
            error: 0,
            direction: Direction::Positive,
            enabled: false,
            inactive_ticks: None,
            home: HomeState::Unknown,
            jammed: false,
        }
    }

    /// Whether the axis is referenced.
    #[inline]
    pub fn is_homed(&self) -> bool {
        self.home == HomeState::Homed
    }

    /// Reload the inactivity countdown.
    #[inline]
    pub fn touch(&mut self, timeout: Option<u32>) {
        self.inactive_ticks = timeout;
    }

    /// Count down one idle tick. Returns `true` when the countdown expires on
    /// an enabled axis.
    pub fn idle_tick(&mut self) -> bool {
        if !self.enabled {
            return false;
        }
        match self.inactive_ticks {
            Some(0) | None => false,
            Some(1) => {
                self.inactive_ticks = Some(0);
                true
            }
            Some(n) => {
                self.inactive_ticks = Some(n - 1);
                false
            }
        }
    }
}

impl Default for AxisState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactivity_expires_once() {
        let mut axis = AxisState::new();
        axis.enabled = true;
        axis.touch(Some(2));

        assert!(!axis.idle_tick());
        assert!(axis.idle_tick());
        assert!(!axis.idle_tick());
    }

    #[test]
    fn test_no_timeout_never_expires() {
        let mut axis = AxisState::new();
        axis.enabled = true;
        axis.touch(None);
        for _ in 0..10 {
            assert!(!axis.idle_tick());
        }
    }
}
