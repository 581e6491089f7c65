//! Pulse scheduler configuration.

use serde::Deserialize;

/// `[stepper]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepperConfig {
    /// Scheduler tick rate.
    #[serde(default = "default_tick_frequency_hz")]
    pub tick_frequency_hz: u32,

    /// Primary step rate above which two pulses are emitted per step event.
    #[serde(default = "default_step_doubler_frequency_hz")]
    pub step_doubler_frequency_hz: u32,

    /// Permit four pulses per step event above twice the doubling threshold.
    #[serde(default = "default_allow_quad_stepping")]
    pub allow_quad_stepping: bool,

    /// STEP pin high time.
    #[serde(default)]
    pub pulse_high_delay_ns: u32,

    /// Setup time between a DIR change and the next STEP edge.
    #[serde(default)]
    pub direction_delay_ns: u32,

    /// Gap between the pulses of one doubled step event.
    #[serde(default = "default_double_step_delay_ns")]
    pub double_step_delay_ns: u32,

    /// Idle time after which motors are disabled (0 keeps them enabled).
    #[serde(default = "default_inactive_time_s")]
    pub inactive_time_s: u32,
}

fn default_tick_frequency_hz() -> u32 {
    16_000
}

fn default_step_doubler_frequency_hz() -> u32 {
    12_000
}

fn default_allow_quad_stepping() -> bool {
    true
}

fn default_double_step_delay_ns() -> u32 {
    1_000
}

fn default_inactive_time_s() -> u32 {
    360
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            tick_frequency_hz: default_tick_frequency_hz(),
            step_doubler_frequency_hz: default_step_doubler_frequency_hz(),
            allow_quad_stepping: default_allow_quad_stepping(),
            pulse_high_delay_ns: 0,
            direction_delay_ns: 0,
            double_step_delay_ns: default_double_step_delay_ns(),
            inactive_time_s: default_inactive_time_s(),
        }
    }
}

impl StepperConfig {
    /// Inactivity timeout in ticks, `None` when disabled.
    pub fn inactive_ticks(&self) -> Option<u32> {
        if self.inactive_time_s == 0 {
            None
        } else {
            Some(self.inactive_time_s.saturating_mul(self.tick_frequency_hz))
        }
    }
}
