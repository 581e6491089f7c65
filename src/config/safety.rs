//! Jam and endstop safety configuration.

use serde::Deserialize;

/// Reaction to a jam or stall reported by the safety layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JamPolicy {
    /// Flag the axis and report; motion continues unchanged.
    MarkOnly,
    /// Stop admitting moves and wait for the operator.
    #[default]
    BlockAndAlert,
    /// Report and continue at a reduced feedrate.
    NotifyAndContinue,
}

/// `[safety]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SafetyConfig {
    /// Jam reaction.
    #[serde(default)]
    pub jam_policy: JamPolicy,

    /// Feedrate percentage applied by `NotifyAndContinue`.
    #[serde(default = "default_jam_slowdown_percent")]
    pub jam_slowdown_percent: u8,

    /// Halt an axis moving into a triggered endstop during normal moves.
    #[serde(default = "default_always_check_endstops")]
    pub always_check_endstops: bool,
}

fn default_jam_slowdown_percent() -> u8 {
    70
}

fn default_always_check_endstops() -> bool {
    true
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            jam_policy: JamPolicy::default(),
            jam_slowdown_percent: default_jam_slowdown_percent(),
            always_check_endstops: default_always_check_endstops(),
        }
    }
}
