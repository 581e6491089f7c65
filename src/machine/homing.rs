//! Homing state machine.
//!
//! A [`HomingSession`] walks the configured homing order and tells the core
//! what to do next each time the queue runs empty. The session itself never
//! touches the queue or the axis state.
//!
//! Axes of a tower group (the three carriages of a delta) are homed as one
//! step: they approach, back off and retest together, and each one stops on
//! its own endstop.

use heapless::Vec;

use crate::config::{HomingOrder, HomingStep, MachineConfig, MAX_HOMING_STEPS};
use crate::kinematics::{Axis, AxisSet};

/// Outcome of a homing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HomingReport {
    /// Axes referenced successfully.
    pub homed: AxisSet,
    /// Axes whose endstop was not found.
    pub failed: AxisSet,
}

impl HomingReport {
    /// Whether every attempted axis homed.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Next thing the core must do for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomingAction {
    /// Queue a homing move of `distance` mm on every axis of `axes`.
    Seek {
        /// Axes (or delta towers) moving together
        axes: AxisSet,
        /// Signed distance in mm
        distance: f32,
        /// Feedrate in mm/s
        feedrate: f32,
        /// Stop each axis when its endstop triggers
        watch: bool,
    },
    /// Set the axes to their home positions.
    Settle {
        /// Axes that touched their endstops
        axes: AxisSet,
    },
    /// Queue a machine-space move of one coordinate.
    MoveTo {
        /// Coordinate to change
        axis: Axis,
        /// Target coordinate in mm
        position: f32,
        /// Feedrate in mm/s
        feedrate: f32,
    },
    /// The endstops of `axes` were not found.
    AxisFailed {
        /// Axes that failed
        axes: AxisSet,
    },
    /// Wait for the external probe-heat gate.
    AwaitProbeHeat,
    /// The session is over.
    Finished(HomingReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Home(AxisSet),
    HeatProbe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    Start,
    Approach,
    Approached,
    BackOff,
    Retest,
    Retested,
    Settled,
    BackOnHome,
    Raise,
    Heat,
}

/// Progress through a homing order.
#[derive(Debug, Clone)]
pub struct HomingSession {
    steps: Vec<Step, MAX_HOMING_STEPS>,
    index: usize,
    phase: Phase,
    /// Axes of the current step still being homed.
    active: AxisSet,
    report: HomingReport,
    probe_heated: bool,
}

impl HomingSession {
    /// Session over the steps of `order` that touch `axes`.
    ///
    /// Axes in `group` are homed together wherever the order names one of
    /// them. The heat step is kept only when Z is homed in the same session.
    pub fn new(order: &HomingOrder, axes: AxisSet, group: AxisSet) -> Self {
        let mut steps: Vec<Step, MAX_HOMING_STEPS> = Vec::new();
        for step in order.steps() {
            let step = match *step {
                HomingStep::Home(axis) if axes.has(axis) => {
                    let set = if group.has(axis) { group & axes } else { axis.set() };
                    Step::Home(set)
                }
                HomingStep::HeatProbe if axes.has(Axis::Z) => Step::HeatProbe,
                _ => continue,
            };
            if steps.last() == Some(&step) {
                continue;
            }
            // Capacity matches the order it is built from.
            let _ = steps.push(step);
        }

        Self {
            steps,
            index: 0,
            phase: Phase::Start,
            active: AxisSet::empty(),
            report: HomingReport::default(),
            probe_heated: false,
        }
    }

    /// Results so far.
    #[inline]
    pub fn report(&self) -> HomingReport {
        self.report
    }

    /// Axes whose endstops the current move watches.
    pub fn watched_axes(&self) -> AxisSet {
        match (self.steps.get(self.index), self.phase) {
            (Some(Step::Home(_)), Phase::Approach | Phase::Retest) => self.active,
            _ => AxisSet::empty(),
        }
    }

    /// Whether the session is waiting for the probe-heat gate.
    pub fn is_waiting_for_heat(&self) -> bool {
        self.phase == Phase::Heat && !self.probe_heated
    }

    /// Open the probe-heat gate.
    pub fn on_probe_heated(&mut self) {
        self.probe_heated = true;
    }

    /// Decide the next action once the previous move has finished.
    ///
    /// `triggered` holds the watched axes that stopped on their endstops.
    /// `towers` selects delta-style homing where every axis travels the Z
    /// length and no back-on-home move follows.
    pub fn next_action(&mut self, config: &MachineConfig, towers: bool, triggered: AxisSet) -> HomingAction {
        loop {
            let Some(step) = self.steps.get(self.index).copied() else {
                return HomingAction::Finished(self.report);
            };

            match (step, self.phase) {
                (Step::Home(set), Phase::Start) => {
                    let cfg = config.axis(lead(set));
                    let length = if towers {
                        config.axes.z.soft_limits().length()
                    } else {
                        cfg.soft_limits().length()
                    };
                    self.active = set;
                    self.phase = Phase::Approach;
                    return HomingAction::Seek {
                        axes: set,
                        distance: cfg.home_direction.sign() * length * config.homing.max_travel_factor,
                        feedrate: cfg.homing_feedrate.0,
                        watch: true,
                    };
                }
                (Step::Home(_), Phase::Approach) => {
                    if let Some(failed) = self.evaluate(triggered, Phase::Approached) {
                        return failed;
                    }
                }
                (Step::Home(set), Phase::Approached) => {
                    let cfg = config.axis(lead(set));
                    if cfg.back_off.0 > 0.0 {
                        self.phase = Phase::BackOff;
                        return HomingAction::Seek {
                            axes: self.active,
                            distance: -cfg.home_direction.sign() * cfg.back_off.0,
                            feedrate: cfg.homing_feedrate.0,
                            watch: false,
                        };
                    }
                    self.phase = Phase::Settled;
                    return HomingAction::Settle { axes: self.active };
                }
                (Step::Home(set), Phase::BackOff) => {
                    let cfg = config.axis(lead(set));
                    self.phase = Phase::Retest;
                    return HomingAction::Seek {
                        axes: self.active,
                        distance: cfg.home_direction.sign() * 2.0 * cfg.back_off.0,
                        feedrate: (cfg.homing_feedrate * (1.0 / cfg.retest_reduction_factor.max(1.0))).value(),
                        watch: true,
                    };
                }
                (Step::Home(_), Phase::Retest) => {
                    if let Some(failed) = self.evaluate(triggered, Phase::Retested) {
                        return failed;
                    }
                }
                (Step::Home(_), Phase::Retested) => {
                    self.phase = Phase::Settled;
                    return HomingAction::Settle { axes: self.active };
                }
                (Step::Home(set), Phase::Settled) => {
                    self.report.homed |= self.active;
                    self.report.failed.remove(self.active);
                    let axis = lead(set);
                    let cfg = config.axis(axis);
                    if cfg.back_on_home.0 > 0.0 && !towers && set == axis.set() {
                        self.phase = Phase::BackOnHome;
                        return HomingAction::MoveTo {
                            axis,
                            position: cfg.home_position().0
                                - cfg.home_direction.sign() * cfg.back_on_home.0,
                            feedrate: cfg.homing_feedrate.0,
                        };
                    }
                    self.next_step();
                }
                (Step::HeatProbe, Phase::Start) => {
                    if !self.report.homed.has(Axis::Z) {
                        self.next_step();
                        continue;
                    }
                    self.phase = Phase::Raise;
                    return HomingAction::MoveTo {
                        axis: Axis::Z,
                        position: config.homing.heat_height.0,
                        feedrate: config.axes.z.homing_feedrate.0,
                    };
                }
                (Step::HeatProbe, Phase::Raise) => {
                    self.phase = Phase::Heat;
                    self.probe_heated = false;
                    return HomingAction::AwaitProbeHeat;
                }
                (Step::HeatProbe, Phase::Heat) => {
                    if !self.probe_heated {
                        return HomingAction::AwaitProbeHeat;
                    }
                    self.next_step();
                }
                _ => self.next_step(),
            }
        }
    }

    /// Keep the active axes that reached their endstops and move to `then`.
    ///
    /// Returns the failure of the others, if any. The step ends when none
    /// remain.
    fn evaluate(&mut self, triggered: AxisSet, then: Phase) -> Option<HomingAction> {
        let missed = self.active - triggered;
        self.active &= triggered;
        if self.active.is_empty() {
            self.next_step();
        } else {
            self.phase = then;
        }
        if missed.is_empty() {
            return None;
        }
        self.report.failed |= missed;
        self.report.homed.remove(missed);
        Some(HomingAction::AxisFailed { axes: missed })
    }

    fn next_step(&mut self) {
        self.index += 1;
        self.phase = Phase::Start;
        self.active = AxisSet::empty();
    }
}

/// Axis whose settings drive a homing step: Z for a tower group.
fn lead(set: AxisSet) -> Axis {
    set.axes().last().unwrap_or(Axis::Z)
}
