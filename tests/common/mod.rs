//! Simulated machine shared by the integration tests.
//!
//! The step sink integrates pulses into physical carriage positions and the
//! endstop monitor compares them to switch positions, so homing and probing
//! run against the same state the scheduler drives.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use motion_core::machine::{EndstopMonitor, MotionCore, RunState};
use motion_core::{Axis, AxisSet, Direction, StepSink, TickOutcome};

/// A switch that closes once the carriage passes `at` in its home direction.
#[derive(Debug, Clone, Copy)]
pub struct Switch {
    pub at: i64,
    pub toward_max: bool,
}

impl Switch {
    pub fn min(at: i64) -> Self {
        Self { at, toward_max: false }
    }

    pub fn max(at: i64) -> Self {
        Self { at, toward_max: true }
    }

    fn closed(&self, position: i64) -> bool {
        if self.toward_max {
            position >= self.at
        } else {
            position <= self.at
        }
    }
}

/// Physical state of the simulated machine.
#[derive(Debug, Default)]
pub struct Sim {
    pub physical: [i64; 4],
    pub pulses: [u64; 4],
    pub switches: [Option<Switch>; 4],
    /// Physical Z step count at or below which the probe closes.
    pub probe_at: Option<i64>,
    pub enabled: [bool; 4],
    pub direction: [i64; 4],
}

pub type Shared = Rc<RefCell<Sim>>;

pub fn shared(sim: Sim) -> Shared {
    Rc::new(RefCell::new(sim))
}

pub struct SimSink(pub Shared);

impl StepSink for SimSink {
    fn set_direction(&mut self, axis: Axis, direction: Direction) {
        self.0.borrow_mut().direction[axis.index()] = i64::from(direction.sign());
    }

    fn step(&mut self, axes: AxisSet) {
        let mut sim = self.0.borrow_mut();
        for axis in axes.axes() {
            let i = axis.index();
            sim.physical[i] += sim.direction[i];
            sim.pulses[i] += 1;
        }
    }

    fn set_enabled(&mut self, axis: Axis, enabled: bool) {
        self.0.borrow_mut().enabled[axis.index()] = enabled;
    }
}

pub struct SimEndstops(pub Shared);

impl EndstopMonitor for SimEndstops {
    fn is_triggered(&mut self, axis: Axis) -> bool {
        let sim = self.0.borrow();
        let i = axis.index();
        sim.switches[i].map_or(false, |s| s.closed(sim.physical[i]))
    }

    fn probe_triggered(&mut self) -> bool {
        let sim = self.0.borrow();
        sim.probe_at.map_or(false, |z| sim.physical[Axis::Z.index()] <= z)
    }
}

pub type SimCore = MotionCore<SimSink, SimEndstops>;

/// Tick and service the core until it is idle. Returns the outcomes of every
/// tick that completed a move.
pub fn run_until_idle(core: &mut SimCore, max_ticks: usize) -> Vec<TickOutcome> {
    let mut completed = Vec::new();
    for _ in 0..max_ticks {
        core.service().expect("service failed");
        if !core.is_busy() && core.state() != RunState::Homing {
            return completed;
        }
        let outcome = core.tick();
        if outcome.completed.is_some() {
            completed.push(outcome);
        }
    }
    panic!("machine still busy after {max_ticks} ticks");
}
