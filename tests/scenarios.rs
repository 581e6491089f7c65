//! End-to-end machine scenarios on the simulated machine.

mod common;

use common::{run_until_idle, shared, Sim, SimCore, SimEndstops, SimSink, Switch};

use motion_core::config::parse_config;
use motion_core::error::{KinematicsError, MotionError, QueueError};
use motion_core::machine::{HomeState, MotionEvent, RunState};
use motion_core::{
    Axis, AxisSet, Error, MachineConfig, MmPerSec, MotionCoreBuilder, MoveFlags, Position,
};

const TICKS: usize = 2_000_000;

fn build(config: MachineConfig, sim: Sim) -> (SimCore, common::Shared) {
    let sim = shared(sim);
    let core = MotionCoreBuilder::new()
        .config(config)
        .sink(SimSink(sim.clone()))
        .endstops(SimEndstops(sim.clone()))
        .build()
        .expect("core should build");
    (core, sim)
}

fn cartesian_switches() -> Sim {
    Sim {
        switches: [
            Some(Switch::min(-1000)),
            Some(Switch::min(-800)),
            Some(Switch::min(-400)),
            None,
        ],
        ..Sim::default()
    }
}

fn unrestricted() -> MachineConfig {
    let mut config = MachineConfig::default();
    config.homing.require_homing = false;
    config
}

fn drain_events(core: &mut SimCore) -> Vec<MotionEvent> {
    std::iter::from_fn(|| core.poll_event()).collect()
}

#[test]
fn homing_sets_home_positions() {
    let (mut core, sim) = build(MachineConfig::default(), cartesian_switches());

    core.request_home(AxisSet::XYZ).unwrap();
    assert_eq!(core.state(), RunState::Homing);
    run_until_idle(&mut core, TICKS);

    let report = core.last_homing_report().expect("homing should finish");
    assert!(report.is_success());
    assert_eq!(report.homed, AxisSet::XYZ);

    let planned = core.planned_position();
    assert!((planned.x + 40.0).abs() < 1e-4);
    assert!((planned.y + 15.0).abs() < 1e-4);
    assert!(planned.z.abs() < 1e-4);

    // Retest stops on the switch edge.
    let sim = sim.borrow();
    assert_eq!(sim.physical[0], -1000);
    assert_eq!(sim.physical[1], -800);
    assert_eq!(sim.physical[2], -400);
    assert_eq!(core.actuator_positions()[0], -40 * 80);

    assert!(drain_events(&mut core)
        .iter()
        .any(|e| matches!(e, MotionEvent::HomingFinished(r) if r.is_success())));
}

#[test]
fn missing_x_endstop_still_homes_y() {
    let mut sim = cartesian_switches();
    sim.switches[0] = None;
    let (mut core, _sim) = build(MachineConfig::default(), sim);

    core.request_home(AxisSet::XYZ).unwrap();
    run_until_idle(&mut core, TICKS);

    let report = core.last_homing_report().unwrap();
    assert!(!report.is_success());
    assert!(report.failed.has(Axis::X));
    assert!(report.homed.has(Axis::Y));
    assert!(report.homed.has(Axis::Z));
    assert_eq!(core.axis_state(Axis::X).home, HomeState::Failed);

    let events = drain_events(&mut core);
    assert!(events.contains(&MotionEvent::EndstopNotFound { axis: Axis::X }));

    // X moves are still refused, Y moves are admitted.
    let mut target = core.planned_position();
    target.x += 10.0;
    assert_eq!(
        core.enqueue_move(target, 50.0, MoveFlags::empty()),
        Err(Error::Motion(MotionError::AxisNotHomed { axis: Axis::X }))
    );
    let mut target = core.planned_position();
    target.y += 10.0;
    core.enqueue_move(target, 50.0, MoveFlags::empty()).unwrap();
}

#[test]
fn full_queue_rejects_then_drains_in_order() {
    let mut config = unrestricted();
    config.planner.jerk = MmPerSec(20.0);
    let (mut core, _sim) = build(config, Sim::default());
    assert_eq!(core.queue().capacity(), 16);

    let targets: Vec<Position> = (1..=20)
        .map(|i| Position::xyz(i as f32, if i % 2 == 0 { 1.0 } else { 0.0 }, 0.0))
        .collect();

    for target in &targets[..16] {
        core.enqueue_move(*target, 200.0, MoveFlags::empty()).unwrap();
    }
    let planned = core.planned_position();
    assert_eq!(
        core.enqueue_move(targets[16], 200.0, MoveFlags::empty()),
        Err(Error::Queue(QueueError::Full { needed: 1, free: 0 }))
    );
    assert_eq!(core.queue().len(), 16);
    assert_eq!(core.planned_position(), planned);

    let mut completed = Vec::new();
    for target in &targets[16..] {
        while core.queue().free() == 0 {
            let outcome = core.tick();
            completed.extend(outcome.completed);
        }
        core.enqueue_move(*target, 200.0, MoveFlags::empty()).unwrap();
    }
    completed.extend(
        run_until_idle(&mut core, TICKS)
            .into_iter()
            .filter_map(|o| o.completed),
    );

    assert_eq!(completed, (0..20).collect::<Vec<u32>>());
    assert_eq!(core.actuator_positions()[0], 20 * 80);
    assert_eq!(core.actuator_positions()[1], 80);
}

#[test]
fn homing_flag_is_reserved_for_the_core() {
    let (mut core, _sim) = build(MachineConfig::default(), cartesian_switches());

    // Far outside the soft limits on an unhomed machine.
    assert_eq!(
        core.enqueue_move(Position::xyz(5000.0, 0.0, 0.0), 50.0, MoveFlags::HOMING),
        Err(Error::Motion(MotionError::ReservedFlags))
    );
    assert!(core.queue().is_empty());
    assert!(!core.is_busy());
    assert_eq!(core.planned_position(), Position::default());
}

#[test]
fn distortion_grid_applies_between_move_endpoints() {
    let mut config = unrestricted();
    config.leveling.distortion_correction = true;
    config.leveling.grid_points = 5;
    config.leveling.grid_min = [0.0, 0.0];
    config.leveling.grid_max = [160.0, 160.0];
    let (mut core, sim) = build(config, Sim::default());

    // A bump in the middle of the bed; every other node is flat.
    let grid = core.compensator_mut().grid_mut().expect("grid from config");
    assert_eq!(grid.node(2, 2), (80.0, 80.0));
    grid.set(2, 2, 0.5);

    core.enqueue_move(Position::xyz(0.0, 80.0, 0.0), 100.0, MoveFlags::empty())
        .unwrap();
    core.enqueue_move(Position::xyz(160.0, 80.0, 0.0), 50.0, MoveFlags::empty())
        .unwrap();

    let mut highest = 0;
    for _ in 0..TICKS {
        core.service().unwrap();
        if !core.is_busy() {
            break;
        }
        core.tick();
        highest = highest.max(sim.borrow().physical[2]);
    }

    // Both endpoints sit on flat nodes; the bump is crossed mid-move.
    assert_eq!(highest, 200);
    assert_eq!(sim.borrow().physical[2], 0);
    assert_eq!(core.actuator_positions(), [160 * 80, 80 * 80, 0, 0]);
}

#[test]
fn fast_move_uses_quad_stepping() {
    let mut config = unrestricted();
    config.axes.x.steps_per_mm = 350.0;
    config.axes.x.max_feedrate.0 = 120.0;
    config.axes.x.max_acceleration.0 = 3000.0;
    config.stepper.tick_frequency_hz = 16_000;
    config.stepper.step_doubler_frequency_hz = 12_000;
    config.stepper.allow_quad_stepping = true;
    let (mut core, sim) = build(config, Sim::default());

    core.enqueue_move(Position::xyz(60.0, 0.0, 0.0), 100.0, MoveFlags::empty())
        .unwrap();

    let mut max_multiplier = 0;
    while core.is_busy() {
        let outcome = core.tick();
        max_multiplier = max_multiplier.max(outcome.multiplier);
    }

    // 100 mm/s at 350 steps/mm is 35 kHz, above twice the 12 kHz threshold.
    assert_eq!(max_multiplier, 4);
    assert_eq!(sim.borrow().pulses[0], 21_000);
    assert_eq!(core.actuator_positions()[0], 21_000);
}

#[test]
fn emergency_stop_requires_rehome() {
    let (mut core, _sim) = build(MachineConfig::default(), cartesian_switches());
    core.request_home(AxisSet::XYZ).unwrap();
    run_until_idle(&mut core, TICKS);

    core.enqueue_move(Position::xyz(50.0, 50.0, 0.0), 50.0, MoveFlags::empty())
        .unwrap();
    for _ in 0..100 {
        core.tick();
    }
    core.emergency_stop();

    assert_eq!(core.state(), RunState::EmergencyStopped);
    assert!(core.queue().is_empty());
    assert!(!core.axis_state(Axis::X).is_homed());
    assert_eq!(
        core.enqueue_move(Position::xyz(0.0, 0.0, 0.0), 50.0, MoveFlags::empty()),
        Err(Error::Motion(MotionError::EmergencyStopped))
    );

    core.request_home(AxisSet::XYZ).unwrap();
    run_until_idle(&mut core, TICKS);
    assert_eq!(core.state(), RunState::Idle);
    core.enqueue_move(Position::xyz(0.0, 0.0, 0.0), 50.0, MoveFlags::empty())
        .unwrap();
}

#[test]
fn probe_stops_at_trigger_height() {
    let (mut core, sim) = build(MachineConfig::default(), cartesian_switches());
    core.request_home(AxisSet::XYZ).unwrap();
    run_until_idle(&mut core, TICKS);

    // Logical Z = 0 sits on the Z switch; the probe closes 2 mm above it.
    sim.borrow_mut().probe_at = Some(-400 + 2 * 400);

    let start = core.planned_position();
    core.enqueue_move(
        Position::xyz(start.x, start.y, 10.0),
        5.0,
        MoveFlags::empty(),
    )
    .unwrap();
    run_until_idle(&mut core, TICKS);
    drain_events(&mut core);

    core.enqueue_move(Position::xyz(start.x, start.y, 0.5), 2.0, MoveFlags::PROBE)
        .unwrap();
    run_until_idle(&mut core, TICKS);

    let hit = drain_events(&mut core).into_iter().find_map(|e| match e {
        MotionEvent::ProbeTriggered { position, .. } => Some(position),
        _ => None,
    });
    let position = hit.expect("probe should trigger");
    assert!((position.z - 2.0).abs() < 0.05, "z = {}", position.z);
    assert!((core.planned_position().z - position.z).abs() < 1e-4);
    assert!(core.queue().is_empty());
}

#[test]
fn paused_machine_refuses_moves() {
    let (mut core, _sim) = build(unrestricted(), Sim::default());
    core.pause();
    assert_eq!(core.state(), RunState::Paused);
    assert_eq!(
        core.enqueue_move(Position::xyz(1.0, 0.0, 0.0), 10.0, MoveFlags::empty()),
        Err(Error::Motion(MotionError::AdmissionClosed))
    );

    core.on_door_open();
    assert_eq!(core.state(), RunState::DoorOpen);
    core.resume();
    core.on_door_closed();
    assert_eq!(core.state(), RunState::Idle);
    core.enqueue_move(Position::xyz(1.0, 0.0, 0.0), 10.0, MoveFlags::empty())
        .unwrap();
    assert_eq!(core.state(), RunState::Running);
}

#[test]
fn reports_moving_axes_until_drained() {
    let (mut core, _sim) = build(unrestricted(), Sim::default());
    core.enqueue_move(Position::xyz(5.0, 0.0, 0.0), 50.0, MoveFlags::empty())
        .unwrap();
    core.enqueue_move(Position::xyz(5.0, 0.0, 1.0), 5.0, MoveFlags::empty())
        .unwrap();

    assert!(core.is_axis_moving(Axis::X));
    assert!(core.is_axis_moving(Axis::Z));
    assert!(!core.is_axis_moving(Axis::Y));

    // Z still moves while the X move executes.
    core.tick();
    assert!(core.is_axis_moving(Axis::Z));

    run_until_idle(&mut core, TICKS);
    assert!(!core.is_axis_moving(Axis::X));
    assert!(!core.is_axis_moving(Axis::Z));
    assert_eq!(core.sink_mut().0.borrow().pulses[0], 400);
}

#[test]
fn endstop_hit_halts_axis_in_motion() {
    let (mut core, sim) = build(unrestricted(), Sim::default());
    core.enqueue_move(Position::xyz(-20.0, 0.0, 0.0), 50.0, MoveFlags::empty())
        .unwrap();

    // A switch 5 mm into the move.
    core.endstops_mut().0.borrow_mut().switches[0] = Some(Switch::min(-400));
    run_until_idle(&mut core, TICKS);

    let physical = sim.borrow().physical[0];
    assert!((-402..=-400).contains(&physical), "stopped at {physical}");
    assert_eq!(core.axis_state(Axis::X).home, HomeState::Unknown);
    assert!(drain_events(&mut core).contains(&MotionEvent::EndstopHit { axis: Axis::X }));
}

fn delta_switches(at: [i64; 3]) -> Sim {
    Sim {
        switches: [
            Some(Switch::max(at[0])),
            Some(Switch::max(at[1])),
            Some(Switch::max(at[2])),
            None,
        ],
        ..Sim::default()
    }
}

const DELTA: &str = r#"
name = "delta"

[kinematics]
mode = "delta"

[kinematics.delta]
diagonal_rod = 345.0
printer_radius = 124.0
max_radius = 100.0

[axes.x]
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 200.0
max_acceleration_mm_per_sec2 = 1000.0
min_position_mm = -150.0
max_position_mm = 150.0
home_direction = "max"
endstop = {}

[axes.y]
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 200.0
max_acceleration_mm_per_sec2 = 1000.0
min_position_mm = -150.0
max_position_mm = 150.0
home_direction = "max"
endstop = {}

[axes.z]
steps_per_mm = 80.0
max_feedrate_mm_per_sec = 200.0
max_acceleration_mm_per_sec2 = 1000.0
min_position_mm = 0.0
max_position_mm = 300.0
home_direction = "max"
endstop = {}
"#;

#[test]
fn delta_rejects_unreachable_target_atomically() {
    let config = parse_config(DELTA).unwrap();
    let (mut core, sim) = build(config, delta_switches([800, 800, 800]));

    // Any tower request homes all three.
    core.request_home(Axis::Z.set()).unwrap();
    run_until_idle(&mut core, TICKS);
    assert_eq!(core.last_homing_report().unwrap().homed, AxisSet::XYZ);
    assert_eq!(core.planned_position(), Position::xyz(0.0, 0.0, 300.0));

    core.enqueue_move(Position::xyz(0.0, 0.0, 290.0), 20.0, MoveFlags::empty())
        .unwrap();
    let queued = core.queue().len();
    assert!(queued > 1, "delta moves are segmented");

    let result = core.enqueue_move(Position::xyz(101.0, 0.0, 290.0), 20.0, MoveFlags::empty());
    assert!(matches!(
        result,
        Err(Error::Kinematics(KinematicsError::Unreachable { .. }))
    ));
    assert_eq!(core.queue().len(), queued);
    assert_eq!(core.planned_position(), Position::xyz(0.0, 0.0, 290.0));

    run_until_idle(&mut core, TICKS);
    let sim = sim.borrow();
    for tower in 0..3 {
        assert!(sim.physical[tower].abs() <= 1, "tower {tower} at {}", sim.physical[tower]);
    }
}

#[test]
fn delta_towers_home_together() {
    let config = parse_config(DELTA).unwrap();
    let (mut core, sim) = build(config, delta_switches([800, 760, 820]));

    core.request_home(AxisSet::XYZ).unwrap();
    let mut x_when_y_hit = None;
    for _ in 0..TICKS {
        core.service().unwrap();
        if !core.is_busy() && core.state() != RunState::Homing {
            break;
        }
        core.tick();
        let sim = sim.borrow();
        if x_when_y_hit.is_none() && sim.physical[1] >= 760 {
            x_when_y_hit = Some(sim.physical[0]);
        }
    }

    // The carriages climb side by side until each meets its own switch.
    let x = x_when_y_hit.expect("Y switch reached");
    assert!((758..=762).contains(&x), "X at {x} when Y hit its switch");

    assert_eq!(sim.borrow().physical[..3], [800, 760, 820]);
    let report = core.last_homing_report().unwrap();
    assert_eq!(report.homed, AxisSet::XYZ);
    assert_eq!(core.planned_position(), Position::xyz(0.0, 0.0, 300.0));
    let home = core.resolver().resolve(&Position::xyz(0.0, 0.0, 300.0)).unwrap();
    assert_eq!(core.actuator_positions(), home);
}

#[test]
fn long_delta_move_streams_every_segment() {
    let mut config = parse_config(DELTA).unwrap();
    config.homing.require_homing = false;
    let (mut core, _sim) = build(config, delta_switches([800, 800, 800]));
    core.request_home(AxisSet::XYZ).unwrap();
    run_until_idle(&mut core, TICKS);

    // 90 mm at 10 mm/s is 9 s, 1620 segments at 180 per second.
    let target = Position::xyz(-90.0, 0.0, 300.0);
    core.enqueue_move(target, 10.0, MoveFlags::empty()).unwrap();
    let capacity = core.queue().capacity();
    assert_eq!(core.queue().len(), capacity);
    assert_eq!(core.planned_position(), target);

    let mut completed = 0;
    for _ in 0..TICKS {
        core.service().unwrap();
        assert!(core.queue().len() <= capacity);
        if !core.is_busy() {
            break;
        }
        if core.tick().completed.is_some() {
            completed += 1;
        }
    }

    assert!(!core.is_busy());
    assert!(completed >= 1620, "only {completed} segments ran");
    assert_eq!(core.actuator_positions(), core.resolver().resolve(&target).unwrap());
}
