//! Junction and jerk planner.
//!
//! Every queued move gets a junction limit with its predecessor at admission.
//! [`JunctionPlanner::replan`] then runs a backward pass from the tail (which
//! always plans to come to rest) and a forward pass from the head, so each
//! move can reach its exit speed within its own length. The executing head is
//! never rewritten; the first unstarted move inherits the head's exit speed.

use libm::{fabsf, sqrtf};

use crate::config::{MachineParameters, PlannerConfig};
use crate::kinematics::{Axis, NUM_AXES};

use super::block::{Move, MoveFlags};
use super::queue::MoveQueue;
use super::MAX_QUEUE_CAPACITY;

/// Junction jerk budgets in mm/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JerkLimits {
    /// XY plane.
    pub xy: f32,
    /// Z axis.
    pub z: f32,
    /// Extruder.
    pub e: f32,
}

impl JerkLimits {
    /// Read the budgets from derived machine parameters.
    pub fn from_parameters(params: &MachineParameters) -> Self {
        Self {
            xy: params.jerk,
            z: params.z_jerk,
            e: params.e_jerk,
        }
    }

    /// Largest speed along `vector` whose per-group components stay within
    /// `scale` times each budget.
    fn speed_bound(&self, vector: &[f32; NUM_AXES], scale: f32) -> f32 {
        let mut bound = f32::INFINITY;
        let xy = sqrtf(vector[0] * vector[0] + vector[1] * vector[1]);
        if xy > 0.0 {
            bound = bound.min(self.xy * scale / xy);
        }
        let z = fabsf(vector[2]);
        if z > 0.0 {
            bound = bound.min(self.z * scale / z);
        }
        let e = fabsf(vector[3]);
        if e > 0.0 {
            bound = bound.min(self.e * scale / e);
        }
        bound
    }
}

/// Lookahead planner over the move queue.
#[derive(Debug, Clone)]
pub struct JunctionPlanner {
    jerk: JerkLimits,
    iterations: u8,
    low_water_mark: usize,
    low_water_min_time: f32,
}

impl JunctionPlanner {
    /// Create a planner from configuration.
    pub fn new(config: &PlannerConfig, params: &MachineParameters) -> Self {
        Self {
            jerk: JerkLimits::from_parameters(params),
            iterations: config.planner_iterations.max(1),
            low_water_mark: config.low_water_mark,
            low_water_min_time: config.low_water_min_move_time(),
        }
    }

    /// Apply axis caps to a move whose geometry and requested feedrate are set.
    ///
    /// Sets cruise cap, path acceleration and safe speed. Every velocity
    /// component stays within its axis' max feedrate and every acceleration
    /// component within its axis' limit.
    pub fn apply_limits(&self, mv: &mut Move, params: &MachineParameters) {
        let travel = mv.flags.contains(MoveFlags::TRAVEL);
        let mut cruise = mv.requested_feedrate;
        let mut accel = f32::INFINITY;

        for axis in Axis::ALL {
            let u = fabsf(mv.unit[axis.index()]);
            if u > 0.0 {
                let limits = params.axis(axis);
                cruise = cruise.min(limits.max_feedrate / u);
                accel = accel.min(limits.acceleration(travel) / u);
            }
        }

        mv.cruise = cruise;
        mv.acceleration = if accel.is_finite() { accel } else { 0.0 };
        mv.safe_speed = cruise.min(self.jerk.speed_bound(&mv.unit, 0.5));
    }

    /// Stretch a move to the low-water minimum duration when the queue is
    /// running low. Returns `true` if the cruise speed was reduced.
    pub fn clamp_low_water(&self, mv: &mut Move, occupancy: usize) -> bool {
        if occupancy >= self.low_water_mark || mv.cruise <= 0.0 {
            return false;
        }
        let duration = mv.length / mv.cruise;
        if duration >= self.low_water_min_time {
            return false;
        }
        mv.cruise = mv.length / self.low_water_min_time;
        mv.safe_speed = mv.safe_speed.min(mv.cruise);
        true
    }

    /// Maximum speed through the junction between `prev` and `next`.
    ///
    /// Both moves are assumed to pass the junction at the same speed along
    /// their own unit vectors; the speed is scaled down until the velocity
    /// change fits every jerk budget. Junctions touching a homing or probe
    /// move are stop junctions bounded by both safe speeds.
    pub fn junction_speed(&self, prev: &Move, next: &Move) -> f32 {
        let stop = prev.safe_speed.min(next.safe_speed);
        if prev.is_stop_move() || next.is_stop_move() {
            return stop;
        }

        let mut delta = [0.0; NUM_AXES];
        for i in 0..NUM_AXES {
            delta[i] = next.unit[i] - prev.unit[i];
        }

        let v = prev
            .cruise
            .min(next.cruise)
            .min(self.jerk.speed_bound(&delta, 1.0));
        // Both safe speeds always fit the budget; guard against rounding.
        v.max(stop)
    }

    /// Set the junction limit of a move about to be appended behind `prev`.
    pub fn link(&self, prev: Option<&Move>, next: &mut Move) {
        next.max_entry = match prev {
            Some(prev) => self.junction_speed(prev, next),
            None => next.safe_speed,
        };
    }

    /// Re-optimize entry and exit speeds of all unstarted moves.
    ///
    /// Returns the number of moves whose speeds changed. Running it again on
    /// an unchanged queue returns 0.
    pub fn replan(&self, queue: &mut MoveQueue) -> usize {
        let n = queue.len();
        let pinned = match queue.head() {
            Some(head) if head.started => Some(head.exit),
            Some(_) => None,
            None => return 0,
        };
        let first = usize::from(pinned.is_some());
        if first >= n {
            return 0;
        }

        // v[k] is the entry speed of move k; v[n] is the exit of the tail.
        let mut v = [0.0f32; MAX_QUEUE_CAPACITY + 1];
        let mut reach_sq = [0.0f32; MAX_QUEUE_CAPACITY];
        for k in first..n {
            if let Some(mv) = queue.get(k) {
                v[k] = mv.max_entry;
                reach_sq[k] = 2.0 * mv.acceleration * mv.length;
            }
        }
        if let Some(entry) = pinned {
            v[first] = entry;
        }
        v[n] = 0.0;

        for _ in 0..self.iterations {
            let mut changed = false;

            // Backward: every move must be able to slow down to its exit.
            for k in (first..n).rev() {
                if k == first && pinned.is_some() {
                    continue;
                }
                let limit = sqrtf(v[k + 1] * v[k + 1] + reach_sq[k]);
                if v[k] > limit {
                    v[k] = limit;
                    changed = true;
                }
            }

            // Forward: every move must be able to speed up to its exit.
            for k in first..n {
                let limit = sqrtf(v[k] * v[k] + reach_sq[k]);
                if v[k + 1] > limit {
                    v[k + 1] = limit;
                    changed = true;
                }
            }

            if !changed {
                break;
            }
        }

        let mut changes = 0;
        for k in first..n {
            if let Some(mv) = queue.get_mut(k) {
                if mv.entry != v[k] || mv.exit != v[k + 1] {
                    mv.entry = v[k];
                    mv.exit = v[k + 1];
                    mv.update_profile();
                    changes += 1;
                }
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;
    use crate::kinematics::Position;

    fn setup() -> (JunctionPlanner, MachineParameters) {
        let config = MachineConfig::default();
        let params = MachineParameters::from_config(&config);
        (JunctionPlanner::new(&config.planner, &params), params)
    }

    fn line(planner: &JunctionPlanner, params: &MachineParameters, dx: f32, dy: f32) -> Move {
        let length = sqrtf(dx * dx + dy * dy);
        let mut mv = Move {
            to: Position::xyz(dx, dy, 0.0),
            unit: [dx / length, dy / length, 0.0, 0.0],
            length,
            primary_steps: (length * 80.0) as u32,
            requested_feedrate: 100.0,
            ..Move::EMPTY
        };
        planner.apply_limits(&mut mv, params);
        mv
    }

    fn enqueue(planner: &JunctionPlanner, queue: &mut MoveQueue, mut mv: Move) {
        planner.link(queue.tail(), &mut mv);
        queue.push(mv).unwrap();
        planner.replan(queue);
    }

    #[test]
    fn test_safe_speed_is_half_jerk() {
        let (planner, params) = setup();
        let mv = line(&planner, &params, 10.0, 0.0);
        assert!((mv.safe_speed - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_collinear_junction_keeps_cruise() {
        let (planner, params) = setup();
        let a = line(&planner, &params, 10.0, 0.0);
        let b = line(&planner, &params, 20.0, 0.0);
        assert!((planner.junction_speed(&a, &b) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_right_angle_junction_within_jerk() {
        let (planner, params) = setup();
        let a = line(&planner, &params, 10.0, 0.0);
        let b = line(&planner, &params, 0.0, 10.0);
        let v = planner.junction_speed(&a, &b);

        // |Δu| = sqrt(2), jerk 20
        assert!((v - 20.0 / sqrtf(2.0)).abs() < 1e-3);
    }

    #[test]
    fn test_continuity_and_rest_at_tail() {
        let (planner, params) = setup();
        let mut queue = MoveQueue::new(16);
        enqueue(&planner, &mut queue, line(&planner, &params, 10.0, 0.0));
        enqueue(&planner, &mut queue, line(&planner, &params, 10.0, 0.0));
        enqueue(&planner, &mut queue, line(&planner, &params, 0.0, 10.0));

        let moves: heapless::Vec<Move, 4> = queue.iter().copied().collect();
        assert!(moves[0].entry <= moves[0].safe_speed);
        assert_eq!(moves[0].exit, moves[1].entry);
        assert_eq!(moves[1].exit, moves[2].entry);
        assert_eq!(moves[2].exit, 0.0);
        for mv in &moves {
            assert!(mv.entry <= mv.cruise && mv.exit <= mv.cruise);
        }
    }

    #[test]
    fn test_replan_is_idempotent() {
        let (planner, params) = setup();
        let mut queue = MoveQueue::new(16);
        for i in 0..6 {
            let (dx, dy) = if i % 2 == 0 { (5.0, 1.0) } else { (-1.0, 4.0) };
            enqueue(&planner, &mut queue, line(&planner, &params, dx, dy));
        }
        assert_eq!(planner.replan(&mut queue), 0);
    }

    #[test]
    fn test_started_head_is_not_rewritten() {
        let (planner, params) = setup();
        let mut queue = MoveQueue::new(16);
        enqueue(&planner, &mut queue, line(&planner, &params, 10.0, 0.0));
        queue.head_mut().unwrap().started = true;
        let head_before = *queue.head().unwrap();

        enqueue(&planner, &mut queue, line(&planner, &params, 10.0, 0.0));

        assert_eq!(*queue.head().unwrap(), head_before);
        assert_eq!(queue.get(1).unwrap().entry, head_before.exit);
    }

    #[test]
    fn test_low_water_clamp_stretches_short_moves() {
        let (planner, params) = setup();
        let mut mv = line(&planner, &params, 1.0, 0.0);

        // 1 mm at 100 mm/s is 10 ms, below the 15.625 ms minimum
        assert!(planner.clamp_low_water(&mut mv, 0));
        assert!((mv.length / mv.cruise - 0.015625).abs() < 1e-5);

        let mut full = line(&planner, &params, 1.0, 0.0);
        assert!(!planner.clamp_low_water(&mut full, 12));
    }

    #[test]
    fn test_homing_moves_are_stop_junctions() {
        let (planner, params) = setup();
        let a = line(&planner, &params, 10.0, 0.0);
        let mut b = line(&planner, &params, 10.0, 0.0);
        b.flags = MoveFlags::HOMING;
        assert_eq!(planner.junction_speed(&a, &b), a.safe_speed.min(b.safe_speed));
    }
}
