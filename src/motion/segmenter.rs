//! Splits straight machine-space moves into short segments for nonlinear
//! geometries, where a straight line is a curve in actuator space.

use libm::ceilf;

use crate::config::PlannerConfig;
use crate::kinematics::Position;

/// Segment count policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segmenter {
    print_rate: f32,
    travel_rate: f32,
    batch: usize,
}

impl Segmenter {
    /// Create a segmenter from the planner section.
    pub fn new(config: &PlannerConfig) -> Self {
        Self {
            print_rate: config.segments_per_second_print,
            travel_rate: config.segments_per_second_travel,
            batch: config.max_segments_per_line.max(1),
        }
    }

    /// Segments queued per feeding call.
    #[inline]
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// Number of segments for a move of `length` mm at `speed` mm/s.
    ///
    /// Proportional to the move duration; a move shorter than one segment
    /// period is not split.
    pub fn segment_count(&self, length: f32, speed: f32, travel: bool) -> usize {
        let rate = if travel { self.travel_rate } else { self.print_rate };
        if length <= 0.0 || speed <= 0.0 || rate <= 0.0 {
            return 1;
        }

        let duration = length / speed;
        if duration < 1.0 / rate {
            return 1;
        }
        (ceilf(duration * rate) as usize).max(1)
    }

    /// Endpoint `k` (1-based) of `count` segments from `from` to `to`.
    ///
    /// Endpoint `count` is exactly `to`.
    pub fn endpoint(from: Position, to: Position, count: usize, k: usize) -> Position {
        let count = count.max(1);
        if k >= count {
            to
        } else {
            from.lerp(&to, k as f32 / count as f32)
        }
    }

    /// Segment endpoints from `from` to `to` in order.
    pub fn endpoints(from: Position, to: Position, count: usize) -> impl Iterator<Item = Position> {
        let count = count.max(1);
        (1..=count).map(move |k| Self::endpoint(from, to, count, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new(&PlannerConfig::default())
    }

    #[test]
    fn test_short_move_not_split() {
        // 0.1 mm at 100 mm/s is 1 ms, below one 1/180 s period
        assert_eq!(segmenter().segment_count(0.1, 100.0, false), 1);
    }

    #[test]
    fn test_count_from_duration() {
        // 1 s at 180 segments/s
        assert_eq!(segmenter().segment_count(50.0, 50.0, false), 180);
        // 50 ms travel at 70 segments/s = 3.5 -> 4
        assert_eq!(segmenter().segment_count(5.0, 100.0, true), 4);
    }

    #[test]
    fn test_long_move_not_capped() {
        // 9 s at 180 segments/s
        assert_eq!(segmenter().segment_count(90.0, 10.0, false), 1620);
        assert_eq!(segmenter().batch(), 22);
    }

    #[test]
    fn test_last_endpoint_is_exact_target() {
        let from = Position::xyz(0.1, 0.2, 0.3);
        let to = Position::xyz(33.3, -17.7, 2.9).with_e(1.37);
        let points: heapless::Vec<Position, 8> = Segmenter::endpoints(from, to, 7).collect();
        assert_eq!(points.len(), 7);
        assert_eq!(points[6], to);
        assert_eq!(Segmenter::endpoint(from, to, 7, 3), points[2]);
        assert!((points[0].x - (0.1 + 33.2 / 7.0)).abs() < 1e-4);
    }
}
