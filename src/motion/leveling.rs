//! Z compensation for bed tilt and mechanical distortion.
//!
//! The correction is the sum of a bed plane and a bilinear distortion grid,
//! faded out between two heights so the upper layers print straight.

use libm::{fabsf, sqrtf};

use crate::config::{LevelingConfig, LevelingMethod, MAX_GRID_POINTS};
use crate::error::{ConfigError, Error, Result};

/// A Z offset as a function of the XY position.
pub trait ZCorrection {
    /// Offset in mm to add to Z at `(x, y)`.
    fn offset(&self, x: f32, y: f32) -> f32;
}

/// Bed plane `z = a·x + b·y + c`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BedPlane {
    /// X slope.
    pub a: f32,
    /// Y slope.
    pub b: f32,
    /// Offset at the origin.
    pub c: f32,
}

impl BedPlane {
    /// A level bed.
    pub const FLAT: Self = Self {
        a: 0.0,
        b: 0.0,
        c: 0.0,
    };

    /// Plane through three probe points `[x, y, z]`.
    ///
    /// Returns `None` if the points are collinear.
    pub fn through_points(p1: [f32; 3], p2: [f32; 3], p3: [f32; 3]) -> Option<Self> {
        let u = [p2[0] - p1[0], p2[1] - p1[1], p2[2] - p1[2]];
        let v = [p3[0] - p1[0], p3[1] - p1[1], p3[2] - p1[2]];
        let n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        if fabsf(n[2]) < f32::EPSILON {
            return None;
        }
        let a = -n[0] / n[2];
        let b = -n[1] / n[2];
        Some(Self {
            a,
            b,
            c: p1[2] - a * p1[0] - b * p1[1],
        })
    }

    /// Least-squares plane over a set of samples.
    ///
    /// Returns `None` for fewer than three samples or a degenerate layout.
    pub fn fit_grid(samples: &[[f32; 3]]) -> Option<Self> {
        if samples.len() < 3 {
            return None;
        }

        // Normal equations, centered for numerical stability.
        let n = samples.len() as f32;
        let (mut mx, mut my, mut mz) = (0.0, 0.0, 0.0);
        for p in samples {
            mx += p[0];
            my += p[1];
            mz += p[2];
        }
        mx /= n;
        my /= n;
        mz /= n;

        let (mut sxx, mut sxy, mut syy, mut sxz, mut syz) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for p in samples {
            let (dx, dy, dz) = (p[0] - mx, p[1] - my, p[2] - mz);
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
            sxz += dx * dz;
            syz += dy * dz;
        }

        let det = sxx * syy - sxy * sxy;
        if fabsf(det) < f32::EPSILON {
            return None;
        }
        let a = (sxz * syy - syz * sxy) / det;
        let b = (syz * sxx - sxz * sxy) / det;
        Some(Self {
            a,
            b,
            c: mz - a * mx - b * my,
        })
    }

    /// Plane for a cantilevered bed bending symmetrically around an axis.
    ///
    /// Points 2 and 3 lie on the unbent axis; point 4 is point 1 mirrored
    /// across it. The bend seen at points 1 and 4 is removed from point 1
    /// before the plane is built. `corrections` are added to points 1-3.
    pub fn bending(points: &[[f32; 3]; 4], corrections: [f32; 3]) -> Option<Self> {
        let mut p = *points;
        for (point, correction) in p.iter_mut().zip(corrections) {
            point[2] += correction;
        }
        let [p1, p2, p3, p4] = p;

        let axis = [p3[0] - p2[0], p3[1] - p2[1], p3[2] - p2[2]];
        let axis_len_sq = axis[0] * axis[0] + axis[1] * axis[1];
        if axis_len_sq < f32::EPSILON {
            return None;
        }

        // Height of the axis below point 1.
        let t = ((p1[0] - p2[0]) * axis[0] + (p1[1] - p2[1]) * axis[1]) / axis_len_sq;
        let foot_z = p2[2] + t * axis[2];

        // A plane gives z1 + z4 = 2·foot; the excess is twice the bend.
        let bend = (p1[2] + p4[2] - 2.0 * foot_z) / 2.0;
        Self::through_points([p1[0], p1[1], p1[2] - bend], p2, p3)
    }

    /// Build the plane configured in `[leveling]`, if any.
    pub fn from_config(config: &LevelingConfig) -> Result<Option<Self>> {
        let Some(method) = config.method else {
            return Ok(None);
        };
        let points = &config.points;
        let degenerate = || Error::Config(ConfigError::InvalidLevelingPoints(points.len()));

        let plane = match method {
            LevelingMethod::ThreePoint => {
                if points.len() < 3 {
                    return Err(degenerate());
                }
                Self::through_points(points[0], points[1], points[2])
            }
            LevelingMethod::GridRegression => Self::fit_grid(points),
            LevelingMethod::Bending => {
                if points.len() < 4 {
                    return Err(degenerate());
                }
                let four = [points[0], points[1], points[2], points[3]];
                Self::bending(&four, config.bending_correction)
            }
        };
        plane.map(Some).ok_or_else(degenerate)
    }

    /// Plane height at `(x, y)`.
    #[inline]
    pub fn height(&self, x: f32, y: f32) -> f32 {
        self.a * x + self.b * y + self.c
    }
}

impl ZCorrection for BedPlane {
    fn offset(&self, x: f32, y: f32) -> f32 {
        self.height(x, y)
    }
}

/// N×N grid of measured Z errors, bilinearly interpolated.
///
/// Positions outside the grid are clamped to its edge. With a radius limit
/// (round delta beds) positions are first pulled onto the circle.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionMap {
    points: usize,
    x_min: f32,
    y_min: f32,
    x_step: f32,
    y_step: f32,
    radius: Option<f32>,
    limit: f32,
    values: [f32; MAX_GRID_POINTS * MAX_GRID_POINTS],
}

impl DistortionMap {
    /// Zeroed grid of `points × points` over a rectangle.
    pub fn new(points: usize, x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Result<Self> {
        if !(2..=MAX_GRID_POINTS).contains(&points) {
            return Err(Error::Config(ConfigError::InvalidGridPoints(points)));
        }
        let span = (points - 1) as f32;
        Ok(Self {
            points,
            x_min,
            y_min,
            x_step: (x_max - x_min) / span,
            y_step: (y_max - y_min) / span,
            radius: None,
            limit: f32::INFINITY,
            values: [0.0; MAX_GRID_POINTS * MAX_GRID_POINTS],
        })
    }

    /// Clamp stored values to `±limit` mm.
    pub fn with_limit(mut self, limit: f32) -> Self {
        self.limit = fabsf(limit);
        self
    }

    /// Zeroed grid configured in `[leveling]`, if distortion correction is on.
    ///
    /// The grid is centered on the origin when a radius is configured or
    /// `bed_radius` is given, otherwise it spans the configured rectangle.
    pub fn from_config(config: &LevelingConfig, bed_radius: Option<f32>) -> Result<Option<Self>> {
        if !config.distortion_correction {
            return Ok(None);
        }
        let map = match config.grid_radius.or(bed_radius) {
            Some(radius) => Self::centered(config.grid_points, radius)?,
            None => Self::new(
                config.grid_points,
                config.grid_min[0],
                config.grid_min[1],
                config.grid_max[0],
                config.grid_max[1],
            )?,
        };
        Ok(Some(map.with_limit(config.distortion_limit)))
    }

    /// Zeroed grid over `[-radius, radius]²`, limited to the circle.
    pub fn centered(points: usize, radius: f32) -> Result<Self> {
        let mut map = Self::new(points, -radius, -radius, radius, radius)?;
        map.radius = Some(radius);
        Ok(map)
    }

    /// Grid edge length in points.
    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Shortest distance between neighboring nodes.
    #[inline]
    pub fn cell_size(&self) -> f32 {
        fabsf(self.x_step).min(fabsf(self.y_step))
    }

    /// Store the measured error at grid index `(ix, iy)`, clamped to the
    /// value limit. Out-of-range indices are ignored.
    pub fn set(&mut self, ix: usize, iy: usize, value: f32) {
        if ix < self.points && iy < self.points {
            self.values[iy * self.points + ix] = value.clamp(-self.limit, self.limit);
        }
    }

    /// Measured error at grid index `(ix, iy)`.
    pub fn get(&self, ix: usize, iy: usize) -> f32 {
        if ix < self.points && iy < self.points {
            self.values[iy * self.points + ix]
        } else {
            0.0
        }
    }

    /// Machine position of grid index `(ix, iy)`.
    pub fn node(&self, ix: usize, iy: usize) -> (f32, f32) {
        (
            self.x_min + ix as f32 * self.x_step,
            self.y_min + iy as f32 * self.y_step,
        )
    }

    fn cell(coord: f32, min: f32, step: f32, last: usize) -> (usize, f32) {
        if step == 0.0 {
            return (0, 0.0);
        }
        let g = ((coord - min) / step).clamp(0.0, last as f32);
        let i = (g as usize).min(last - 1);
        (i, g - i as f32)
    }
}

impl ZCorrection for DistortionMap {
    fn offset(&self, mut x: f32, mut y: f32) -> f32 {
        if let Some(radius) = self.radius {
            let r = sqrtf(x * x + y * y);
            if r > radius && r > 0.0 {
                x *= radius / r;
                y *= radius / r;
            }
        }

        let last = self.points - 1;
        let (ix, fx) = Self::cell(x, self.x_min, self.x_step, last);
        let (iy, fy) = Self::cell(y, self.y_min, self.y_step, last);

        let z00 = self.get(ix, iy);
        let z10 = self.get(ix + 1, iy);
        let z01 = self.get(ix, iy + 1);
        let z11 = self.get(ix + 1, iy + 1);

        let bottom = z00 + (z10 - z00) * fx;
        let top = z01 + (z11 - z01) * fx;
        bottom + (top - bottom) * fy
    }
}

/// Combined plane and grid correction with height fade-out.
#[derive(Debug, Clone, PartialEq)]
pub struct ZCompensator {
    plane: Option<BedPlane>,
    grid: Option<DistortionMap>,
    degrade_start: f32,
    degrade_end: f32,
}

impl ZCompensator {
    /// Compensator with no correction.
    pub fn new(degrade_start: f32, degrade_end: f32) -> Self {
        Self {
            plane: None,
            grid: None,
            degrade_start,
            degrade_end,
        }
    }

    /// Compensator with the configured degrade heights, bed plane and grid.
    ///
    /// `bed_radius` centers the grid on round beds.
    pub fn from_config(config: &LevelingConfig, bed_radius: Option<f32>) -> Result<Self> {
        let mut comp = Self::new(config.degrade_start, config.degrade_end);
        comp.plane = BedPlane::from_config(config)?;
        comp.grid = DistortionMap::from_config(config, bed_radius)?;
        Ok(comp)
    }

    /// Replace the bed plane.
    pub fn set_plane(&mut self, plane: Option<BedPlane>) {
        self.plane = plane;
    }

    /// Replace the distortion grid.
    pub fn set_grid(&mut self, grid: Option<DistortionMap>) {
        self.grid = grid;
    }

    /// Active bed plane.
    pub fn plane(&self) -> Option<&BedPlane> {
        self.plane.as_ref()
    }

    /// Active distortion grid.
    pub fn grid(&self) -> Option<&DistortionMap> {
        self.grid.as_ref()
    }

    /// Active distortion grid, to store measured values.
    pub fn grid_mut(&mut self) -> Option<&mut DistortionMap> {
        self.grid.as_mut()
    }

    /// Longest straight move that still follows the grid: half a cell, so
    /// every cell gets at least two correction updates.
    pub fn max_segment_length(&self) -> Option<f32> {
        self.grid
            .as_ref()
            .map(DistortionMap::cell_size)
            .filter(|cell| *cell > 0.0)
            .map(|cell| cell / 2.0)
    }

    /// Whether any correction is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.plane.is_some() || self.grid.is_some()
    }

    /// Fade factor at height `z`: 1 below the start, 0 at and above the end.
    pub fn degrade(&self, z: f32) -> f32 {
        if z <= self.degrade_start {
            1.0
        } else if z >= self.degrade_end {
            0.0
        } else {
            (self.degrade_end - z) / (self.degrade_end - self.degrade_start)
        }
    }

    /// Z offset to add at `(x, y, z)`.
    pub fn correct(&self, x: f32, y: f32, z: f32) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        let factor = self.degrade(z);
        if factor == 0.0 {
            return 0.0;
        }
        let plane = self.plane.as_ref().map(|p| p.offset(x, y)).unwrap_or(0.0);
        let grid = self.grid.as_ref().map(|g| g.offset(x, y)).unwrap_or(0.0);
        (plane + grid) * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tilted(x: f32, y: f32) -> f32 {
        0.01 * x - 0.02 * y + 0.3
    }

    fn assert_plane(plane: &BedPlane) {
        assert!((plane.a - 0.01).abs() < 1e-5);
        assert!((plane.b + 0.02).abs() < 1e-5);
        assert!((plane.c - 0.3).abs() < 1e-4);
    }

    #[test]
    fn test_plane_through_points() {
        let p = |x: f32, y: f32| [x, y, tilted(x, y)];
        let plane = BedPlane::through_points(p(100.0, 20.0), p(160.0, 170.0), p(20.0, 170.0)).unwrap();
        assert_plane(&plane);
    }

    #[test]
    fn test_collinear_points_rejected() {
        assert!(BedPlane::through_points([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 1.0]).is_none());
    }

    #[test]
    fn test_regression_recovers_plane() {
        let mut samples: heapless::Vec<[f32; 3], 16> = heapless::Vec::new();
        for ix in 0..4 {
            for iy in 0..4 {
                let (x, y) = (ix as f32 * 50.0, iy as f32 * 50.0);
                // ±0.01 alternating noise cancels in the fit
                let noise = if (ix + iy) % 2 == 0 { 0.01 } else { -0.01 };
                samples.push([x, y, tilted(x, y) + noise]).unwrap();
            }
        }
        let plane = BedPlane::fit_grid(&samples).unwrap();
        assert!((plane.a - 0.01).abs() < 1e-3);
        assert!((plane.b + 0.02).abs() < 1e-3);
    }

    #[test]
    fn test_bending_removes_symmetric_bend() {
        // Axis along y = 100; points 1 and 4 mirrored across it, both sagging 0.2
        let p1 = [50.0, 20.0, tilted(50.0, 20.0) - 0.2];
        let p2 = [0.0, 100.0, tilted(0.0, 100.0)];
        let p3 = [200.0, 100.0, tilted(200.0, 100.0)];
        let p4 = [50.0, 180.0, tilted(50.0, 180.0) - 0.2];
        let plane = BedPlane::bending(&[p1, p2, p3, p4], [0.0; 3]).unwrap();
        assert_plane(&plane);
    }

    #[test]
    fn test_grid_bilinear_and_clamp() {
        let mut map = DistortionMap::new(2, 0.0, 0.0, 100.0, 100.0).unwrap();
        map.set(1, 0, 1.0);
        map.set(1, 1, 1.0);

        assert!((map.offset(50.0, 50.0) - 0.5).abs() < 1e-6);
        assert!((map.offset(25.0, 80.0) - 0.25).abs() < 1e-6);
        // outside clamps to the edge
        assert!((map.offset(150.0, -20.0) - 1.0).abs() < 1e-6);
        assert!((map.offset(-10.0, 50.0)).abs() < 1e-6);
    }

    #[test]
    fn test_grid_radius_limit() {
        let mut map = DistortionMap::centered(3, 100.0).unwrap();
        map.set(2, 1, 0.4);
        // (200, 0) is pulled to (100, 0), the node itself
        assert!((map.offset(200.0, 0.0) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_grid_points_out_of_range() {
        assert!(DistortionMap::new(1, 0.0, 0.0, 1.0, 1.0).is_err());
        assert!(DistortionMap::new(MAX_GRID_POINTS + 1, 0.0, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_degrade() {
        let mut comp = ZCompensator::new(0.5, 1.5);
        comp.set_plane(Some(BedPlane { a: 0.0, b: 0.0, c: 0.2 }));

        assert_eq!(comp.correct(10.0, 10.0, 0.2), 0.2);
        assert!((comp.correct(10.0, 10.0, 1.0) - 0.1).abs() < 1e-6);
        assert_eq!(comp.correct(10.0, 10.0, 1.5), 0.0);
        assert_eq!(comp.correct(10.0, 10.0, 20.0), 0.0);
    }

    #[test]
    fn test_inactive_compensator_is_zero() {
        let comp = ZCompensator::from_config(&LevelingConfig::default(), None).unwrap();
        assert!(!comp.is_active());
        assert_eq!(comp.correct(1.0, 2.0, 0.0), 0.0);
        assert_eq!(comp.max_segment_length(), None);
    }

    #[test]
    fn test_grid_from_config_rectangle() {
        let config = LevelingConfig {
            distortion_correction: true,
            grid_points: 5,
            ..LevelingConfig::default()
        };
        let comp = ZCompensator::from_config(&config, None).unwrap();
        let grid = comp.grid().expect("grid should be built");
        assert_eq!(grid.points(), 5);
        assert_eq!(grid.node(0, 0), (10.0, 10.0));
        assert_eq!(grid.node(4, 4), (190.0, 190.0));
        assert_eq!(comp.max_segment_length(), Some(22.5));
    }

    #[test]
    fn test_grid_from_config_centered_on_round_bed() {
        let config = LevelingConfig {
            distortion_correction: true,
            grid_points: 3,
            ..LevelingConfig::default()
        };
        let grid = DistortionMap::from_config(&config, Some(80.0)).unwrap().unwrap();
        assert_eq!(grid.node(0, 0), (-80.0, -80.0));
        assert_eq!(grid.node(1, 1), (0.0, 0.0));

        // An explicit radius wins over the bed radius.
        let config = LevelingConfig {
            grid_radius: Some(50.0),
            ..config
        };
        let grid = DistortionMap::from_config(&config, Some(80.0)).unwrap().unwrap();
        assert_eq!(grid.node(2, 2), (50.0, 50.0));
    }

    #[test]
    fn test_grid_values_clamped_to_limit() {
        let config = LevelingConfig {
            distortion_correction: true,
            ..LevelingConfig::default()
        };
        let mut grid = DistortionMap::from_config(&config, None).unwrap().unwrap();
        grid.set(1, 1, 5.0);
        grid.set(2, 2, -3.0);
        grid.set(3, 3, 0.4);
        assert_eq!(grid.get(1, 1), 2.0);
        assert_eq!(grid.get(2, 2), -2.0);
        assert_eq!(grid.get(3, 3), 0.4);
    }
}
