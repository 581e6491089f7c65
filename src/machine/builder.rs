//! Builder for [`MotionCore`].

use crate::config::{MachineConfig, ParameterOverrides};
use crate::error::{ConfigError, Error, Result};
use crate::motion::{BedPlane, DistortionMap, StepSink};

use super::context::MotionCore;
use super::endstop::EndstopMonitor;

/// Builder for creating [`MotionCore`] instances.
pub struct MotionCoreBuilder<S, M>
where
    S: StepSink,
    M: EndstopMonitor,
{
    config: Option<MachineConfig>,
    overrides: Option<ParameterOverrides>,
    sink: Option<S>,
    endstops: Option<M>,
    plane: Option<BedPlane>,
    grid: Option<DistortionMap>,
}

impl<S, M> Default for MotionCoreBuilder<S, M>
where
    S: StepSink,
    M: EndstopMonitor,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S, M> MotionCoreBuilder<S, M>
where
    S: StepSink,
    M: EndstopMonitor,
{
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            overrides: None,
            sink: None,
            endstops: None,
            plane: None,
            grid: None,
        }
    }

    /// Set the machine configuration.
    pub fn config(mut self, config: MachineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Apply a parameter override table on top of the configuration.
    pub fn overrides(mut self, overrides: ParameterOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Set the step output stage.
    pub fn sink(mut self, sink: S) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the endstop inputs.
    pub fn endstops(mut self, endstops: M) -> Self {
        self.endstops = Some(endstops);
        self
    }

    /// Install a measured bed plane, replacing the configured one.
    pub fn bed_plane(mut self, plane: BedPlane) -> Self {
        self.plane = Some(plane);
        self
    }

    /// Install a measured distortion grid.
    pub fn distortion_map(mut self, grid: DistortionMap) -> Self {
        self.grid = Some(grid);
        self
    }

    /// Build the core.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if the configuration, sink or
    /// endstops were not provided, or any error from validation.
    pub fn build(self) -> Result<MotionCore<S, M>> {
        let config = self
            .config
            .ok_or(Error::Config(ConfigError::MissingField("config")))?;
        let sink = self
            .sink
            .ok_or(Error::Config(ConfigError::MissingField("sink")))?;
        let endstops = self
            .endstops
            .ok_or(Error::Config(ConfigError::MissingField("endstops")))?;

        let config = match self.overrides {
            Some(overrides) => config.with_overrides(&overrides)?,
            None => config,
        };

        let mut core = MotionCore::new(config, sink, endstops)?;
        if let Some(plane) = self.plane {
            core.compensator_mut().set_plane(Some(plane));
        }
        if self.grid.is_some() {
            core.compensator_mut().set_grid(self.grid);
        }
        Ok(core)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::NoEndstops;
    use crate::motion::Direction;
    use crate::kinematics::{Axis, AxisSet};

    struct NullSink;

    impl StepSink for NullSink {
        fn set_direction(&mut self, _axis: Axis, _direction: Direction) {}
        fn step(&mut self, _axes: AxisSet) {}
    }

    #[test]
    fn test_missing_sink() {
        let result = MotionCoreBuilder::<NullSink, NoEndstops>::new()
            .config(MachineConfig::default())
            .endstops(NoEndstops)
            .build();
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingField("sink")))
        ));
    }

    #[test]
    fn test_build_with_plane() {
        let core = MotionCoreBuilder::new()
            .config(MachineConfig::default())
            .sink(NullSink)
            .endstops(NoEndstops)
            .bed_plane(BedPlane { a: 0.0, b: 0.0, c: 0.2 })
            .build()
            .unwrap();
        assert!(core.compensator().is_active());
    }

    #[test]
    fn test_build_with_grid() {
        let mut grid = DistortionMap::new(3, 0.0, 0.0, 100.0, 100.0).unwrap();
        grid.set(1, 1, 0.2);
        let core = MotionCoreBuilder::new()
            .config(MachineConfig::default())
            .sink(NullSink)
            .endstops(NoEndstops)
            .distortion_map(grid)
            .build()
            .unwrap();
        assert!(core.compensator().grid().is_some());
        assert!((core.compensator().correct(50.0, 50.0, 0.0) - 0.2).abs() < 1e-5);
    }
}
