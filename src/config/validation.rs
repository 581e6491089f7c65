//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::kinematics::{Axis, Kinematics};
use crate::motion::{MAX_QUEUE_CAPACITY, MIN_QUEUE_CAPACITY};

use super::axis::AxisConfig;
use super::leveling::{LevelingMethod, MAX_GRID_POINTS};
use super::MachineConfig;

/// Validate a machine configuration.
///
/// Checks:
/// - Axis calibration, feedrates and accelerations are positive
/// - Travel ranges are valid (min < max)
/// - Jerk budgets, queue capacity and segment rates are in range
/// - The tick rate can carry the step doubling threshold
/// - The kinematics section matches the selected mode
pub fn validate_config(config: &MachineConfig) -> Result<()> {
    for axis in Axis::ALL {
        validate_axis(axis, config.axis(axis))?;
    }

    validate_planner(config)?;

    let stepper = &config.stepper;
    if stepper.step_doubler_frequency_hz == 0
        || stepper.tick_frequency_hz < stepper.step_doubler_frequency_hz
    {
        return Err(Error::Config(ConfigError::InvalidTickFrequency {
            tick_hz: stepper.tick_frequency_hz,
            doubler_hz: stepper.step_doubler_frequency_hz,
        }));
    }

    if config.homing.max_travel_factor < 1.0 {
        return Err(Error::Config(ConfigError::InvalidMaxTravelFactor(
            config.homing.max_travel_factor,
        )));
    }

    let leveling = &config.leveling;
    if leveling.degrade_start >= leveling.degrade_end {
        return Err(Error::Config(ConfigError::InvalidDegradeHeights {
            start: leveling.degrade_start,
            end: leveling.degrade_end,
        }));
    }
    if leveling.grid_points < 2 || leveling.grid_points > MAX_GRID_POINTS {
        return Err(Error::Config(ConfigError::InvalidGridPoints(leveling.grid_points)));
    }
    if leveling.distortion_correction {
        let rect_ok = leveling.grid_min[0] < leveling.grid_max[0]
            && leveling.grid_min[1] < leveling.grid_max[1];
        let radius_ok = leveling.grid_radius.map_or(true, |r| r > 0.0);
        if !(leveling.distortion_limit > 0.0) || !rect_ok || !radius_ok {
            return Err(Error::Config(ConfigError::InvalidDistortionGrid));
        }
    }
    if let Some(method) = leveling.method {
        let needed = match method {
            LevelingMethod::ThreePoint => 3,
            LevelingMethod::GridRegression | LevelingMethod::Bending => 4,
        };
        if leveling.points.len() < needed {
            return Err(Error::Config(ConfigError::InvalidLevelingPoints(
                leveling.points.len(),
            )));
        }
    }

    let slowdown = config.safety.jam_slowdown_percent;
    if slowdown == 0 || slowdown > 100 {
        return Err(Error::Config(ConfigError::InvalidJamSlowdown(slowdown)));
    }

    // Geometry construction checks the mode-specific sections.
    Kinematics::from_config(&config.kinematics)?;

    Ok(())
}

fn validate_axis(axis: Axis, config: &AxisConfig) -> Result<()> {
    if config.steps_per_mm <= 0.0 || config.steps_per_mm.is_nan() {
        return Err(Error::Config(ConfigError::InvalidStepsPerUnit {
            axis,
            value: config.steps_per_mm,
        }));
    }

    if config.max_feedrate.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidMaxFeedrate {
            axis,
            value: config.max_feedrate.0,
        }));
    }

    let travel = config.effective_travel_acceleration();
    for accel in [config.max_acceleration, travel] {
        if accel.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidMaxAcceleration {
                axis,
                value: accel.0,
            }));
        }
    }

    // The extruder has no travel range and never homes.
    if axis == Axis::E {
        return Ok(());
    }

    if !config.soft_limits().is_valid() {
        return Err(Error::Config(ConfigError::InvalidTravel {
            axis,
            min: config.min_position.0,
            max: config.max_position.0,
        }));
    }

    if config.endstop.is_some() {
        if config.homing_feedrate.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidHomingFeedrate {
                axis,
                value: config.homing_feedrate.0,
            }));
        }
        if config.retest_reduction_factor < 1.0 {
            return Err(Error::Config(ConfigError::InvalidRetestFactor {
                axis,
                value: config.retest_reduction_factor,
            }));
        }
    }

    Ok(())
}

fn validate_planner(config: &MachineConfig) -> Result<()> {
    let planner = &config.planner;

    for jerk in [planner.jerk, planner.z_jerk, planner.e_jerk] {
        if jerk.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidJerk(jerk.0)));
        }
    }

    if planner.queue_capacity < MIN_QUEUE_CAPACITY || planner.queue_capacity > MAX_QUEUE_CAPACITY
    {
        return Err(Error::Config(ConfigError::InvalidQueueCapacity(
            planner.queue_capacity,
        )));
    }

    for sps in [
        planner.segments_per_second_print,
        planner.segments_per_second_travel,
    ] {
        if sps <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidSegmentsPerSecond(sps)));
        }
    }
    if planner.max_segments_per_line == 0 {
        return Err(Error::Config(ConfigError::InvalidSegmentsPerSecond(0.0)));
    }

    if planner.feedrate_multiplier <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidFeedrateMultiplier(
            planner.feedrate_multiplier,
        )));
    }

    Ok(())
}
