//! STEP/DIR driver outputs.
//!
//! Generic over embedded-hal 1.0 pin and delay types.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{MachineConfig, StepperConfig};
use crate::kinematics::{Axis, AxisSet, NUM_AXES};
use crate::motion::{Direction, StepSink};

/// Pins of one stepper driver.
pub struct AxisDriver<P>
where
    P: OutputPin,
{
    /// STEP pin (pulse to move one step).
    step_pin: P,

    /// DIR pin (high = positive unless inverted).
    dir_pin: P,

    /// Active-low ENABLE pin, if wired.
    enable_pin: Option<P>,

    /// Whether direction pin logic is inverted.
    invert_direction: bool,

    /// Current direction (cached to avoid unnecessary pin writes).
    current_direction: Option<Direction>,
}

impl<P> AxisDriver<P>
where
    P: OutputPin,
{
    /// Create a driver from its STEP and DIR pins.
    pub fn new(step_pin: P, dir_pin: P) -> Self {
        Self {
            step_pin,
            dir_pin,
            enable_pin: None,
            invert_direction: false,
            current_direction: None,
        }
    }

    /// Attach an active-low ENABLE pin.
    pub fn with_enable(mut self, pin: P) -> Self {
        self.enable_pin = Some(pin);
        self
    }

    /// Set direction inversion.
    pub fn invert_direction(mut self, invert: bool) -> Self {
        self.invert_direction = invert;
        self
    }

    /// Drive the DIR pin. Returns `Ok(true)` if the level changed.
    fn set_direction(&mut self, direction: Direction) -> Result<bool, P::Error> {
        if self.current_direction == Some(direction) {
            return Ok(false);
        }

        let high = matches!(direction, Direction::Positive) != self.invert_direction;
        if high {
            self.dir_pin.set_high()?;
        } else {
            self.dir_pin.set_low()?;
        }
        self.current_direction = Some(direction);
        Ok(true)
    }

    fn set_enabled(&mut self, enabled: bool) -> Result<(), P::Error> {
        match self.enable_pin.as_mut() {
            Some(pin) if enabled => pin.set_low(),
            Some(pin) => pin.set_high(),
            None => Ok(()),
        }
    }
}

/// Step outputs of all four axes sharing one delay provider.
///
/// Pin errors cannot be propagated from the tick context; they latch a fault
/// flag the feeder polls with [`DriverBank::take_fault`].
pub struct DriverBank<P, DELAY>
where
    P: OutputPin,
    DELAY: DelayNs,
{
    drivers: [AxisDriver<P>; NUM_AXES],
    delay: DELAY,
    pulse_high_ns: u32,
    direction_setup_ns: u32,
    double_step_ns: u32,
    fault: bool,
}

impl<P, DELAY> DriverBank<P, DELAY>
where
    P: OutputPin,
    DELAY: DelayNs,
{
    /// Create a bank with the configured pulse timing.
    pub fn new(drivers: [AxisDriver<P>; NUM_AXES], delay: DELAY, config: &StepperConfig) -> Self {
        Self {
            drivers,
            delay,
            pulse_high_ns: config.pulse_high_delay_ns,
            direction_setup_ns: config.direction_delay_ns,
            double_step_ns: config.double_step_delay_ns,
            fault: false,
        }
    }

    /// Apply direction inversion from each axis' configuration.
    pub fn with_machine_config(mut self, config: &MachineConfig) -> Self {
        for axis in Axis::ALL {
            let driver = &mut self.drivers[axis.index()];
            driver.invert_direction = config.axis(axis).invert_direction;
            driver.current_direction = None;
        }
        self
    }

    /// Return and clear the pin fault flag.
    pub fn take_fault(&mut self) -> bool {
        core::mem::take(&mut self.fault)
    }

    /// Release the drivers and delay provider.
    pub fn release(self) -> ([AxisDriver<P>; NUM_AXES], DELAY) {
        (self.drivers, self.delay)
    }
}

impl<P, DELAY> StepSink for DriverBank<P, DELAY>
where
    P: OutputPin,
    DELAY: DelayNs,
{
    fn set_direction(&mut self, axis: Axis, direction: Direction) {
        match self.drivers[axis.index()].set_direction(direction) {
            Ok(true) if self.direction_setup_ns > 0 => self.delay.delay_ns(self.direction_setup_ns),
            Ok(_) => {}
            Err(_) => self.fault = true,
        }
    }

    fn step(&mut self, axes: AxisSet) {
        for axis in axes.axes() {
            if self.drivers[axis.index()].step_pin.set_high().is_err() {
                self.fault = true;
            }
        }
        if self.pulse_high_ns > 0 {
            self.delay.delay_ns(self.pulse_high_ns);
        }
        for axis in axes.axes() {
            if self.drivers[axis.index()].step_pin.set_low().is_err() {
                self.fault = true;
            }
        }
    }

    fn set_enabled(&mut self, axis: Axis, enabled: bool) {
        if self.drivers[axis.index()].set_enabled(enabled).is_err() {
            self.fault = true;
        }
    }

    fn pulse_gap(&mut self) {
        if self.double_step_ns > 0 {
            self.delay.delay_ns(self.double_step_ns);
        }
    }
}
