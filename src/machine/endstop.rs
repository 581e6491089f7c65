//! Endstop and probe inputs.

use embedded_hal::digital::InputPin;

use crate::config::{EndstopConfig, MachineConfig};
use crate::kinematics::{Axis, NUM_AXES};

/// Source of endstop and probe states, sampled from the tick context.
pub trait EndstopMonitor {
    /// Whether the endstop of `axis` is triggered.
    fn is_triggered(&mut self, axis: Axis) -> bool;

    /// Whether the Z probe is triggered.
    fn probe_triggered(&mut self) -> bool {
        false
    }

    /// Whether `axis` has an endstop at all.
    fn has_endstop(&self, axis: Axis) -> bool {
        let _ = axis;
        true
    }
}

/// Monitor for machines without switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEndstops;

impl EndstopMonitor for NoEndstops {
    fn is_triggered(&mut self, _axis: Axis) -> bool {
        false
    }

    fn has_endstop(&self, _axis: Axis) -> bool {
        false
    }
}

/// A debounced switch on an input pin.
///
/// A read error counts as triggered so motion toward the switch stops.
pub struct Endstop<PIN>
where
    PIN: InputPin,
{
    pin: PIN,
    inverting: bool,
    debounce: u8,
    pending: u8,
    triggered: bool,
}

impl<PIN> Endstop<PIN>
where
    PIN: InputPin,
{
    /// Create an endstop with the configured polarity and debounce.
    pub fn new(pin: PIN, config: &EndstopConfig) -> Self {
        Self {
            pin,
            inverting: config.inverting,
            debounce: config.debounce_samples.max(1),
            pending: 0,
            triggered: false,
        }
    }

    /// Sample the pin and return the debounced state.
    pub fn sample(&mut self) -> bool {
        let raw = match self.pin.is_high() {
            Ok(high) => high != self.inverting,
            Err(_) => true,
        };

        if raw == self.triggered {
            self.pending = 0;
        } else {
            self.pending += 1;
            if self.pending >= self.debounce {
                self.triggered = raw;
                self.pending = 0;
            }
        }
        self.triggered
    }

    /// Last debounced state.
    #[inline]
    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Release the pin.
    pub fn release(self) -> PIN {
        self.pin
    }
}

/// Endstops of all axes plus an optional probe input.
pub struct EndstopBank<PIN>
where
    PIN: InputPin,
{
    endstops: [Option<Endstop<PIN>>; NUM_AXES],
    probe: Option<Endstop<PIN>>,
}

impl<PIN> EndstopBank<PIN>
where
    PIN: InputPin,
{
    /// Create an empty bank.
    pub fn new() -> Self {
        Self {
            endstops: [None, None, None, None],
            probe: None,
        }
    }

    /// Attach the endstop pin of `axis` using its configuration.
    ///
    /// Axes configured without an endstop ignore the pin.
    pub fn with_endstop(mut self, axis: Axis, pin: PIN, config: &MachineConfig) -> Self {
        if let Some(endstop) = config.axis(axis).endstop.as_ref() {
            self.endstops[axis.index()] = Some(Endstop::new(pin, endstop));
        }
        self
    }

    /// Attach the probe input.
    pub fn with_probe(mut self, pin: PIN, config: &EndstopConfig) -> Self {
        self.probe = Some(Endstop::new(pin, config));
        self
    }

    /// Release every pin.
    pub fn release(self) -> ([Option<PIN>; NUM_AXES], Option<PIN>) {
        let [x, y, z, e] = self.endstops;
        (
            [
                x.map(Endstop::release),
                y.map(Endstop::release),
                z.map(Endstop::release),
                e.map(Endstop::release),
            ],
            self.probe.map(Endstop::release),
        )
    }
}

impl<PIN> Default for EndstopBank<PIN>
where
    PIN: InputPin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<PIN> EndstopMonitor for EndstopBank<PIN>
where
    PIN: InputPin,
{
    fn is_triggered(&mut self, axis: Axis) -> bool {
        self.endstops[axis.index()]
            .as_mut()
            .map(Endstop::sample)
            .unwrap_or(false)
    }

    fn probe_triggered(&mut self) -> bool {
        self.probe.as_mut().map(Endstop::sample).unwrap_or(false)
    }

    fn has_endstop(&self, axis: Axis) -> bool {
        self.endstops[axis.index()].is_some()
    }
}
