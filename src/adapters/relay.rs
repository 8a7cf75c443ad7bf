//! Heating relay adapter.
//!
//! Drives the relay coil through an `embedded-hal` [`OutputPin`] and
//! implements [`ActuatorPort`].  The pin is written on every command, so
//! a glitched output is corrected by the next transition.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::app::ports::ActuatorPort;

pub struct RelayActuator<P: OutputPin> {
    pin: P,
    on: bool,
    /// Relay energises on a low output.
    active_low: bool,
}

impl<P: OutputPin> RelayActuator<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, on: false, active_low: false }
    }

    pub fn active_low(pin: P) -> Self {
        Self { pin, on: false, active_low: true }
    }
}

impl<P: OutputPin> ActuatorPort for RelayActuator<P> {
    fn set_relay(&mut self, on: bool) {
        let high = on != self.active_low;
        let result = if high { self.pin.set_high() } else { self.pin.set_low() };
        if result.is_err() {
            error!("relay: pin write failed (wanted {})", if on { "on" } else { "off" });
            return;
        }
        if self.on != on {
            debug!("relay {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }

    fn relay_on(&self) -> bool {
        self.on
    }
}
