//! Simulation peripherals for host runs and tests.
//!
//! [`SimPin`] is a shared GPIO level usable as both an `embedded-hal`
//! input and output pin; clones observe the same level, so a test can
//! hold one handle while a driver owns the other.  [`SimProbe`] is a
//! temperature probe whose reading is set from outside.

use core::convert::Infallible;
use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::app::ports::{PROBE_DISCONNECTED, SensorPort};

#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Rc<Cell<bool>>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self { level: Rc::new(Cell::new(high)) }
    }

    /// Drive the line from outside (a finger on the button).
    pub fn drive(&self, high: bool) {
        self.level.set(high);
    }

    pub fn level(&self) -> bool {
        self.level.get()
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        Ok(())
    }
}

/// Probe with an externally set reading; `None` reads as disconnected.
#[derive(Debug, Clone)]
pub struct SimProbe {
    reading: Rc<Cell<Option<f32>>>,
}

impl SimProbe {
    pub fn new(raw: Option<f32>) -> Self {
        Self { reading: Rc::new(Cell::new(raw)) }
    }

    pub fn set(&self, raw: Option<f32>) {
        self.reading.set(raw);
    }
}

impl SensorPort for SimProbe {
    fn read_raw_temperature(&mut self) -> f32 {
        self.reading.get().unwrap_or(PROBE_DISCONNECTED)
    }
}
