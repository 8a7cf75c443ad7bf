//! Frost guard.
//!
//! Runs **every tick before the arbiter** and keeps a small fault bitmask.
//! The arbiter only looks at [`FrostGuard::below_minimum`]: a room colder
//! than the configured minimum forces `FailsafeOn` from `Off` whatever
//! downtime, vacation or schedules say.  A disconnected probe is tracked as
//! its own fault so that a missing reading never counts as "cold".

use core::fmt;

use log::{error, info};

/// Faults tracked by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Room temperature below the failsafe minimum.
    BelowMinimum = 0b0000_0001,
    /// The probe reports the disconnected sentinel.
    ProbeDisconnected = 0b0000_0010,
}

impl SafetyFault {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BelowMinimum => write!(f, "below minimum temperature"),
            Self::ProbeDisconnected => write!(f, "temperature probe disconnected"),
        }
    }
}

pub struct FrostGuard {
    minimum: f32,
    faults: u8,
}

impl FrostGuard {
    pub fn new(minimum: f32) -> Self {
        Self { minimum, faults: 0 }
    }

    pub fn set_minimum(&mut self, minimum: f32) {
        self.minimum = minimum;
    }

    /// Evaluate the latest corrected reading.  Returns the fault bitmask.
    pub fn evaluate(&mut self, temperature: Option<f32>) -> u8 {
        self.eval_fault(SafetyFault::ProbeDisconnected, temperature.is_none());
        self.eval_fault(
            SafetyFault::BelowMinimum,
            temperature.is_some_and(|t| t < self.minimum),
        );
        self.faults
    }

    pub fn faults(&self) -> u8 {
        self.faults
    }

    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    pub fn below_minimum(&self) -> bool {
        self.has_fault(SafetyFault::BelowMinimum)
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
