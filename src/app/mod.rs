//! Application core: orchestration and the port boundary.
//!
//! This module holds the device aggregate ([`service::Thermostat`]), the
//! inbound commands and outbound events it understands, and the records
//! it persists.  All interaction with hardware, the clock, storage and the
//! network happens through the **port traits** in [`ports`], keeping this
//! layer testable without real peripherals.

pub mod commands;
pub mod events;
pub mod persistence;
pub mod ports;
pub mod service;
