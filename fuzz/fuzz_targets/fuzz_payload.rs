//! Fuzz target: command payload decoding.
//!
//! Arbitrary bytes must either decode into a `Payload` or be rejected as a
//! whole; the lenient field decoders must never panic.
//!
//! cargo fuzz run fuzz_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermonode::app::commands::{Directive, LightReport, Payload};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else { return };
    let _ = Payload::parse(text);
    let _ = Directive::parse(text);
    let _ = LightReport::parse(text);
});
