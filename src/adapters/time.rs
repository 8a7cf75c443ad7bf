//! Host time adapter.
//!
//! [`SystemClock`] implements [`TimePort`] on top of the host's UTC clock.
//! It behaves like the node's RTC: it is not running until someone sets
//! it (a `time` payload), and from then on it keeps **local** time as a
//! fixed offset from the system clock.  Sun times come from a configured
//! table since computing them is outside the core.
//!
//! It also provides the monotonic uptime the run loop uses for button
//! debouncing.

use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};

use crate::app::ports::TimePort;
use crate::clock::SunTimes;

pub struct SystemClock {
    start: Instant,
    /// Local time minus system UTC; `None` while the clock is not running.
    local_offset: Option<TimeDelta>,
    sun: Option<SunTimes>,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    /// A clock that is not running yet.
    pub fn new() -> Self {
        Self { start: Instant::now(), local_offset: None, sun: None }
    }

    /// A running clock at system UTC shifted by `utc_shift` seconds.
    pub fn running(utc_shift: i64) -> Self {
        Self { local_offset: Some(TimeDelta::seconds(utc_shift)), ..Self::new() }
    }

    pub fn with_sun_times(mut self, sun: SunTimes) -> Self {
        self.sun = Some(sun);
        self
    }

    /// Milliseconds since start (monotonic, wraps at `u32::MAX`).
    pub fn uptime_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Seconds since start (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.start.elapsed().as_secs()
    }
}

impl TimePort for SystemClock {
    fn now(&self) -> Option<NaiveDateTime> {
        self.local_offset.map(|offset| Utc::now().naive_utc() + offset)
    }

    fn set(&mut self, local: NaiveDateTime) {
        self.local_offset = Some(local - Utc::now().naive_utc());
    }

    fn sun_times(&self, _date: NaiveDate) -> Option<SunTimes> {
        self.sun
    }
}
