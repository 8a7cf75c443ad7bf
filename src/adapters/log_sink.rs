//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (the console via `env_logger` on the host).

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::StateChanged { from, to, reason } => {
                info!("STATE | {:?} -> {:?} ({})", from, to, reason);
            }
            AppEvent::Delta(delta) => {
                info!(
                    "DELTA | heating={} | htemp={} | htime={} | T={}",
                    delta.value,
                    delta.htemp.map_or_else(|| "-".into(), |t| format!("{t:.1}\u{00b0}C")),
                    delta.htime.map_or_else(|| "-".into(), |s| format!("{s}s")),
                    delta.temp.map_or_else(|| "--".into(), |t| format!("{t:.1}\u{00b0}C")),
                );
            }
            AppEvent::Forward { address, payload } => {
                info!("FWD   | {} <- {}", address, payload);
            }
        }
    }
}
