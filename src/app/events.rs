//! Outbound application events.
//!
//! The [`Thermostat`](super::service::Thermostat) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to the console, queue a delta
//! for the cloud, or forward a value to a peer device.

use serde::Serialize;

use crate::fsm::StateId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The thermostat has booted (carries the initial state).
    Started(StateId),

    /// The arbiter transitioned between states.
    StateChanged { from: StateId, to: StateId, reason: &'static str },

    /// Heating state or sampled temperature changed; sent to peers and cloud.
    Delta(StateDelta),

    /// A firing rule asks a peer to apply `payload`.
    Forward { address: String, payload: String },
}

/// Compact state report: `{"value":1,"htemp":21.5,"htime":540,"temp":19.8}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateDelta {
    /// 1 while heating, 0 otherwise.
    pub value: u8,
    /// Active setpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htemp: Option<f32>,
    /// Seconds left of a timed session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htime: Option<u32>,
    /// Last sampled temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp: Option<f32>,
}

impl StateDelta {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Body sent to a peer for a forward action: `{"val":"21.5"}`.
#[derive(Debug, Serialize)]
pub struct ForwardBody<'a> {
    pub val: &'a str,
}

impl ForwardBody<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
