//! Outbound peer/cloud queue.
//!
//! ```text
//!   Thermostat ──emit──▶ OutboundQueue ──try_send──▶ [Channel; 8]
//!                                                        │
//!   run loop (after the control pass) ──drain──▶ PeerTransport
//! ```
//!
//! The control pass never waits on the network: events are pushed with
//! `try_send` into a bounded `embassy-sync` channel and a full queue drops
//! the message with a warning.  The run loop drains the queue into a
//! [`PeerTransport`] between passes; a failed send is logged and dropped.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Queue depth for outbound messages.
pub const OUTBOUND_DEPTH: usize = 8;

/// A message waiting for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// State delta JSON for the cloud and listening peers.
    Delta(String),
    /// Forward-action body for one peer.
    Peer { address: String, body: String },
}

/// Whatever actually moves bytes to peers and the cloud.
pub trait PeerTransport {
    type Error: core::fmt::Debug;

    fn publish(&mut self, message: &Outbound) -> Result<(), Self::Error>;
}

/// Transport that only logs, for host runs without a network.
pub struct LogTransport;

impl PeerTransport for LogTransport {
    type Error = ();

    fn publish(&mut self, message: &Outbound) -> Result<(), ()> {
        match message {
            Outbound::Delta(json) => info!("OUT   | cloud {json}"),
            Outbound::Peer { address, body } => info!("OUT   | {address} {body}"),
        }
        Ok(())
    }
}

pub struct OutboundQueue {
    channel: Channel<NoopRawMutex, Outbound, OUTBOUND_DEPTH>,
    dropped: u32,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self { channel: Channel::new(), dropped: 0 }
    }

    pub fn push(&mut self, message: Outbound) {
        if let Err(TrySendError::Full(message)) = self.channel.try_send(message) {
            self.dropped = self.dropped.wrapping_add(1);
            warn!("outbound queue full, dropping {message:?}");
        }
    }

    pub fn pending(&self) -> usize {
        self.channel.len()
    }

    /// Messages dropped because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn try_pop(&self) -> Option<Outbound> {
        self.channel.try_receive().ok()
    }

    /// Hand every queued message to `transport`.  Returns how many were
    /// delivered.
    pub fn drain(&self, transport: &mut impl PeerTransport) -> usize {
        let mut delivered = 0;
        while let Some(message) = self.try_pop() {
            match transport.publish(&message) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("outbound send failed ({e:?}), dropped {message:?}"),
            }
        }
        delivered
    }
}

impl EventSink for OutboundQueue {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Delta(delta) => self.push(Outbound::Delta(delta.to_json())),
            AppEvent::Forward { address, payload } => self.push(Outbound::Peer {
                address: address.clone(),
                body: payload.clone(),
            }),
            AppEvent::Started(_) | AppEvent::StateChanged { .. } => {}
        }
    }
}
