//! Thermonode heating-control core.
//!
//! Exposes the pure-logic modules (rules, evaluator, arbiter FSM) and the
//! host adapters for integration testing and the simulation binary.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fsm;
pub mod rules;
pub mod safety;

pub mod adapters;
pub mod drivers;
