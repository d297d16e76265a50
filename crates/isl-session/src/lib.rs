//! ISL Session - participants and the context they share
//!
//! This crate provides:
//! - `Hub`: the engine context holding settings, published channels,
//!   model entries, the simulations table and stop signals
//! - `Connector`: lifecycle state machine and IO registry of one participant
//! - `ConnectorFile`: the JSON configuration file
//! - `StopListener`: background thread turning stop requests into termination
//! - `SimEntry`: snapshot of an active participant

pub mod config;
pub mod connector;
pub mod hub;
pub mod listener;
pub mod sims;

pub use config::*;
pub use connector::*;
pub use hub::*;
pub use listener::*;
pub use sims::SimEntry;
