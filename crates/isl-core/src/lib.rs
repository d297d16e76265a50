//! ISL Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every ISL component:
//! - Error taxonomy and flat status codes
//! - Signal kinds, causality and typed values
//! - Identifiers (connector uuid/uid, type tags, session ids)
//! - Simulated-time constants and tolerance helpers
//! - Settings and logging setup

pub mod error;
pub mod id;
pub mod log;
pub mod settings;
pub mod time;
pub mod types;

pub use error::*;
pub use id::*;
pub use settings::*;
pub use time::*;
pub use types::*;
