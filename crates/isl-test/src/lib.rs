//! ISL Test Harness - Co-simulation scenarios and validation
//!
//! This crate provides:
//! - Participant builders over a shared hub
//! - Threaded producer/consumer scenarios with optional jitter
//! - End-to-end checks for timeouts, stop requests and the store

pub mod integration;
pub mod scenario;

pub use integration::*;
pub use scenario::*;
