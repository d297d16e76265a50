//! ISL Data - buffering and synchronized exchange of signal values
//!
//! This crate provides:
//! - `Fifo`: multi-reader ring buffer with time-matched and positional reads
//! - `Channel`: the FIFO shared between an output and its readers, with
//!   blocking waits bounded by a timeout and released by termination
//! - `Store`: append-only time series per IO
//! - `Io`: a typed signal and its data exchange operations

pub mod channel;
pub mod fifo;
pub mod io;
pub mod store;

pub use channel::*;
pub use fifo::*;
pub use io::*;
pub use store::*;
