//! Simulated-time constants and helpers

use std::time::Duration;

/// Time stamp carried by event-triggered entries
pub const EVENT_TIME: f64 = -1.0;

/// Step size marking event-driven (non time-stepped) mode
pub const EVENT_STEP: f64 = -1.0;

/// Default relative step tolerance
pub const DEFAULT_STEP_TOLERANCE: f64 = 1e-6;

/// Whether a stored time stamp denotes an event entry
#[inline]
pub fn is_event_time(t: f64) -> bool {
    t.round() == EVENT_TIME
}

/// Absolute tolerance for an entry with the given step
#[inline]
pub fn step_tolerance(relative: f64, step: f64) -> f64 {
    relative * step.max(0.0)
}

/// Convert a timeout in whole seconds to a bound; `<= 0` means unbounded
#[inline]
pub fn timeout_from_secs(secs: i32) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs as u64))
    } else {
        None
    }
}
