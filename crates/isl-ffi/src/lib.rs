#![allow(clippy::missing_safety_doc)]
//! ISL FFI - Foreign Function Interface
//!
//! Flat C function table over the co-simulation engine:
//! - Hub handles (settings, stop requests, simulations table)
//! - Connector handles (lifecycle, configuration, IO registry)
//! - IO operations addressed by connector handle and IO identifier
//! - Simulation snapshots
//!
//! Every function returns a status code or a sentinel; no panic or error
//! crosses the boundary. The last error message is kept per thread.

pub mod connect;
pub mod error;
pub mod hub;
pub mod io;
pub mod sims;

use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

pub use connect::*;
pub use error::*;
pub use hub::*;
pub use io::*;
pub use sims::*;

/// Library version
#[no_mangle]
pub extern "C" fn isl_version() -> *const c_char {
    static VERSION: &[u8] = b"0.2.0\0";
    VERSION.as_ptr() as *const c_char
}

/// Install the log subscriber
/// `level` is the default filter (for example "info"), NULL selects "info".
/// `ISL_LOG` overrides it. Later calls are ignored.
#[no_mangle]
pub unsafe extern "C" fn isl_init_logging(level: *const c_char) -> c_int {
    let level = if level.is_null() {
        "info"
    } else {
        match str_arg(level) {
            Some(level) => level,
            None => return invalid_argument("Invalid log level"),
        }
    };
    isl_core::log::init_logging(level);
    0
}

/// Free a string allocated by ISL
#[no_mangle]
pub unsafe extern "C" fn isl_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Borrow a C string argument; None when NULL or not UTF-8
pub(crate) unsafe fn str_arg<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}

/// Hand a string to the caller, who frees it with `isl_free_string`
pub(crate) fn owned_string(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(s) => s.into_raw(),
        Err(_) => {
            set_last_error("String contains a NUL byte");
            ptr::null_mut()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let v = unsafe { CStr::from_ptr(isl_version()) };
        assert_eq!(v.to_str().unwrap(), "0.2.0");
    }

    #[test]
    fn test_owned_string_round_trip() {
        let s = owned_string("car");
        assert_eq!(unsafe { str_arg(s) }, Some("car"));
        unsafe { isl_free_string(s) };
        unsafe { isl_free_string(ptr::null_mut()) };
    }

    #[test]
    fn test_null_arg() {
        assert!(unsafe { str_arg(ptr::null()) }.is_none());
    }
}
