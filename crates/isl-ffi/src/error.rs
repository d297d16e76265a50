//! FFI error handling

use std::ffi::{c_char, c_int, CString};

use isl_core::log::msg;
use isl_core::{IslError, IslResult, StatusCode};

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> =
        const { std::cell::RefCell::new(None) };
}

/// Set the last error message
pub fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Get the last error message
/// Returns NULL if no error
#[no_mangle]
pub extern "C" fn isl_get_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(s) => s.as_ptr(),
        None => std::ptr::null(),
    })
}

/// Clear the last error
#[no_mangle]
pub extern "C" fn isl_clear_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Status returned for a null handle
pub const NULL_HANDLE: c_int = StatusCode::NullHandle as c_int;

/// Status returned for a null or non UTF-8 argument
pub const INVALID_ARGUMENT: c_int = StatusCode::InvalidArgument as c_int;

/// Record a null handle and return its status
pub fn null_handle() -> c_int {
    tracing::debug!(msg_id = msg::FFI_NULL_HANDLE, "null handle");
    set_last_error("Null handle");
    NULL_HANDLE
}

/// Record an invalid argument and return its status
pub fn invalid_argument(what: &str) -> c_int {
    tracing::debug!(msg_id = msg::FFI_INVALID_ARGUMENT, "{}", what);
    set_last_error(what);
    INVALID_ARGUMENT
}

/// Convert an engine result to a status code, recording the error message
pub fn result_to_int<T>(result: IslResult<T>) -> c_int {
    match result {
        Ok(_) => StatusCode::Ok as c_int,
        Err(e) => error_to_int(&e),
    }
}

pub fn error_to_int(e: &IslError) -> c_int {
    tracing::debug!(msg_id = msg::FFI_CALL_FAILED, status = e.status() as i32, "{}", e);
    set_last_error(&e.to_string());
    e.status() as c_int
}
