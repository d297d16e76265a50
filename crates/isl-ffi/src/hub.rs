//! FFI hub functions

use std::ffi::{c_char, c_int};
use std::ptr;
use std::sync::Arc;

use isl_core::Settings;
use isl_session::Hub;

use crate::error::*;
use crate::str_arg;

/// Opaque handle to an engine context
pub struct IslHubHandle {
    pub(crate) hub: Arc<Hub>,
}

/// Create a hub from `ISL_SETTINGS` or `isl_api.json`, falling back to defaults
/// Returns a handle that must be freed with isl_hub_free
#[no_mangle]
pub extern "C" fn isl_hub_new() -> *mut IslHubHandle {
    Box::into_raw(Box::new(IslHubHandle { hub: Hub::from_env() }))
}

/// Create a hub from a settings file
/// Returns NULL on error
#[no_mangle]
pub unsafe extern "C" fn isl_hub_load(path: *const c_char) -> *mut IslHubHandle {
    let Some(path) = str_arg(path) else {
        set_last_error("Invalid settings path");
        return ptr::null_mut();
    };
    match Settings::load(path) {
        Ok(settings) => Box::into_raw(Box::new(IslHubHandle {
            hub: Hub::with_config(settings),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a hub handle
/// Connectors created from it keep the engine context alive.
#[no_mangle]
pub unsafe extern "C" fn isl_hub_free(handle: *mut IslHubHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Release one listener waiting for a global stop request
/// Returns 1 when a listener was released, 0 otherwise
#[no_mangle]
pub unsafe extern "C" fn isl_send_stop_request(handle: *const IslHubHandle) -> c_int {
    if handle.is_null() {
        return null_handle();
    }
    (*handle).hub.send_stop_request() as c_int
}

/// Release one listener of `session`
/// Returns 1 when a listener was released, 0 otherwise
#[no_mangle]
pub unsafe extern "C" fn isl_send_stop_session(
    handle: *const IslHubHandle,
    session: *const c_char,
) -> c_int {
    if handle.is_null() {
        return null_handle();
    }
    let Some(session) = str_arg(session) else {
        return invalid_argument("Invalid session id");
    };
    (*handle).hub.send_stop_session(session) as c_int
}
