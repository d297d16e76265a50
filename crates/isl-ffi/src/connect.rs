//! FFI connector functions

use std::ffi::{c_char, c_double, c_int, c_uint};
use std::path::Path;
use std::ptr;
use std::sync::Arc;

use isl_core::log::msg;
use isl_core::{Causality, IslResult, SignalType};
use isl_data::Termination;
use isl_session::{Connector, Mode};

use crate::error::*;
use crate::hub::IslHubHandle;
use crate::{owned_string, str_arg};

/// Returned by isl_connect_connect when a peer output is not published yet
pub const ISL_CONNECT_PENDING: c_int = 1;

/// Opaque handle to a connector
///
/// `termination` is the connector's own flag. Another thread may raise it
/// while a blocking call holds the connector.
pub struct IslConnectHandle {
    pub(crate) connector: Connector,
    pub(crate) termination: Arc<Termination>,
}

/// Borrow the connector field only; `termination` stays free for other threads
pub(crate) unsafe fn connector_mut<'a>(handle: *mut IslConnectHandle) -> Option<&'a mut Connector> {
    if handle.is_null() {
        None
    } else {
        Some(&mut *ptr::addr_of_mut!((*handle).connector))
    }
}

/// Run `f` on the connector behind `handle`
pub(crate) unsafe fn with_connector(
    handle: *mut IslConnectHandle,
    f: impl FnOnce(&mut Connector) -> IslResult<()>,
) -> c_int {
    match connector_mut(handle) {
        Some(c) => result_to_int(f(c)),
        None => null_handle(),
    }
}

/// Run `f` on the connector with a required string argument
unsafe fn with_connector_str(
    handle: *mut IslConnectHandle,
    arg: *const c_char,
    what: &str,
    f: impl FnOnce(&mut Connector, &str) -> IslResult<()>,
) -> c_int {
    let Some(c) = connector_mut(handle) else {
        return null_handle();
    };
    match str_arg(arg) {
        Some(arg) => result_to_int(f(c, arg)),
        None => invalid_argument(what),
    }
}

/// Create a connector bound to `hub`
/// `is_owner` non-zero makes it the owner of the model it describes.
/// Returns a handle that must be freed with isl_connect_free
#[no_mangle]
pub unsafe extern "C" fn isl_connect_init(
    hub: *const IslHubHandle,
    is_owner: c_int,
) -> *mut IslConnectHandle {
    let Some(hub) = hub.as_ref() else {
        set_last_error("Null hub");
        return ptr::null_mut();
    };
    let connector = Connector::new(&hub.hub, is_owner != 0);
    let termination = connector.termination();
    Box::into_raw(Box::new(IslConnectHandle { connector, termination }))
}

/// Free a connector handle, leaving its session first
#[no_mangle]
pub unsafe extern "C" fn isl_connect_free(handle: *mut IslConnectHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Start a fresh model named `name`
#[no_mangle]
pub unsafe extern "C" fn isl_connect_new(handle: *mut IslConnectHandle, name: *const c_char) -> c_int {
    with_connector_str(handle, name, "Invalid model name", |c, name| c.new_model(name))
}

/// Load a configuration file
#[no_mangle]
pub unsafe extern "C" fn isl_connect_load(handle: *mut IslConnectHandle, path: *const c_char) -> c_int {
    with_connector_str(handle, path, "Invalid path", |c, path| c.load(path))
}

/// Save the configuration; NULL `path` reuses the loaded file or `<name>.json`
#[no_mangle]
pub unsafe extern "C" fn isl_connect_save(handle: *mut IslConnectHandle, path: *const c_char) -> c_int {
    if path.is_null() {
        return with_connector(handle, |c| c.save(None));
    }
    with_connector_str(handle, path, "Invalid path", |c, path| c.save(Some(Path::new(path))))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_check(handle: *mut IslConnectHandle) -> c_int {
    with_connector(handle, |c| c.check())
}

/// Open the session; NULL `session` keeps the configured id
#[no_mangle]
pub unsafe extern "C" fn isl_connect_create(handle: *mut IslConnectHandle, session: *const c_char) -> c_int {
    if session.is_null() {
        return with_connector(handle, |c| c.create(None));
    }
    with_connector_str(handle, session, "Invalid session id", |c, s| c.create(Some(s)))
}

/// Attach the inputs to their peers
/// Returns 0 when connected, ISL_CONNECT_PENDING when `wait` is zero and a
/// peer is missing, negative on error
#[no_mangle]
pub unsafe extern "C" fn isl_connect_connect(handle: *mut IslConnectHandle, wait: c_int) -> c_int {
    let Some(c) = connector_mut(handle) else {
        return null_handle();
    };
    match c.connect(wait != 0) {
        Ok(true) => 0,
        Ok(false) => ISL_CONNECT_PENDING,
        Err(e) => error_to_int(&e),
    }
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_disconnect(handle: *mut IslConnectHandle) -> c_int {
    with_connector(handle, |c| c.disconnect())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_name(handle: *mut IslConnectHandle, name: *const c_char) -> c_int {
    with_connector_str(handle, name, "Invalid name", |c, v| c.set_name(v))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_id(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_connector_str(handle, id, "Invalid id", |c, v| c.set_id(v))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_type(handle: *mut IslConnectHandle, type_tag: *const c_char) -> c_int {
    with_connector_str(handle, type_tag, "Invalid type", |c, v| c.set_type(v))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_session_id(
    handle: *mut IslConnectHandle,
    session: *const c_char,
) -> c_int {
    with_connector_str(handle, session, "Invalid session id", |c, v| c.set_session_id(v))
}

/// Seconds; 0 waits forever
#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_connect_timeout(handle: *mut IslConnectHandle, secs: c_int) -> c_int {
    with_connector(handle, |c| c.set_connect_timeout(secs))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_start_time(handle: *mut IslConnectHandle, time: c_double) -> c_int {
    with_connector(handle, |c| c.set_start_time(time))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_end_time(handle: *mut IslConnectHandle, time: c_double) -> c_int {
    with_connector(handle, |c| c.set_end_time(time))
}

/// -1 selects event mode
#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_step_size(handle: *mut IslConnectHandle, step: c_double) -> c_int {
    with_connector(handle, |c| c.set_step_size(step))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_step_tolerance(
    handle: *mut IslConnectHandle,
    tolerance: c_double,
) -> c_int {
    with_connector(handle, |c| c.set_step_tolerance(tolerance))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_viewer(handle: *mut IslConnectHandle, viewer: c_int) -> c_int {
    with_connector(handle, |c| c.set_viewer(viewer != 0))
}

/// 0 raises the terminated flag on a stop request, 1 exits the process
#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_mode(handle: *mut IslConnectHandle, mode: c_int) -> c_int {
    let Some(c) = connector_mut(handle) else {
        return null_handle();
    };
    match Mode::from_code(mode) {
        Some(mode) => {
            c.set_mode(mode);
            0
        }
        None => invalid_argument("Unknown mode"),
    }
}

/// Returns -1 for a null handle
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_mode(handle: *const IslConnectHandle) -> c_int {
    match handle.as_ref() {
        Some(h) => h.connector.mode().code(),
        None => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_set_terminated(handle: *mut IslConnectHandle, terminated: c_int) -> c_int {
    if handle.is_null() {
        return null_handle();
    }
    // Safe to call while another thread blocks inside the same connector
    let termination = &*ptr::addr_of!((*handle).termination);
    if terminated != 0 {
        tracing::info!(msg_id = msg::CONNECTOR_TERMINATED, "terminated through the C interface");
    }
    termination.set(terminated != 0);
    0
}

/// Returns 1 for a null handle
#[no_mangle]
pub unsafe extern "C" fn isl_connect_is_terminated(handle: *const IslConnectHandle) -> c_int {
    if handle.is_null() {
        return 1;
    }
    (*ptr::addr_of!((*handle).termination)).is_set() as c_int
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_start_stop_listener(handle: *mut IslConnectHandle) -> c_int {
    with_connector(handle, |c| c.start_stop_listener())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_listen_to_exit_session(handle: *mut IslConnectHandle) -> c_int {
    with_connector(handle, |c| c.listen_to_exit_session())
}

/// Returns 1 when a listener of this connector's session was released
#[no_mangle]
pub unsafe extern "C" fn isl_connect_send_stop_session(handle: *const IslConnectHandle) -> c_int {
    match handle.as_ref() {
        Some(h) => h.connector.send_stop_session() as c_int,
        None => null_handle(),
    }
}

/// Caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_name(handle: *const IslConnectHandle) -> *mut c_char {
    match handle.as_ref() {
        Some(h) => owned_string(h.connector.name()),
        None => ptr::null_mut(),
    }
}

/// Caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_id(handle: *const IslConnectHandle) -> *mut c_char {
    match handle.as_ref() {
        Some(h) => owned_string(h.connector.id()),
        None => ptr::null_mut(),
    }
}

/// Caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_type(handle: *const IslConnectHandle) -> *mut c_char {
    match handle.as_ref() {
        Some(h) => owned_string(&h.connector.type_tag().as_string()),
        None => ptr::null_mut(),
    }
}

/// NULL when no session id is set; caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_session_id(handle: *const IslConnectHandle) -> *mut c_char {
    match handle.as_ref().and_then(|h| h.connector.session_id()) {
        Some(session) => owned_string(session.as_str()),
        None => ptr::null_mut(),
    }
}

/// NULL when no file was loaded or saved; caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_file(handle: *const IslConnectHandle) -> *mut c_char {
    match handle.as_ref().and_then(|h| h.connector.file()) {
        Some(file) => owned_string(&file.display().to_string()),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_uid(handle: *const IslConnectHandle) -> c_uint {
    handle.as_ref().map_or(0, |h| h.connector.uid().0)
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_pid(handle: *const IslConnectHandle) -> c_uint {
    handle.as_ref().map_or(0, |h| h.connector.pid())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_start_time(handle: *const IslConnectHandle) -> c_double {
    handle.as_ref().map_or(0.0, |h| h.connector.start_time())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_end_time(handle: *const IslConnectHandle) -> c_double {
    handle.as_ref().map_or(0.0, |h| h.connector.end_time())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_step_size(handle: *const IslConnectHandle) -> c_double {
    handle.as_ref().map_or(0.0, |h| h.connector.step_size())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_step_tolerance(handle: *const IslConnectHandle) -> c_double {
    handle.as_ref().map_or(0.0, |h| h.connector.step_tolerance())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_connect_timeout(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.connect_timeout())
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_is_owner(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.is_owner() as c_int)
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_is_viewer(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.is_viewer() as c_int)
}

/// Declare an IO
/// `causality`: 0 input, 1 output. `signal_type`: 0 real, 1 integer,
/// 2 boolean, 3 string, 4 structure (rejected).
#[no_mangle]
pub unsafe extern "C" fn isl_connect_new_io(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    causality: c_int,
    signal_type: c_int,
    size: c_int,
) -> c_int {
    let Some(causality) = Causality::from_code(causality) else {
        return invalid_argument("Unknown causality");
    };
    let Some(signal_type) = SignalType::from_code(signal_type) else {
        return invalid_argument("Unknown signal type");
    };
    if size < 0 {
        return invalid_argument("Negative size");
    }
    with_connector_str(handle, id, "Invalid io id", |c, id| {
        c.new_io(id, causality, signal_type, size as usize).map(|_| ())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_remove_io(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_connector_str(handle, id, "Invalid io id", |c, id| c.remove_io(id))
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_nb_ios(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.nb_ios() as c_int)
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_nb_inputs(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.nb_inputs() as c_int)
}

#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_nb_outputs(handle: *const IslConnectHandle) -> c_int {
    handle.as_ref().map_or(0, |h| h.connector.nb_outputs() as c_int)
}

/// Identifier of the IO at `index` in declaration order
/// NULL when out of range; caller frees the result with isl_free_string
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_io_id(handle: *const IslConnectHandle, index: c_int) -> *mut c_char {
    let io = handle
        .as_ref()
        .filter(|_| index >= 0)
        .and_then(|h| h.connector.io_at(index as usize));
    match io {
        Some(io) => owned_string(io.id()),
        None => ptr::null_mut(),
    }
}

/// Identifier of the `index`-th input; same ownership as isl_connect_get_io_id
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_input_id(handle: *const IslConnectHandle, index: c_int) -> *mut c_char {
    let io = handle
        .as_ref()
        .filter(|_| index >= 0)
        .and_then(|h| h.connector.input(index as usize));
    match io {
        Some(io) => owned_string(io.id()),
        None => ptr::null_mut(),
    }
}

/// Identifier of the `index`-th output; same ownership as isl_connect_get_io_id
#[no_mangle]
pub unsafe extern "C" fn isl_connect_get_output_id(handle: *const IslConnectHandle, index: c_int) -> *mut c_char {
    let io = handle
        .as_ref()
        .filter(|_| index >= 0)
        .and_then(|h| h.connector.output(index as usize));
    match io {
        Some(io) => owned_string(io.id()),
        None => ptr::null_mut(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::{isl_hub_free, isl_hub_new};
    use crate::isl_free_string;
    use isl_core::StatusCode;
    use std::ffi::{CStr, CString};

    fn cs(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn take(s: *mut c_char) -> String {
        assert!(!s.is_null());
        let out = CStr::from_ptr(s).to_str().unwrap().to_string();
        isl_free_string(s);
        out
    }

    #[test]
    fn test_null_handle_sentinels() {
        unsafe {
            let null = ptr::null_mut::<IslConnectHandle>();
            assert_eq!(isl_connect_check(null), NULL_HANDLE);
            assert_eq!(isl_connect_connect(null, 0), NULL_HANDLE);
            assert_eq!(isl_connect_get_nb_ios(null), 0);
            assert_eq!(isl_connect_get_mode(null), -1);
            assert_eq!(isl_connect_is_terminated(null), 1);
            assert!(isl_connect_get_name(null).is_null());
            assert!(isl_connect_init(ptr::null(), 1).is_null());
            isl_connect_free(null);
        }
    }

    #[test]
    fn test_model_declaration() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 1);
            assert_eq!(isl_connect_new(c, cs("car").as_ptr()), 0);
            assert_eq!(isl_connect_set_end_time(c, 10.0), 0);
            assert_eq!(isl_connect_set_step_size(c, 0.1), 0);
            assert_eq!(isl_connect_new_io(c, cs("speed").as_ptr(), 1, 0, 1), 0);
            assert_eq!(isl_connect_new_io(c, cs("brake").as_ptr(), 0, 2, 1), 0);
            assert_eq!(
                isl_connect_new_io(c, cs("speed").as_ptr(), 1, 0, 1),
                StatusCode::DuplicateIo as c_int
            );
            assert_eq!(
                isl_connect_new_io(c, cs("s").as_ptr(), 1, 4, 1),
                StatusCode::UnsupportedType as c_int
            );
            assert_eq!(isl_connect_new_io(c, cs("x").as_ptr(), 7, 0, 1), INVALID_ARGUMENT);

            assert_eq!(isl_connect_get_nb_ios(c), 2);
            assert_eq!(isl_connect_get_nb_inputs(c), 1);
            assert_eq!(isl_connect_get_nb_outputs(c), 1);
            assert_eq!(take(isl_connect_get_io_id(c, 0)), "speed");
            assert_eq!(take(isl_connect_get_input_id(c, 0)), "brake");
            assert!(isl_connect_get_output_id(c, 1).is_null());
            assert!(isl_connect_get_io_id(c, -1).is_null());

            assert_eq!(isl_connect_check(c), 0);
            assert_eq!(take(isl_connect_get_name(c)), "car");
            assert_eq!(take(isl_connect_get_type(c)), "ISL");
            assert!(isl_connect_get_uid(c) != 0);

            assert_eq!(
                isl_connect_remove_io(c, cs("missing").as_ptr()),
                StatusCode::NotFound as c_int
            );
            assert_eq!(isl_connect_remove_io(c, cs("brake").as_ptr()), 0);
            assert_eq!(isl_connect_get_nb_inputs(c), 0);

            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_session_lifecycle() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 1);
            isl_connect_new(c, cs("solo").as_ptr());
            isl_connect_set_end_time(c, 1.0);
            isl_connect_set_step_size(c, 0.1);
            isl_connect_new_io(c, cs("out").as_ptr(), 1, 0, 1);

            assert_eq!(isl_connect_is_terminated(c), 1);
            assert_eq!(isl_connect_create(c, cs("ffi-life").as_ptr()), 0);
            assert_eq!(isl_connect_is_terminated(c), 0);
            assert_eq!(take(isl_connect_get_session_id(c)), "ffi-life");
            assert_eq!(
                isl_connect_set_name(c, cs("other").as_ptr()),
                StatusCode::InvalidState as c_int
            );
            assert_eq!(isl_connect_connect(c, 1), 0);
            assert_eq!(isl_connect_disconnect(c), 0);
            assert_eq!(isl_connect_is_terminated(c), 1);
            assert_eq!(isl_connect_disconnect(c), StatusCode::NotConnected as c_int);

            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_connect_pending_without_peer() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 1);
            isl_connect_new(c, cs("lonely").as_ptr());
            isl_connect_set_end_time(c, 1.0);
            isl_connect_set_step_size(c, 0.1);
            isl_connect_new_io(c, cs("in").as_ptr(), 0, 0, 1);
            assert_eq!(isl_connect_create(c, cs("ffi-pending").as_ptr()), 0);
            assert_eq!(isl_connect_connect(c, 0), ISL_CONNECT_PENDING);
            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_mode() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 0);
            assert_eq!(isl_connect_get_mode(c), 0);
            assert_eq!(isl_connect_set_mode(c, 1), 0);
            assert_eq!(isl_connect_get_mode(c), 1);
            assert_eq!(isl_connect_set_mode(c, 5), INVALID_ARGUMENT);
            assert_eq!(isl_connect_is_owner(c), 0);
            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }
}
