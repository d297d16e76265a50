//! FFI IO functions
//!
//! An IO is addressed by its connector handle and identifier. The lookup
//! happens on every call, so no IO pointer outlives its connector.

use std::ffi::{c_char, c_double, c_int};
use std::slice;

use isl_core::{IslError, IslResult, SignalType, Value};
use isl_data::Io;

use crate::connect::{connector_mut, IslConnectHandle};
use crate::error::*;
use crate::str_arg;

/// Run `f` on the IO `id` of the connector behind `handle`
unsafe fn with_io<T>(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    f: impl FnOnce(&mut Io) -> IslResult<T>,
) -> Result<T, c_int> {
    let Some(connector) = connector_mut(handle) else {
        return Err(null_handle());
    };
    let Some(id) = str_arg(id) else {
        return Err(invalid_argument("Invalid io id"));
    };
    let io = connector
        .io_mut(id)
        .ok_or_else(|| IslError::NotFound(id.to_string()));
    io.and_then(f).map_err(|e| error_to_int(&e))
}

unsafe fn status_of(handle: *mut IslConnectHandle, id: *const c_char, f: impl FnOnce(&mut Io) -> IslResult<()>) -> c_int {
    match with_io(handle, id, f) {
        Ok(()) => 0,
        Err(code) => code,
    }
}

/// Write an optional out parameter
unsafe fn put<T>(out: *mut T, value: T) {
    if let Some(out) = out.as_mut() {
        *out = value;
    }
}

/// Returns the signal type code, -1 when unknown
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_type(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.signal_type().code())).unwrap_or(-1)
}

/// Returns 0 for an input, 1 for an output, -1 when unknown
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_causality(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.causality().code())).unwrap_or(-1)
}

/// Returns the element count, -1 when unknown
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_size(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.size() as c_int)).unwrap_or(-1)
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_is_connected(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.is_connected() as c_int)).unwrap_or(0)
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_name(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    name: *const c_char,
) -> c_int {
    let Some(name) = str_arg(name) else {
        return invalid_argument("Invalid name");
    };
    status_of(handle, id, |io| {
        io.set_name(name);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_connect_id(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    connect_id: *const c_char,
) -> c_int {
    let Some(connect_id) = str_arg(connect_id) else {
        return invalid_argument("Invalid connect id");
    };
    status_of(handle, id, |io| io.set_connect_id(connect_id))
}

/// -1 selects event mode, 0 inherits the connector step
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_step_size(handle: *mut IslConnectHandle, id: *const c_char, step: c_double) -> c_int {
    status_of(handle, id, |io| {
        io.set_step_size(step);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_use_store(handle: *mut IslConnectHandle, id: *const c_char, enabled: c_int) -> c_int {
    status_of(handle, id, |io| {
        io.use_store(enabled != 0);
        Ok(())
    })
}

/// Seconds; zero or negative waits forever
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_sync_timeout(handle: *mut IslConnectHandle, id: *const c_char, secs: c_int) -> c_int {
    status_of(handle, id, |io| {
        io.set_sync_timeout(secs);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_fifo_depth(handle: *mut IslConnectHandle, id: *const c_char, depth: c_int) -> c_int {
    if depth < 0 {
        return invalid_argument("Negative depth");
    }
    status_of(handle, id, |io| io.set_fifo_depth(depth as usize))
}

/// Initial value in its comma-separated text form
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_initial_value(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    text: *const c_char,
) -> c_int {
    let Some(text) = str_arg(text) else {
        return invalid_argument("Invalid initial value");
    };
    status_of(handle, id, |io| io.set_initial_str(text))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_real(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    values: *const c_double,
    len: usize,
) -> c_int {
    if values.is_null() {
        return invalid_argument("Null values");
    }
    let values = slice::from_raw_parts(values, len).to_vec();
    status_of(handle, id, |io| io.set_value(Value::Real(values)))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_integer(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    values: *const c_int,
    len: usize,
) -> c_int {
    if values.is_null() {
        return invalid_argument("Null values");
    }
    let values = slice::from_raw_parts(values, len).to_vec();
    status_of(handle, id, |io| io.set_value(Value::Integer(values)))
}

/// Booleans are passed as ints, non-zero meaning true
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_boolean(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    values: *const c_int,
    len: usize,
) -> c_int {
    if values.is_null() {
        return invalid_argument("Null values");
    }
    let values = slice::from_raw_parts(values, len).iter().map(|v| *v != 0).collect();
    status_of(handle, id, |io| io.set_value(Value::Boolean(values)))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_string(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    value: *const c_char,
) -> c_int {
    let Some(value) = str_arg(value) else {
        return invalid_argument("Invalid string value");
    };
    status_of(handle, id, |io| io.set_value(Value::text(value)))
}

fn mismatch(io: &Io, actual: SignalType) -> IslError {
    IslError::TypeMismatch {
        expected: io.signal_type(),
        actual,
    }
}

/// Copy the elements of `values` into a caller buffer of `len`
unsafe fn copy_out<T: Copy>(values: &[T], out: *mut T, len: usize) -> IslResult<()> {
    if len < values.len() {
        return Err(IslError::SizeMismatch {
            expected: values.len(),
            actual: len,
        });
    }
    slice::from_raw_parts_mut(out, values.len()).copy_from_slice(values);
    Ok(())
}

/// Copy the current value into `out`, which holds `len` elements
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_real(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    out: *mut c_double,
    len: usize,
) -> c_int {
    if out.is_null() {
        return invalid_argument("Null buffer");
    }
    status_of(handle, id, |io| match io.value() {
        Value::Real(values) => copy_out(values, out, len),
        other => Err(mismatch(io, other.signal_type())),
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_integer(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    out: *mut c_int,
    len: usize,
) -> c_int {
    if out.is_null() {
        return invalid_argument("Null buffer");
    }
    status_of(handle, id, |io| match io.value() {
        Value::Integer(values) => copy_out(values, out, len),
        other => Err(mismatch(io, other.signal_type())),
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_boolean(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    out: *mut c_int,
    len: usize,
) -> c_int {
    if out.is_null() {
        return invalid_argument("Null buffer");
    }
    status_of(handle, id, |io| match io.value() {
        Value::Boolean(values) => {
            let ints: Vec<c_int> = values.iter().map(|b| *b as c_int).collect();
            copy_out(&ints, out, len)
        }
        other => Err(mismatch(io, other.signal_type())),
    })
}

/// Copy the current string, NUL-terminated, into a buffer of `capacity` bytes
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_string(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    out: *mut c_char,
    capacity: usize,
) -> c_int {
    if out.is_null() {
        return invalid_argument("Null buffer");
    }
    status_of(handle, id, |io| match io.value() {
        Value::Text(text) => {
            let mut bytes = text.as_bytes().to_vec();
            bytes.push(0);
            copy_out(&bytes, out as *mut u8, capacity)
        }
        other => Err(mismatch(io, other.signal_type())),
    })
}

/// Publish the current value at `time`
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_data(handle: *mut IslConnectHandle, id: *const c_char, time: c_double, wait: c_int) -> c_int {
    status_of(handle, id, |io| io.set_data(time, wait != 0))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_data_and_step(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    time: c_double,
    step: c_double,
    wait: c_int,
) -> c_int {
    status_of(handle, id, |io| io.set_data_and_step(time, step, wait != 0))
}

/// Republish the last published value at a new time and step
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_last_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    time: c_double,
    step: c_double,
    wait: c_int,
) -> c_int {
    status_of(handle, id, |io| io.set_last_data(time, step, wait != 0))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_set_event_data(handle: *mut IslConnectHandle, id: *const c_char, wait: c_int) -> c_int {
    status_of(handle, id, |io| io.set_event_data(wait != 0))
}

/// Overwrite the slot `ind + 1` after the writer cursor
#[no_mangle]
pub unsafe extern "C" fn isl_io_set_data_at(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    time: c_double,
    ind: c_int,
) -> c_int {
    status_of(handle, id, |io| io.set_data_at(time, ind))
}

/// Read the value applicable at `time`; `out_time` (optional) receives the entry time
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    time: c_double,
    wait: c_int,
    out_time: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        put(out_time, io.get_data(time, wait != 0)?);
        Ok(())
    })
}

/// Read the next unread entry
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_last_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    wait: c_int,
    out_time: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        put(out_time, io.get_last_data(wait != 0)?);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_data_and_step(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    wait: c_int,
    out_time: *mut c_double,
    out_step: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        let (time, step) = io.get_data_and_step(wait != 0)?;
        put(out_time, time);
        put(out_step, step);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_event_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    wait: c_int,
    out_time: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        put(out_time, io.get_event_data(wait != 0)?);
        Ok(())
    })
}

/// Read relative to this IO's cursor without consuming
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_data_at(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    ind: c_int,
    out_time: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        put(out_time, io.get_data_at(ind)?);
        Ok(())
    })
}

/// Read the absolute FIFO slot `ind`
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_mem_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    ind: c_int,
    out_time: *mut c_double,
    out_step: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        let (time, step) = io.get_mem_data(ind)?;
        put(out_time, time);
        put(out_step, step);
        Ok(())
    })
}

/// Append the current value to the store
/// Returns 0 on success, -1 null handle, -2 store disabled, -3 already stored
#[no_mangle]
pub unsafe extern "C" fn isl_io_store_data(handle: *mut IslConnectHandle, id: *const c_char, time: c_double) -> c_int {
    status_of(handle, id, |io| io.store_data(time))
}

/// Returns the number of stored entries, -1 when unknown
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_store_len(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.store().len() as c_int)).unwrap_or(-1)
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_clear_store(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    status_of(handle, id, |io| {
        io.clear_store();
        Ok(())
    })
}

/// Restore the stored value at or before `time` into the IO value
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_stored_data(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    time: c_double,
    out_time: *mut c_double,
) -> c_int {
    status_of(handle, id, |io| {
        put(out_time, io.get_stored_data(time)?);
        Ok(())
    })
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_save_store(handle: *mut IslConnectHandle, id: *const c_char, path: *const c_char) -> c_int {
    let Some(path) = str_arg(path) else {
        return invalid_argument("Invalid store path");
    };
    status_of(handle, id, |io| io.save_store(path))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_load_store(handle: *mut IslConnectHandle, id: *const c_char, path: *const c_char) -> c_int {
    let Some(path) = str_arg(path) else {
        return invalid_argument("Invalid store path");
    };
    status_of(handle, id, |io| io.load_store(path))
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_fifo_depth(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.fifo_depth() as c_int)).unwrap_or(-1)
}

#[no_mangle]
pub unsafe extern "C" fn isl_io_get_fifo_readers(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.fifo_readers() as c_int)).unwrap_or(-1)
}

/// Returns -1 when the IO is not connected
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_fifo_writer_index(handle: *mut IslConnectHandle, id: *const c_char) -> c_int {
    with_io(handle, id, |io| Ok(io.fifo_writer_index().map_or(-1, |i| i as c_int))).unwrap_or(-1)
}

/// Returns -1 when the IO is not connected or `reader` is out of range
#[no_mangle]
pub unsafe extern "C" fn isl_io_get_fifo_reader_index(
    handle: *mut IslConnectHandle,
    id: *const c_char,
    reader: c_int,
) -> c_int {
    if reader < 0 {
        return -1;
    }
    with_io(handle, id, |io| {
        Ok(io.fifo_reader_index(reader as usize).map_or(-1, |i| i as c_int))
    })
    .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::*;
    use crate::hub::{isl_hub_free, isl_hub_new, IslHubHandle};
    use isl_core::StatusCode;
    use std::ffi::CString;
    use std::ptr;

    fn cs(s: &str) -> CString {
        CString::new(s).unwrap()
    }

    unsafe fn model(hub: *const IslHubHandle, name: &str, io: &str, causality: c_int) -> *mut IslConnectHandle {
        let c = isl_connect_init(hub, 1);
        assert_eq!(isl_connect_new(c, cs(name).as_ptr()), 0);
        assert_eq!(isl_connect_set_end_time(c, 10.0), 0);
        assert_eq!(isl_connect_set_step_size(c, 0.5), 0);
        assert_eq!(isl_connect_new_io(c, cs(io).as_ptr(), causality, 0, 1), 0);
        c
    }

    #[test]
    fn test_store_status_codes() {
        unsafe {
            let hub = isl_hub_new();
            let c = model(hub, "car", "speed", 1);
            let id = cs("speed");
            assert_eq!(isl_io_store_data(ptr::null_mut(), id.as_ptr(), 0.0), -1);
            assert_eq!(isl_io_store_data(c, id.as_ptr(), 0.0), -2);
            assert_eq!(isl_io_use_store(c, id.as_ptr(), 1), 0);
            assert_eq!(isl_io_store_data(c, id.as_ptr(), 0.0), 0);
            assert_eq!(isl_io_store_data(c, id.as_ptr(), 0.0), -3);
            assert_eq!(isl_io_get_store_len(c, id.as_ptr()), 1);

            let path = std::env::temp_dir().join(format!("isl_ffi_store_{}.json", std::process::id()));
            let path = cs(path.to_str().unwrap());
            assert_eq!(isl_io_save_store(c, id.as_ptr(), path.as_ptr()), 0);
            assert_eq!(isl_io_clear_store(c, id.as_ptr()), 0);
            assert_eq!(isl_io_get_store_len(c, id.as_ptr()), 0);
            let mut time = -1.0;
            assert_eq!(
                isl_io_get_stored_data(c, id.as_ptr(), 5.0, &mut time),
                StatusCode::NoData as c_int
            );
            assert_eq!(isl_io_load_store(c, id.as_ptr(), path.as_ptr()), 0);
            assert_eq!(isl_io_get_stored_data(c, id.as_ptr(), 5.0, &mut time), 0);
            assert_eq!(time, 0.0);
            assert_eq!(
                isl_io_save_store(c, id.as_ptr(), ptr::null()),
                StatusCode::InvalidArgument as c_int
            );
            let _ = std::fs::remove_file(path.to_str().unwrap());
            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_value_buffers() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 1);
            isl_connect_new(c, cs("m").as_ptr());
            isl_connect_new_io(c, cs("v").as_ptr(), 1, 0, 3);
            isl_connect_new_io(c, cs("label").as_ptr(), 1, 3, 1);
            let v = cs("v");

            assert_eq!(isl_io_set_real(c, v.as_ptr(), [1.0, 2.0, 3.0].as_ptr(), 3), 0);
            assert_eq!(
                isl_io_set_real(c, v.as_ptr(), [1.0].as_ptr(), 1),
                StatusCode::SizeMismatch as c_int
            );
            assert_eq!(
                isl_io_set_integer(c, v.as_ptr(), [1].as_ptr(), 1),
                StatusCode::TypeMismatch as c_int
            );

            let mut out = [0.0; 3];
            assert_eq!(isl_io_get_real(c, v.as_ptr(), out.as_mut_ptr(), 3), 0);
            assert_eq!(out, [1.0, 2.0, 3.0]);
            let mut short = [0.0; 2];
            assert_eq!(
                isl_io_get_real(c, v.as_ptr(), short.as_mut_ptr(), 2),
                StatusCode::SizeMismatch as c_int
            );

            let label = cs("label");
            assert_eq!(isl_io_set_string(c, label.as_ptr(), cs("go").as_ptr()), 0);
            let mut buf = [0 as c_char; 8];
            assert_eq!(isl_io_get_string(c, label.as_ptr(), buf.as_mut_ptr(), buf.len()), 0);
            assert_eq!(std::ffi::CStr::from_ptr(buf.as_ptr()).to_str().unwrap(), "go");

            assert_eq!(isl_io_get_size(c, v.as_ptr()), 3);
            assert_eq!(isl_io_get_type(c, label.as_ptr()), SignalType::String.code());
            assert_eq!(isl_io_get_type(c, cs("nope").as_ptr()), -1);
            assert_eq!(
                isl_io_set_step_size(c, cs("nope").as_ptr(), 1.0),
                StatusCode::NotFound as c_int
            );
            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_exchange_between_two_connectors() {
        unsafe {
            let hub = isl_hub_new();
            let car = model(hub, "car", "speed", 1);
            let driver = model(hub, "driver", "speed", 0);
            let speed = cs("speed");
            let session = cs("ffi-exchange");

            assert_eq!(isl_connect_create(car, session.as_ptr()), 0);
            assert_eq!(isl_connect_create(driver, session.as_ptr()), 0);
            assert_eq!(isl_connect_connect(car, 1), 0);
            assert_eq!(isl_connect_connect(driver, 1), 0);
            assert_eq!(isl_io_get_fifo_readers(car, speed.as_ptr()), 1);

            assert_eq!(isl_io_set_real(car, speed.as_ptr(), [10.5].as_ptr(), 1), 0);
            assert_eq!(isl_io_set_data(car, speed.as_ptr(), 0.0, 1), 0);

            let mut time = -1.0;
            assert_eq!(isl_io_get_data(driver, speed.as_ptr(), 0.0, 1, &mut time), 0);
            assert_eq!(time, 0.0);
            let mut out = [0.0];
            assert_eq!(isl_io_get_real(driver, speed.as_ptr(), out.as_mut_ptr(), 1), 0);
            assert_eq!(out[0], 10.5);

            assert_eq!(isl_io_get_fifo_writer_index(driver, speed.as_ptr()), isl_io_get_fifo_writer_index(car, speed.as_ptr()));
            assert_eq!(isl_io_get_fifo_reader_index(driver, speed.as_ptr(), -1), -1);

            assert_eq!(isl_connect_disconnect(driver), 0);
            assert_eq!(isl_connect_disconnect(car), 0);
            isl_connect_free(driver);
            isl_connect_free(car);
            isl_hub_free(hub);
        }
    }
    #[test]
    fn test_set_terminated_releases_blocked_read() {
        unsafe {
            let hub = isl_hub_new();
            let car = model(hub, "car", "torque", 1);
            let driver = model(hub, "driver", "torque", 0);
            let torque = cs("torque");
            let session = cs("ffi-cancel");
            assert_eq!(isl_io_set_sync_timeout(driver, torque.as_ptr(), 10), 0);
            assert_eq!(isl_connect_create(car, session.as_ptr()), 0);
            assert_eq!(isl_connect_create(driver, session.as_ptr()), 0);
            assert_eq!(isl_connect_connect(car, 1), 0);
            assert_eq!(isl_connect_connect(driver, 1), 0);

            // raw pointers are not Send
            let addr = driver as usize;
            let blocked = std::thread::spawn(move || {
                let id = cs("torque");
                let mut time = -1.0;
                let code = isl_io_get_last_data(addr as *mut IslConnectHandle, id.as_ptr(), 1, &mut time);
                (code, time)
            });
            std::thread::sleep(std::time::Duration::from_millis(100));
            assert_eq!(isl_connect_set_terminated(driver, 1), 0);
            let (code, time) = blocked.join().unwrap();
            assert_eq!(code, StatusCode::Terminated as c_int);
            assert_eq!(time, -1.0);
            assert_eq!(isl_connect_is_terminated(driver), 1);

            assert_eq!(isl_connect_disconnect(driver), 0);
            assert_eq!(isl_connect_disconnect(car), 0);
            isl_connect_free(driver);
            isl_connect_free(car);
            isl_hub_free(hub);
        }
    }
}
