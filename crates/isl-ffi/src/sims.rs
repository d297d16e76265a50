//! FFI simulations table
//!
//! A sim handle owns a snapshot of one table slot. The strings it exposes
//! stay valid until the next successful `isl_sims_get` on the same handle.

use std::ffi::{c_char, c_int, c_uint, CString};
use std::ptr;

use isl_session::SimEntry;

use crate::error::*;
use crate::hub::IslHubHandle;

/// Opaque handle to a simulation snapshot
#[derive(Default)]
pub struct IslSimHandle {
    pub(crate) entry: SimEntry,
    strings: SimStrings,
}

#[derive(Default)]
struct SimStrings {
    type_tag: CString,
    uuid: CString,
    name: CString,
    file: CString,
    session: CString,
}

impl SimStrings {
    fn of(entry: &SimEntry) -> Self {
        let c = |s: &str| CString::new(s).unwrap_or_default();
        SimStrings {
            type_tag: c(&entry.type_tag.as_string()),
            uuid: c(&entry.uuid),
            name: c(&entry.name),
            file: c(&entry.file),
            session: c(&entry.session),
        }
    }
}

/// Create an empty snapshot
/// Returns a handle that must be freed with isl_sim_free
#[no_mangle]
pub extern "C" fn isl_sim_new() -> *mut IslSimHandle {
    Box::into_raw(Box::<IslSimHandle>::default())
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_free(handle: *mut IslSimHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Size of the simulations table, 0 for a null hub
#[no_mangle]
pub unsafe extern "C" fn isl_sims_get_max_nb(hub: *const IslHubHandle) -> c_int {
    hub.as_ref().map_or(0, |h| h.hub.max_sims() as c_int)
}

/// Occupied slots, 0 for a null hub
#[no_mangle]
pub unsafe extern "C" fn isl_sims_get_active_nb(hub: *const IslHubHandle) -> c_int {
    hub.as_ref().map_or(0, |h| h.hub.active_sims() as c_int)
}

/// Snapshot slot `index` into `sim`
/// Returns 1 on success, 0 when the slot is free or out of range (the
/// snapshot is left untouched), negative on a null handle
#[no_mangle]
pub unsafe extern "C" fn isl_sims_get(hub: *const IslHubHandle, index: c_int, sim: *mut IslSimHandle) -> c_int {
    let (Some(hub), Some(sim)) = (hub.as_ref(), sim.as_mut()) else {
        return null_handle();
    };
    if index < 0 {
        return 0;
    }
    let mut entry = sim.entry.clone();
    if !hub.hub.get_sim(index as usize, &mut entry) {
        return 0;
    }
    sim.strings = SimStrings::of(&entry);
    sim.entry = entry;
    1
}

unsafe fn field(sim: *const IslSimHandle, pick: impl FnOnce(&IslSimHandle) -> &CString) -> *const c_char {
    match sim.as_ref() {
        Some(sim) => pick(sim).as_ptr(),
        None => ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_type(sim: *const IslSimHandle) -> *const c_char {
    field(sim, |s| &s.strings.type_tag)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_uuid(sim: *const IslSimHandle) -> *const c_char {
    field(sim, |s| &s.strings.uuid)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_name(sim: *const IslSimHandle) -> *const c_char {
    field(sim, |s| &s.strings.name)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_file(sim: *const IslSimHandle) -> *const c_char {
    field(sim, |s| &s.strings.file)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_session(sim: *const IslSimHandle) -> *const c_char {
    field(sim, |s| &s.strings.session)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_uid(sim: *const IslSimHandle) -> c_uint {
    sim.as_ref().map_or(0, |s| s.entry.uid.0)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_pid(sim: *const IslSimHandle) -> c_uint {
    sim.as_ref().map_or(0, |s| s.entry.pid)
}

#[no_mangle]
pub unsafe extern "C" fn isl_sim_get_nb_ios(sim: *const IslSimHandle) -> c_int {
    sim.as_ref().map_or(0, |s| s.entry.nb_ios as c_int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connect::*;
    use crate::hub::{isl_hub_free, isl_hub_new};
    use std::ffi::CStr;

    #[test]
    fn test_snapshot_of_created_model() {
        unsafe {
            let hub = isl_hub_new();
            let c = isl_connect_init(hub, 1);
            isl_connect_new(c, CString::new("plant").unwrap().as_ptr());
            isl_connect_set_end_time(c, 1.0);
            isl_connect_set_step_size(c, 0.1);
            isl_connect_new_io(c, CString::new("y").unwrap().as_ptr(), 1, 0, 1);
            assert_eq!(isl_connect_create(c, CString::new("ffi-sims").unwrap().as_ptr()), 0);

            let sim = isl_sim_new();
            assert!(isl_sims_get_max_nb(hub) > 0);
            assert_eq!(isl_sims_get_active_nb(hub), 1);
            assert_eq!(isl_sims_get(hub, 0, sim), 1);
            assert_eq!(CStr::from_ptr(isl_sim_get_name(sim)).to_str().unwrap(), "plant");
            assert_eq!(CStr::from_ptr(isl_sim_get_session(sim)).to_str().unwrap(), "ffi-sims");
            assert_eq!(isl_sim_get_nb_ios(sim), 1);
            assert_eq!(isl_sim_get_uid(sim), isl_connect_get_uid(c));

            // a failed lookup keeps the previous snapshot
            assert_eq!(isl_sims_get(hub, 1, sim), 0);
            assert_eq!(isl_sims_get(hub, -1, sim), 0);
            assert_eq!(CStr::from_ptr(isl_sim_get_name(sim)).to_str().unwrap(), "plant");

            isl_sim_free(sim);
            isl_connect_free(c);
            isl_hub_free(hub);
        }
    }

    #[test]
    fn test_null_sim() {
        unsafe {
            assert_eq!(isl_sims_get_max_nb(ptr::null()), 0);
            assert_eq!(isl_sims_get(ptr::null(), 0, ptr::null_mut()), NULL_HANDLE);
            assert!(isl_sim_get_name(ptr::null()).is_null());
            isl_sim_free(ptr::null_mut());
        }
    }
}
