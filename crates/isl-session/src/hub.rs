//! Hub - the engine context shared by every connector of a process
//!
//! Holds the settings, the published channels keyed by session and connect
//! id, the model entries of the participants, the simulations table and the
//! stop signals the listeners wait on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use isl_core::log::msg;
use isl_core::{ConnectorUid, Settings, TypeTag};
use isl_data::Channel;

use crate::sims::{SimEntry, SimSlot, SimsTable};

/// Native code: a model entry already exists for this connector and session
pub const CREATE_DUPLICATE_MODEL: i32 = -1;
/// Native code: a non-owner found no owner entry to attach to
pub const CREATE_NO_OWNER: i32 = -2;
/// Native code: another live output publishes the same connect id
pub const CREATE_CHANNEL_TAKEN: i32 = -3;
/// Native code: the simulations table has no free slot
pub const CREATE_SIMS_FULL: i32 = -4;

/// Description a participant registers at `create`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelEntry {
    pub type_tag: TypeTag,
    pub nb_ios: usize,
    pub uuid: String,
    pub name: String,
    pub file: String,
}

/// Who a stop request is addressed to
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StopKey {
    /// Every listener of the process
    Global,
    /// Listeners of one session
    Session(String),
}

/// Counting semaphore the stop listeners wait on
#[derive(Debug, Default)]
pub struct StopSignal {
    state: Mutex<StopState>,
    cv: Condvar,
}

#[derive(Debug, Default)]
struct StopState {
    permits: u32,
    // Subscribed listeners that have not consumed a permit yet
    waiting: u32,
}

impl StopSignal {
    /// Release one waiter; false when every listener already has a permit
    fn release(&self) -> bool {
        let mut st = self.state.lock();
        if st.waiting <= st.permits {
            return false;
        }
        st.permits += 1;
        self.cv.notify_all();
        true
    }

    /// Block until a stop request arrives (true) or `closed` is raised (false)
    ///
    /// A true return consumes the subscription; the caller must not unsubscribe.
    pub fn acquire(&self, closed: &AtomicBool) -> bool {
        let mut st = self.state.lock();
        loop {
            if closed.load(Ordering::Acquire) {
                return false;
            }
            if st.permits > 0 {
                st.permits -= 1;
                st.waiting = st.waiting.saturating_sub(1);
                return true;
            }
            self.cv.wait(&mut st);
        }
    }

    /// Wake every waiter so it re-checks its close flag
    pub fn interrupt(&self) {
        let _st = self.state.lock();
        self.cv.notify_all();
    }

    pub(crate) fn subscribe(&self) {
        self.state.lock().waiting += 1;
    }

    /// Withdraw a listener that never consumed a permit
    pub(crate) fn unsubscribe(&self) {
        let mut st = self.state.lock();
        st.waiting = st.waiting.saturating_sub(1);
        st.permits = st.permits.min(st.waiting);
    }
}

type ChannelKey = (String, String);
type ModelKey = (String, ConnectorUid);

#[derive(Debug)]
struct Registry {
    channels: HashMap<ChannelKey, Arc<Channel>>,
    models: HashMap<ModelKey, ModelEntry>,
    sims: SimsTable,
}

/// Engine context
#[derive(Debug)]
pub struct Hub {
    settings: Settings,
    registry: Mutex<Registry>,
    stops: Mutex<HashMap<StopKey, Arc<StopSignal>>>,
}

impl Hub {
    /// Create a hub with default settings
    pub fn new() -> Arc<Self> {
        Self::with_config(Settings::default())
    }

    /// Create a hub with custom settings
    pub fn with_config(settings: Settings) -> Arc<Self> {
        let sims = SimsTable::new(settings.max_simulations);
        Arc::new(Hub {
            settings,
            registry: Mutex::new(Registry {
                channels: HashMap::new(),
                models: HashMap::new(),
                sims,
            }),
            stops: Mutex::new(HashMap::new()),
        })
    }

    /// Create a hub from `ISL_SETTINGS` or `isl_api.json`
    pub fn from_env() -> Arc<Self> {
        Self::with_config(Settings::from_env())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn register_model(
        &self,
        session: &str,
        uid: ConnectorUid,
        entry: ModelEntry,
    ) -> Result<(), i32> {
        let mut reg = self.registry.lock();
        let key = (session.to_string(), uid);
        if reg.models.contains_key(&key) {
            return Err(CREATE_DUPLICATE_MODEL);
        }
        reg.models.insert(key, entry);
        Ok(())
    }

    pub(crate) fn has_model(&self, session: &str, uid: ConnectorUid) -> bool {
        self.registry
            .lock()
            .models
            .contains_key(&(session.to_string(), uid))
    }

    pub(crate) fn unregister_model(&self, session: &str, uid: ConnectorUid) {
        self.registry.lock().models.remove(&(session.to_string(), uid));
    }

    /// Publish an output channel; a terminated one under the same key is replaced
    pub(crate) fn publish_channel(&self, session: &str, channel: Arc<Channel>) -> Result<(), i32> {
        let mut reg = self.registry.lock();
        let key = (session.to_string(), channel.connect_id().to_string());
        if let Some(existing) = reg.channels.get(&key) {
            if !existing.is_terminated() {
                return Err(CREATE_CHANNEL_TAKEN);
            }
        }
        reg.channels.insert(key, channel);
        Ok(())
    }

    /// Live channel published under `connect_id` in `session`
    pub fn find_channel(&self, session: &str, connect_id: &str) -> Option<Arc<Channel>> {
        self.registry
            .lock()
            .channels
            .get(&(session.to_string(), connect_id.to_string()))
            .filter(|c| !c.is_terminated())
            .cloned()
    }

    /// Drop the channel entry if it is `channel` itself
    pub(crate) fn withdraw_channel(&self, session: &str, channel: &Arc<Channel>) {
        let mut reg = self.registry.lock();
        let key = (session.to_string(), channel.connect_id().to_string());
        if reg
            .channels
            .get(&key)
            .is_some_and(|c| Arc::ptr_eq(c, channel))
        {
            reg.channels.remove(&key);
        }
    }

    pub(crate) fn add_sim(&self, slot: SimSlot) -> Result<usize, i32> {
        self.registry.lock().sims.add(slot).ok_or(CREATE_SIMS_FULL)
    }

    pub(crate) fn remove_sim(&self, uid: ConnectorUid, session: &str) -> bool {
        self.registry.lock().sims.remove(uid, session)
    }

    /// Size of the simulations table
    pub fn max_sims(&self) -> usize {
        self.registry.lock().sims.max_nb()
    }

    /// Occupied slots of the simulations table
    pub fn active_sims(&self) -> usize {
        self.registry.lock().sims.active()
    }

    /// Snapshot slot `index` into `entry`
    ///
    /// Returns false and leaves `entry` untouched when the index is out of
    /// range, the slot is free or its model entry is gone.
    pub fn get_sim(&self, index: usize, entry: &mut SimEntry) -> bool {
        let reg = self.registry.lock();
        let Some(slot) = reg.sims.get(index) else {
            return false;
        };
        let Some(model) = reg.models.get(&(slot.session.clone(), slot.uid)) else {
            return false;
        };
        *entry = SimEntry {
            type_tag: model.type_tag,
            uid: slot.uid,
            pid: slot.pid,
            nb_ios: model.nb_ios,
            uuid: model.uuid.clone(),
            name: slot.name.clone(),
            file: model.file.clone(),
            session: slot.session.clone(),
        };
        true
    }

    /// Stop signal for `key`, created on first use
    pub(crate) fn stop_signal(&self, key: StopKey) -> Arc<StopSignal> {
        Arc::clone(self.stops.lock().entry(key).or_default())
    }

    fn release_stop(&self, key: &StopKey) -> bool {
        let signal = self.stops.lock().get(key).cloned();
        match signal {
            Some(signal) if signal.release() => true,
            _ => {
                tracing::debug!(msg_id = msg::LISTENER_NO_TARGET, ?key, "no listener for stop request");
                false
            }
        }
    }

    /// Release one listener waiting on the global stop key
    pub fn send_stop_request(&self) -> bool {
        self.release_stop(&StopKey::Global)
    }

    /// Release one listener waiting on `session`
    pub fn send_stop_session(&self, session: &str) -> bool {
        self.release_stop(&StopKey::Session(session.to_string()))
    }
}
