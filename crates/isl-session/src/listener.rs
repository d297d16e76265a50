//! Stop listener - background thread waiting for a stop request
//!
//! The thread blocks on a hub stop signal. When released it either raises
//! the connector's terminated flag (`Mode::Stop`) or ends the process
//! (`Mode::Exit`).

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use isl_core::log::msg;
use isl_core::{IslError, IslResult};
use isl_data::Termination;

use crate::hub::{Hub, StopKey, StopSignal};

/// What a released listener does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Mode {
    /// Raise the terminated flag and return control to the caller
    #[default]
    Stop = 0,
    /// Terminate the process with status 0
    Exit = 1,
}

impl Mode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Mode::Stop),
            1 => Some(Mode::Exit),
            _ => None,
        }
    }

    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Mode shared between a connector and its listener thread
#[derive(Debug, Default)]
pub struct SharedMode(AtomicU8);

impl SharedMode {
    pub fn get(&self) -> Mode {
        match self.0.load(Ordering::Acquire) {
            1 => Mode::Exit,
            _ => Mode::Stop,
        }
    }

    pub fn set(&self, mode: Mode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

/// Handle to a running listener; dropping it ends the thread
#[derive(Debug)]
pub struct StopListener {
    key: StopKey,
    signal: Arc<StopSignal>,
    closed: Arc<AtomicBool>,
    // Yields true when the thread consumed a stop request
    handle: Option<JoinHandle<bool>>,
}

impl StopListener {
    /// Start a thread waiting for a stop request addressed to `key`
    pub fn spawn(
        hub: &Hub,
        key: StopKey,
        mode: Arc<SharedMode>,
        termination: Arc<Termination>,
    ) -> IslResult<Self> {
        let signal = hub.stop_signal(key.clone());
        let closed = Arc::new(AtomicBool::new(false));
        signal.subscribe();

        let thread_signal = Arc::clone(&signal);
        let thread_closed = Arc::clone(&closed);
        let thread_key = key.clone();
        let spawned = thread::Builder::new()
            .name("isl-stop-listener".into())
            .spawn(move || {
                if !thread_signal.acquire(&thread_closed) {
                    return false;
                }
                tracing::info!(msg_id = msg::LISTENER_STOP_RECEIVED, key = ?thread_key, "stop request received");
                match mode.get() {
                    Mode::Stop => termination.set(true),
                    Mode::Exit => {
                        tracing::info!(msg_id = msg::LISTENER_EXIT, "exiting process");
                        std::process::exit(0);
                    }
                }
                true
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                signal.unsubscribe();
                return Err(IslError::AllocationError(format!("listener thread: {}", e)));
            }
        };
        tracing::debug!(msg_id = msg::LISTENER_START, ?key, "stop listener started");
        Ok(StopListener {
            key,
            signal,
            closed,
            handle: Some(handle),
        })
    }

    pub fn key(&self) -> &StopKey {
        &self.key
    }

    /// Whether the thread has already handled a request
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for StopListener {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.signal.interrupt();
        let released = self
            .handle
            .take()
            .map_or(false, |handle| handle.join().unwrap_or(false));
        if !released {
            self.signal.unsubscribe();
        }
    }
}
