//! Exchange channel - a shared FIFO plus the blocking waits around it
//!
//! One channel exists per connected output. The writer IO and every reader
//! IO hold an `Arc<Channel>`. Cursor and slot mutation happen under one
//! mutex; writers wait on `writable` while the FIFO is full and readers wait
//! on `readable` while nothing matches.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use isl_core::log::msg;
use isl_core::{IslError, IslResult, SignalType};

use crate::fifo::Fifo;

/// Outcome of one attempt made under the channel lock
pub enum Attempt<T> {
    /// Done, wake the other side
    Ready(T),
    /// Not possible yet; the error is returned when not waiting
    Blocked(IslError),
    /// Failed for good
    Failed(IslError),
}

/// Which side of the channel a wait is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Writer,
    Reader,
}

/// Shared FIFO with blocking access
pub struct Channel {
    connect_id: String,
    signal_type: SignalType,
    size: usize,
    fifo: Mutex<Fifo>,
    readable: Condvar,
    writable: Condvar,
    terminated: AtomicBool,
}

impl Channel {
    pub fn new(connect_id: impl Into<String>, signal_type: SignalType, size: usize, fifo: Fifo) -> Arc<Self> {
        Arc::new(Channel {
            connect_id: connect_id.into(),
            signal_type,
            size,
            fifo: Mutex::new(fifo),
            readable: Condvar::new(),
            writable: Condvar::new(),
            terminated: AtomicBool::new(false),
        })
    }

    pub fn connect_id(&self) -> &str {
        &self.connect_id
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the writer or a reader has left the channel
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Mark the channel dead and release every waiter
    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
        self.wake_all();
    }

    /// Wake every waiter so it re-checks its stop conditions
    pub fn wake_all(&self) {
        // Taking the lock orders the wake after any waiter's flag check
        let _guard = self.fifo.lock();
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// Run `f` under the lock without waiting
    pub fn with_fifo<T>(&self, f: impl FnOnce(&mut Fifo) -> T) -> T {
        let mut fifo = self.fifo.lock();
        f(&mut *fifo)
    }

    /// Attach a reader cursor
    pub fn add_reader(&self) -> IslResult<usize> {
        self.fifo.lock().add_reader()
    }

    /// Repeat `attempt` under the lock until it completes
    ///
    /// When `wait` is false the first blocked attempt returns its error.
    /// Otherwise the caller sleeps on the condition variable of `side` until
    /// woken, the `timeout` elapses (`SyncTimeout`) or `cancel` or the channel
    /// is terminated (`Terminated`).
    pub fn exchange<T>(
        &self,
        side: Side,
        wait: bool,
        timeout: Option<Duration>,
        cancel: &Termination,
        mut attempt: impl FnMut(&mut Fifo) -> Attempt<T>,
    ) -> IslResult<T> {
        let (cv, other) = match side {
            Side::Writer => (&self.writable, &self.readable),
            Side::Reader => (&self.readable, &self.writable),
        };
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut fifo = self.fifo.lock();
        let mut timed_out = false;

        loop {
            match attempt(&mut *fifo) {
                Attempt::Ready(v) => {
                    other.notify_all();
                    return Ok(v);
                }
                Attempt::Failed(e) => return Err(e),
                Attempt::Blocked(e) => {
                    if !wait {
                        return Err(e);
                    }
                }
            }

            if self.is_terminated() || cancel.is_set() {
                // A peer leaving ends the whole participant; `set` relocks channels
                drop(fifo);
                cancel.set(true);
                tracing::debug!(
                    msg_id = msg::DATA_TERMINATED,
                    connect_id = %self.connect_id,
                    "wait released by termination"
                );
                return Err(IslError::Terminated);
            }
            if timed_out {
                tracing::warn!(
                    msg_id = msg::DATA_SYNC_TIMEOUT,
                    connect_id = %self.connect_id,
                    ?side,
                    "synchronization timeout"
                );
                return Err(IslError::SyncTimeout);
            }

            match deadline {
                Some(deadline) => {
                    // Spurious wakeups loop back; expiry gets one last attempt
                    if cv.wait_until(&mut fifo, deadline).timed_out() {
                        timed_out = true;
                    }
                }
                None => cv.wait(&mut fifo),
            }
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("connect_id", &self.connect_id)
            .field("signal_type", &self.signal_type)
            .field("size", &self.size)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

/// Participant-wide terminated flag
///
/// Shared by a connector, its IOs and its stop listener. Setting it wakes
/// every waiter on the channels registered with [`Termination::watch`].
#[derive(Default)]
pub struct Termination {
    flag: AtomicBool,
    channels: Mutex<Vec<Arc<Channel>>>,
}

impl Termination {
    pub fn new() -> Arc<Self> {
        Arc::new(Termination::default())
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Set the flag to `terminated`; raising it releases all waiters
    pub fn set(&self, terminated: bool) {
        self.flag.store(terminated, Ordering::Release);
        if terminated {
            for channel in self.channels.lock().iter() {
                channel.wake_all();
            }
        }
    }

    /// Register a channel whose waiters this flag must release
    pub fn watch(&self, channel: &Arc<Channel>) {
        let mut channels = self.channels.lock();
        if !channels.iter().any(|c| Arc::ptr_eq(c, channel)) {
            channels.push(Arc::clone(channel));
        }
    }

    pub fn unwatch(&self, channel: &Arc<Channel>) {
        self.channels.lock().retain(|c| !Arc::ptr_eq(c, channel));
    }
}

impl std::fmt::Debug for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Termination")
            .field("set", &self.is_set())
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}
