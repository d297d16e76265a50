//! IO - one declared signal and its data exchange operations
//!
//! An output owns the channel it publishes to. An input holds a reader
//! cursor on the channel of the output it is connected to. A viewer holds
//! the channel without a cursor and may only inspect it.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use isl_core::log::msg;
use isl_core::{
    timeout_from_secs, Causality, IslError, IslResult, OverflowPolicy, Settings, SignalType, Value,
    EVENT_STEP, EVENT_TIME,
};

use crate::channel::{Attempt, Channel, Side, Termination};
use crate::fifo::{Entry, Fifo, FifoConfig, TimedRead};
use crate::store::Store;

/// Limits an IO takes from the engine settings
#[derive(Clone, Debug)]
pub struct IoLimits {
    pub max_string_size: usize,
    pub max_fifo_depth: usize,
    pub max_readers: usize,
    pub step_tolerance: f64,
    pub overflow_policy: OverflowPolicy,
}

impl IoLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        IoLimits {
            max_string_size: settings.max_string_size,
            max_fifo_depth: settings.max_fifo_depth,
            max_readers: settings.max_readers,
            step_tolerance: settings.step_tolerance,
            overflow_policy: settings.overflow_policy,
        }
    }
}

impl Default for IoLimits {
    fn default() -> Self {
        IoLimits::from_settings(&Settings::default())
    }
}

/// Connector timing an IO is validated against
#[derive(Clone, Copy, Debug)]
pub struct CheckContext {
    pub start_time: f64,
    pub end_time: f64,
    /// Connector step, `-1` in event mode
    pub step_size: f64,
    pub step_tolerance: f64,
    pub is_owner: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Writer,
    Reader(usize),
    Viewer,
}

struct Link {
    channel: Arc<Channel>,
    role: Role,
}

/// A typed signal owned by one connector
pub struct Io {
    id: String,
    name: String,
    connect_id: String,
    causality: Causality,
    signal_type: SignalType,
    size: usize,
    step_size: f64,
    original_step: f64,
    store_enabled: bool,
    sync_timeout: Option<Duration>,
    fifo_depth: usize,
    initial: Value,
    value: Value,
    last_step: f64,
    store: Store,
    limits: IoLimits,
    link: Option<Link>,
    termination: Arc<Termination>,
}

impl Io {
    /// Declare an IO; `size` above 1 makes it vector valued
    pub fn new(
        id: impl Into<String>,
        causality: Causality,
        signal_type: SignalType,
        size: usize,
        limits: IoLimits,
        termination: Arc<Termination>,
    ) -> IslResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(IslError::MissingIdentifier);
        }
        let size = size.max(1);
        let initial = Value::zeroed(signal_type, size)?;
        Ok(Io {
            name: id.clone(),
            connect_id: String::new(),
            id,
            causality,
            signal_type,
            size,
            step_size: 0.0,
            original_step: EVENT_STEP,
            store_enabled: false,
            sync_timeout: None,
            fifo_depth: limits.max_fifo_depth,
            value: initial.clone(),
            initial,
            last_step: EVENT_STEP,
            store: Store::new(),
            limits,
            link: None,
            termination,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connect_id(&self) -> &str {
        &self.connect_id
    }

    pub fn causality(&self) -> Causality {
        self.causality
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.causality == Causality::Input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.causality == Causality::Output
    }

    pub fn signal_type(&self) -> SignalType {
        self.signal_type
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    /// Step recorded with plain writes, resolved by `check`
    pub fn original_step(&self) -> f64 {
        self.original_step
    }

    pub fn is_store_used(&self) -> bool {
        self.store_enabled
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout
    }

    pub fn fifo_depth(&self) -> usize {
        self.fifo_depth
    }

    pub fn initial_value(&self) -> &Value {
        &self.initial
    }

    /// Current value: last one set locally or received
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Step of the last entry received
    pub fn last_step(&self) -> f64 {
        self.last_step
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Channel this IO publishes to, if it is a connected output
    pub fn published_channel(&self) -> Option<&Arc<Channel>> {
        self.link
            .as_ref()
            .filter(|l| l.role == Role::Writer)
            .map(|l| &l.channel)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_connect_id(&mut self, connect_id: impl Into<String>) -> IslResult<()> {
        self.ensure_unlinked()?;
        self.connect_id = connect_id.into();
        Ok(())
    }

    pub fn set_step_size(&mut self, step: f64) {
        self.step_size = step;
    }

    pub fn use_store(&mut self, enabled: bool) {
        self.store_enabled = enabled;
    }

    /// Timeout in whole seconds, `<= 0` waits without bound
    pub fn set_sync_timeout(&mut self, secs: i32) {
        self.sync_timeout = timeout_from_secs(secs);
    }

    pub fn set_sync_timeout_duration(&mut self, timeout: Option<Duration>) {
        self.sync_timeout = timeout.filter(|t| !t.is_zero());
    }

    pub fn set_fifo_depth(&mut self, depth: usize) -> IslResult<()> {
        self.ensure_unlinked()?;
        if depth < 2 || depth > self.limits.max_fifo_depth {
            return Err(IslError::ValidationError(format!(
                "fifo depth {} outside 2..={}",
                depth, self.limits.max_fifo_depth
            )));
        }
        self.fifo_depth = depth;
        Ok(())
    }

    pub fn set_initial_value(&mut self, value: Value) -> IslResult<()> {
        value.conform(self.signal_type, self.size, self.limits.max_string_size)?;
        self.initial = value;
        Ok(())
    }

    /// Set the initial value from its comma-separated text form
    pub fn set_initial_str(&mut self, text: &str) -> IslResult<()> {
        let value = Value::parse(self.signal_type, self.size, text)?;
        self.set_initial_value(value)
    }

    /// Replace the current value; a wrong kind or size leaves it unchanged
    pub fn set_value(&mut self, value: Value) -> IslResult<()> {
        if let Err(e) = value.conform(self.signal_type, self.size, self.limits.max_string_size) {
            tracing::warn!(
                msg_id = msg::DATA_TYPE_MISMATCH,
                io = %self.id,
                expected = %self.signal_type,
                actual = %value.signal_type(),
                "value rejected"
            );
            return Err(e);
        }
        self.value = value;
        Ok(())
    }

    fn ensure_unlinked(&self) -> IslResult<()> {
        if self.link.is_some() {
            return Err(IslError::InvalidState(format!("io {} is connected", self.id)));
        }
        Ok(())
    }

    /// Validate against the connector timing and resolve derived fields
    pub fn check(&mut self, ctx: &CheckContext) -> IslResult<()> {
        if !self.signal_type.is_supported() {
            return Err(IslError::UnsupportedType(self.signal_type));
        }
        self.initial
            .conform(self.signal_type, self.size, self.limits.max_string_size)
            .map_err(|e| IslError::ValidationError(format!("io {}: {}", self.id, e)))?;

        if self.step_size == 0.0 {
            self.step_size = EVENT_STEP;
        }
        let span = ctx.end_time - ctx.start_time;
        if self.step_size > 0.0 && ctx.step_size != EVENT_STEP && self.step_size >= span {
            tracing::warn!(
                msg_id = msg::DATA_STEP_IGNORED,
                io = %self.id,
                step = self.step_size,
                span,
                "io step not smaller than the simulated span, ignored"
            );
            self.step_size = EVENT_STEP;
        }
        self.original_step = if self.step_size > 0.0 {
            self.step_size
        } else {
            ctx.step_size
        };

        if self.connect_id.is_empty() {
            tracing::debug!(msg_id = msg::DATA_NO_CONNECT_ID, io = %self.id, "connect id defaults to io id");
            self.connect_id = self.id.clone();
        }
        if !ctx.is_owner && self.is_output() {
            self.causality = Causality::Input;
        }
        self.limits.step_tolerance = ctx.step_tolerance;
        Ok(())
    }

    /// Create the channel this output publishes to
    ///
    /// Every slot starts with the initial value at `start_time`.
    pub fn open_channel(&mut self, start_time: f64) -> IslResult<Arc<Channel>> {
        self.ensure_unlinked()?;
        if !self.is_output() {
            return Err(IslError::InvalidState(format!("io {} is not an output", self.id)));
        }
        let config = FifoConfig {
            depth: self.fifo_depth,
            max_readers: self.limits.max_readers,
            step_tolerance: self.limits.step_tolerance,
            original_step: self.original_step,
            overflow_policy: self.limits.overflow_policy,
        };
        let fifo = Fifo::new(config, self.initial.clone(), start_time)?;
        let channel = Channel::new(self.connect_id.clone(), self.signal_type, self.size, fifo);
        self.value = self.initial.clone();
        self.attach(Arc::clone(&channel), Role::Writer);
        Ok(channel)
    }

    /// Connect this input to a published channel
    pub fn attach_reader(&mut self, channel: Arc<Channel>) -> IslResult<()> {
        self.ensure_unlinked()?;
        self.ensure_compatible(&channel)?;
        let reader = channel.add_reader()?;
        self.value = self.initial.clone();
        self.attach(channel, Role::Reader(reader));
        Ok(())
    }

    /// Connect read-only, without a reader cursor
    pub fn attach_viewer(&mut self, channel: Arc<Channel>) -> IslResult<()> {
        self.ensure_unlinked()?;
        self.ensure_compatible(&channel)?;
        self.attach(channel, Role::Viewer);
        Ok(())
    }

    fn ensure_compatible(&self, channel: &Channel) -> IslResult<()> {
        if channel.signal_type() != self.signal_type {
            return Err(IslError::TypeMismatch {
                expected: self.signal_type,
                actual: channel.signal_type(),
            });
        }
        if channel.size() != self.size {
            return Err(IslError::SizeMismatch {
                expected: self.size,
                actual: channel.size(),
            });
        }
        Ok(())
    }

    fn attach(&mut self, channel: Arc<Channel>, role: Role) {
        self.termination.watch(&channel);
        tracing::debug!(
            msg_id = msg::DATA_CONNECTED,
            io = %self.id,
            connect_id = %self.connect_id,
            ?role,
            "io connected"
        );
        self.link = Some(Link { channel, role });
    }

    /// Leave the channel; peers blocked on it are released
    pub fn detach(&mut self) {
        if let Some(link) = self.link.take() {
            if link.role != Role::Viewer {
                link.channel.terminate();
            }
            self.termination.unwatch(&link.channel);
            tracing::debug!(msg_id = msg::DATA_DISCONNECTED, io = %self.id, "io disconnected");
        }
    }

    fn link(&self) -> IslResult<&Link> {
        self.link
            .as_ref()
            .ok_or_else(|| IslError::NotConnected(self.id.clone()))
    }

    fn writer(&self) -> IslResult<&Arc<Channel>> {
        let link = self.link()?;
        match link.role {
            Role::Writer => Ok(&link.channel),
            _ => Err(IslError::InvalidState(format!("io {} cannot publish", self.id))),
        }
    }

    fn reader(&self) -> IslResult<(&Arc<Channel>, usize)> {
        let link = self.link()?;
        match link.role {
            Role::Reader(r) => Ok((&link.channel, r)),
            _ => Err(IslError::InvalidState(format!("io {} has no reader cursor", self.id))),
        }
    }

    fn publish(&self, time: f64, step: f64, wait: bool) -> IslResult<()> {
        let channel = self.writer()?;
        let value = &self.value;
        channel.exchange(Side::Writer, wait, self.sync_timeout, &self.termination, |fifo| {
            match fifo.push(value.clone(), time, step, !wait) {
                Ok(()) => Attempt::Ready(()),
                Err(IslError::FifoFull) => Attempt::Blocked(IslError::FifoFull),
                Err(e) => Attempt::Failed(e),
            }
        })
    }

    fn receive(&mut self, entry: Entry) -> f64 {
        self.value = entry.value;
        self.last_step = entry.step;
        entry.time
    }

    /// Publish the current value at `time` with the IO step
    pub fn set_data(&mut self, time: f64, wait: bool) -> IslResult<()> {
        self.publish(time, self.original_step, wait)
    }

    /// Publish the current value at `time` with an explicit next step
    pub fn set_data_and_step(&mut self, time: f64, step: f64, wait: bool) -> IslResult<()> {
        self.publish(time, step, wait)
    }

    /// Republish the previously published value at a new time and step
    pub fn set_last_data(&mut self, time: f64, step: f64, wait: bool) -> IslResult<()> {
        let channel = self.writer()?;
        channel.exchange(Side::Writer, wait, self.sync_timeout, &self.termination, |fifo| {
            match fifo.push_last(time, step, !wait) {
                Ok(()) => Attempt::Ready(()),
                Err(IslError::FifoFull) => Attempt::Blocked(IslError::FifoFull),
                Err(e) => Attempt::Failed(e),
            }
        })
    }

    /// Publish the current value as an event
    pub fn set_event_data(&mut self, wait: bool) -> IslResult<()> {
        self.publish(EVENT_TIME, EVENT_STEP, wait)
    }

    fn next_entry(&self, wait: bool) -> IslResult<Entry> {
        let (channel, reader) = self.reader()?;
        channel.exchange(Side::Reader, wait, self.sync_timeout, &self.termination, |fifo| {
            match fifo.pop(reader) {
                Ok(entry) => Attempt::Ready(entry),
                Err(IslError::FifoEmpty) => Attempt::Blocked(IslError::FifoEmpty),
                Err(e) => Attempt::Failed(e),
            }
        })
    }

    /// Read the next unread entry; returns its time
    pub fn get_last_data(&mut self, wait: bool) -> IslResult<f64> {
        let entry = self.next_entry(wait)?;
        Ok(self.receive(entry))
    }

    /// Read the next unread entry; returns its time and step
    pub fn get_data_and_step(&mut self, wait: bool) -> IslResult<(f64, f64)> {
        let entry = self.next_entry(wait)?;
        let step = entry.step;
        Ok((self.receive(entry), step))
    }

    /// Read the next event; returns its time
    pub fn get_event_data(&mut self, wait: bool) -> IslResult<f64> {
        self.get_last_data(wait)
    }

    /// Read the value applicable at `time`; returns the entry time
    pub fn get_data(&mut self, time: f64, wait: bool) -> IslResult<f64> {
        let (channel, reader) = self.reader()?;
        let entry = channel.exchange(Side::Reader, wait, self.sync_timeout, &self.termination, |fifo| {
            match fifo.read_at_time(reader, time) {
                TimedRead::Found(entry) => Attempt::Ready(entry),
                TimedRead::Pending => Attempt::Blocked(IslError::NoData(time)),
                TimedRead::Missing => Attempt::Failed(IslError::NoData(time)),
            }
        })?;
        Ok(self.receive(entry))
    }

    /// Overwrite the slot `ind + 1` after the writer cursor with the current value
    pub fn set_data_at(&mut self, time: f64, ind: i32) -> IslResult<()> {
        let channel = self.writer()?;
        let value = self.value.clone();
        channel.with_fifo(|fifo| fifo.write_at(value, time, ind))
    }

    /// Read relative to this IO's cursor without consuming; returns the entry time
    ///
    /// Outputs and viewers read relative to the writer cursor.
    pub fn get_data_at(&mut self, ind: i32) -> IslResult<f64> {
        let link = self.link()?;
        let role = link.role;
        let entry = link.channel.with_fifo(|fifo| {
            let cursor = match role {
                Role::Reader(r) => fifo.reader_index(r).unwrap_or(0),
                Role::Writer | Role::Viewer => fifo.writer_index(),
            };
            fifo.read_relative(cursor, ind)
        })?;
        Ok(self.receive(entry))
    }

    /// Read the absolute FIFO slot `ind`; returns its time and step
    pub fn get_mem_data(&mut self, ind: i32) -> IslResult<(f64, f64)> {
        let entry = self
            .link()?
            .channel
            .with_fifo(|fifo| fifo.slot(ind).cloned())?;
        let step = entry.step;
        Ok((self.receive(entry), step))
    }

    /// Append the current value to the store
    ///
    /// `AlreadyStored` means an entry for `time` exists and nothing changed.
    pub fn store_data(&mut self, time: f64) -> IslResult<()> {
        if !self.store_enabled {
            return Err(IslError::StoreDisabled);
        }
        self.store.append(time, self.value.clone())
    }

    pub fn clear_store(&mut self) {
        self.store.clear();
    }

    /// Restore the stored value applicable at `time`; returns its time
    pub fn get_stored_data(&mut self, time: f64) -> IslResult<f64> {
        let entry = self
            .store
            .at_or_before(time)
            .cloned()
            .ok_or(IslError::NoData(time))?;
        self.value = entry.value;
        Ok(entry.time)
    }

    /// Persist the stored series as JSON
    pub fn save_store(&self, path: impl AsRef<Path>) -> IslResult<()> {
        self.store.save(path)
    }

    /// Replace the stored series with one read from `path`
    ///
    /// Every entry must fit the IO type and size; on error the store is unchanged.
    pub fn load_store(&mut self, path: impl AsRef<Path>) -> IslResult<()> {
        let store = Store::load(path)?;
        for entry in store.entries() {
            entry
                .value
                .conform(self.signal_type, self.size, self.limits.max_string_size)?;
        }
        self.store = store;
        Ok(())
    }

    /// Readers attached to the channel
    pub fn fifo_readers(&self) -> usize {
        self.link
            .as_ref()
            .map(|l| l.channel.with_fifo(|f| f.nb_readers()))
            .unwrap_or(0)
    }

    pub fn fifo_writer_index(&self) -> Option<usize> {
        self.link
            .as_ref()
            .map(|l| l.channel.with_fifo(|f| f.writer_index()))
    }

    pub fn fifo_reader_index(&self, reader: usize) -> Option<usize> {
        self.link
            .as_ref()
            .and_then(|l| l.channel.with_fifo(|f| f.reader_index(reader)))
    }
}

impl Drop for Io {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Io {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Io")
            .field("id", &self.id)
            .field("causality", &self.causality)
            .field("signal_type", &self.signal_type)
            .field("size", &self.size)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn ctx() -> CheckContext {
        CheckContext {
            start_time: 0.0,
            end_time: 10.0,
            step_size: 1.0,
            step_tolerance: 1e-6,
            is_owner: true,
        }
    }

    fn io(id: &str, causality: Causality, ty: SignalType) -> Io {
        let mut io = Io::new(id, causality, ty, 1, IoLimits::default(), Termination::new()).unwrap();
        io.set_fifo_depth(8).unwrap();
        io.check(&ctx()).unwrap();
        io
    }

    fn pair() -> (Io, Io) {
        let mut out = io("speed", Causality::Output, SignalType::Real);
        let mut inp = io("speed", Causality::Input, SignalType::Real);
        let ch = out.open_channel(0.0).unwrap();
        inp.attach_reader(ch).unwrap();
        (out, inp)
    }

    #[test]
    fn test_structure_unsupported() {
        let res = Io::new("s", Causality::Output, SignalType::Structure, 2, IoLimits::default(), Termination::new());
        assert!(matches!(res, Err(IslError::UnsupportedType(SignalType::Structure))));
    }

    #[test]
    fn test_check_resolves_fields() {
        let mut io = Io::new("x", Causality::Output, SignalType::Real, 1, IoLimits::default(), Termination::new()).unwrap();
        io.check(&ctx()).unwrap();
        assert_eq!(io.step_size(), EVENT_STEP);
        assert_eq!(io.original_step(), 1.0);
        assert_eq!(io.connect_id(), "x");

        let mut long = Io::new("y", Causality::Output, SignalType::Real, 1, IoLimits::default(), Termination::new()).unwrap();
        long.set_step_size(20.0);
        long.check(&ctx()).unwrap();
        assert_eq!(long.step_size(), EVENT_STEP);

        let mut foreign = Io::new("z", Causality::Output, SignalType::Real, 1, IoLimits::default(), Termination::new()).unwrap();
        foreign.check(&CheckContext { is_owner: false, ..ctx() }).unwrap();
        assert!(foreign.is_input());
    }

    #[test]
    fn test_set_then_get_at_time() {
        let (mut out, mut inp) = pair();
        out.set_value(Value::real(10.5)).unwrap();
        out.set_data(0.0, false).unwrap();

        let t = inp.get_data(0.0, true).unwrap();
        assert_eq!(t, 0.0);
        assert_eq!(inp.value(), &Value::real(10.5));
    }

    #[test]
    fn test_type_mismatch_keeps_value() {
        let mut io = io("n", Causality::Output, SignalType::Integer);
        io.set_value(Value::integer(4)).unwrap();
        assert!(matches!(
            io.set_value(Value::text("four")),
            Err(IslError::TypeMismatch { .. })
        ));
        assert_eq!(io.value(), &Value::integer(4));
    }

    #[test]
    fn test_reader_type_checked() {
        let mut out = io("a", Causality::Output, SignalType::Real);
        let mut inp = io("a", Causality::Input, SignalType::Integer);
        let ch = out.open_channel(0.0).unwrap();
        assert!(matches!(inp.attach_reader(ch), Err(IslError::TypeMismatch { .. })));
        assert!(!inp.is_connected());
    }

    #[test]
    fn test_input_cannot_publish() {
        let (_out, mut inp) = pair();
        assert!(matches!(inp.set_data(0.0, false), Err(IslError::InvalidState(_))));
        let mut lone = io("b", Causality::Input, SignalType::Real);
        assert!(matches!(lone.get_last_data(false), Err(IslError::NotConnected(_))));
    }

    #[test]
    fn test_last_data_and_step() {
        let (mut out, mut inp) = pair();
        out.set_value(Value::real(1.0)).unwrap();
        out.set_data_and_step(0.0, 0.25, false).unwrap();
        out.set_last_data(0.25, 0.5, false).unwrap();

        assert_eq!(inp.get_data_and_step(false).unwrap(), (0.0, 0.25));
        assert_eq!(inp.get_data_and_step(false).unwrap(), (0.25, 0.5));
        assert_eq!(inp.value(), &Value::real(1.0));
        assert!(matches!(inp.get_last_data(false), Err(IslError::FifoEmpty)));
    }

    #[test]
    fn test_event_transfer() {
        let (mut out, mut inp) = pair();
        out.set_value(Value::real(3.0)).unwrap();
        out.set_event_data(false).unwrap();
        assert_eq!(inp.get_event_data(false).unwrap(), EVENT_TIME);
        assert_eq!(inp.value(), &Value::real(3.0));
    }

    #[test]
    fn test_blocking_get_times_out() {
        let (_out, mut inp) = pair();
        inp.set_sync_timeout_duration(Some(Duration::from_millis(50)));
        let start = Instant::now();
        assert!(matches!(inp.get_last_data(true), Err(IslError::SyncTimeout)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_writer_blocks_until_read() {
        let (mut out, mut inp) = pair();
        out.set_value(Value::real(1.0)).unwrap();
        for i in 0..7 {
            out.set_data(i as f64, true).unwrap();
        }
        let reader = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            inp.get_last_data(true).unwrap()
        });
        out.set_sync_timeout_duration(Some(Duration::from_secs(5)));
        out.set_data(7.0, true).unwrap();
        assert_eq!(reader.join().unwrap(), 0.0);
    }

    #[test]
    fn test_peer_detach_releases_reader() {
        let (mut out, mut inp) = pair();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            out.detach();
        });
        assert!(matches!(inp.get_last_data(true), Err(IslError::Terminated)));
        handle.join().unwrap();
    }

    #[test]
    fn test_store_data() {
        let mut io = io("s", Causality::Output, SignalType::Real);
        assert!(matches!(io.store_data(0.0), Err(IslError::StoreDisabled)));
        io.use_store(true);
        io.set_value(Value::real(2.0)).unwrap();
        io.store_data(0.0).unwrap();
        assert!(matches!(io.store_data(0.0), Err(IslError::AlreadyStored(_))));
        assert_eq!(io.store().len(), 1);
    }

    #[test]
    fn test_store_persisted_and_restored() {
        let path = std::env::temp_dir().join(format!("isl_io_store_{}.json", std::process::id()));
        let mut io = io("s", Causality::Output, SignalType::Real);
        io.use_store(true);
        for (t, v) in [(0.0, 1.0), (0.5, 2.0), (1.0, 3.0)] {
            io.set_value(Value::real(v)).unwrap();
            io.store_data(t).unwrap();
        }
        io.save_store(&path).unwrap();
        io.clear_store();
        assert!(io.store().is_empty());
        assert!(matches!(io.get_stored_data(0.7), Err(IslError::NoData(_))));

        io.load_store(&path).unwrap();
        assert_eq!(io.store().len(), 3);
        assert_eq!(io.get_stored_data(0.7).unwrap(), 0.5);
        assert_eq!(io.value(), &Value::real(2.0));

        // a series of another type is refused and the store kept
        let mut other = self::io("i", Causality::Output, SignalType::Integer);
        assert!(matches!(other.load_store(&path), Err(IslError::TypeMismatch { .. })));
        assert!(other.store().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_mem_and_indexed_access() {
        let (mut out, mut inp) = pair();
        out.set_value(Value::real(5.0)).unwrap();
        out.set_data(1.0, false).unwrap();

        assert_eq!(inp.get_mem_data(0).unwrap(), (1.0, 1.0));
        assert_eq!(inp.fifo_reader_index(0), Some(0));
        assert!(inp.get_mem_data(8).is_err());

        out.set_value(Value::real(6.0)).unwrap();
        out.set_data_at(4.0, 0).unwrap();
        // writer at 1, slot 2 rewritten; reader cursor at 0 sees it at +1
        assert_eq!(inp.get_data_at(1).unwrap(), 4.0);
        assert_eq!(inp.value(), &Value::real(6.0));
        assert_eq!(out.fifo_writer_index(), Some(1));
        assert_eq!(out.fifo_readers(), 1);
    }

    #[test]
    fn test_settings_locked_while_connected() {
        let (mut out, _inp) = pair();
        assert!(out.set_fifo_depth(4).is_err());
        assert!(out.set_connect_id("other").is_err());
    }
}
