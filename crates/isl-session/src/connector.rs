//! Connector - one participant's handle to a co-simulation session
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized --new/load--> Configured --check--> Checked
//!      Checked --create--> SessionCreated --connect--> Connected
//!      SessionCreated | Connected --disconnect--> Checked
//! ```
//!
//! Setters drop a checked connector back to `Configured` and are refused
//! once a session exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use isl_core::log::msg;
use isl_core::{
    generate_uuid, timeout_from_secs, Causality, ConnectorUid, IslError, IslResult,
    SessionId, SignalType, TypeTag, EVENT_STEP,
};
use isl_data::{CheckContext, Io, IoLimits, Termination};

use crate::config::{ConnectorFile, Cosimulation, Information, Variable, VariableType, CONFIG_EXTENSION};
use crate::hub::{Hub, ModelEntry, StopKey};
use crate::listener::{Mode, SharedMode, StopListener};
use crate::sims::SimSlot;

/// Connector lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectorState {
    Uninitialized,
    Configured,
    Checked,
    SessionCreated,
    Connected,
}

impl ConnectorState {
    /// Whether a session scope exists
    #[inline]
    pub fn has_session(self) -> bool {
        matches!(self, ConnectorState::SessionCreated | ConnectorState::Connected)
    }
}

/// Default simulated span and step of a new connector
const DEFAULT_END_TIME: f64 = 10.0;
const DEFAULT_STEP: f64 = 1.0;

/// A participant
pub struct Connector {
    hub: Arc<Hub>,
    is_owner: bool,
    state: ConnectorState,
    name: String,
    id: String,
    uid: ConnectorUid,
    type_tag: TypeTag,
    session: Option<SessionId>,
    file: Option<PathBuf>,
    pid: u32,
    start_time: f64,
    end_time: f64,
    step_size: f64,
    step_tolerance: f64,
    connect_timeout: i32,
    viewer: bool,
    mode: Arc<SharedMode>,
    termination: Arc<Termination>,
    ios: Vec<Io>,
    connected_at: Option<Instant>,
    listener: Option<StopListener>,
    // What `open_session` registered in the hub, undone by `close_session`
    model_registered: bool,
    sim_registered: bool,
}

impl Connector {
    /// Create an empty connector; `is_owner` makes it the session owner of its model
    pub fn new(hub: &Arc<Hub>, is_owner: bool) -> Self {
        let termination = Termination::new();
        // No session yet
        termination.set(true);
        Connector {
            hub: Arc::clone(hub),
            is_owner,
            state: ConnectorState::Uninitialized,
            name: String::new(),
            id: String::new(),
            uid: ConnectorUid::ZERO,
            type_tag: TypeTag::default(),
            session: None,
            file: None,
            pid: std::process::id(),
            start_time: 0.0,
            end_time: 0.0,
            step_size: 0.0,
            step_tolerance: hub.settings().step_tolerance,
            connect_timeout: 0,
            viewer: false,
            mode: Arc::new(SharedMode::default()),
            termination,
            ios: Vec::new(),
            connected_at: None,
            listener: None,
            model_registered: false,
            sim_registered: false,
        }
    }

    fn limits(&self) -> IoLimits {
        IoLimits::from_settings(self.hub.settings())
    }

    fn accepts_configuration(&self) -> bool {
        if matches!(self.state, ConnectorState::Uninitialized | ConnectorState::Configured) {
            return true;
        }
        tracing::warn!(
            msg_id = msg::CONNECTOR_ALREADY_CONFIGURED,
            connector = %self.name,
            state = ?self.state,
            "connector already configured"
        );
        false
    }

    /// Start a fresh configuration named `name`
    ///
    /// A connector past `Configured` is left as is.
    pub fn new_model(&mut self, name: &str) -> IslResult<()> {
        if !self.accepts_configuration() {
            return Ok(());
        }
        if name.is_empty() {
            tracing::error!(msg_id = msg::CONNECTOR_NAME_REQUIRED, "connector name required");
            return Err(IslError::MissingIdentifier);
        }
        self.ios.clear();
        self.name = name.to_string();
        self.id = generate_uuid();
        self.uid = ConnectorUid::from_id(&self.id);
        self.type_tag = TypeTag::ISL;
        self.file = None;
        self.start_time = 0.0;
        self.end_time = DEFAULT_END_TIME;
        self.step_size = DEFAULT_STEP;
        self.step_tolerance = self.hub.settings().step_tolerance;
        self.state = ConnectorState::Configured;
        tracing::info!(msg_id = msg::CONNECTOR_NEW, connector = %self.name, id = %self.id, "connector created");
        Ok(())
    }

    /// Load a configuration file and declare its IOs
    ///
    /// Nothing changes when the file cannot be read or is invalid.
    pub fn load(&mut self, path: impl AsRef<Path>) -> IslResult<()> {
        if !self.accepts_configuration() {
            return Ok(());
        }
        let path = path.as_ref();
        let result = ConnectorFile::read(path).and_then(|doc| self.build_ios(&doc).map(|ios| (doc, ios)));
        let (doc, ios) = match result {
            Ok(loaded) => loaded,
            Err(e) => {
                tracing::error!(msg_id = msg::CONNECTOR_LOAD_FAILED, path = %path.display(), "load failed: {}", e);
                return Err(e);
            }
        };
        let session = if doc.cosimulation.session.is_empty() {
            None
        } else {
            Some(SessionId::parse(&doc.cosimulation.session)?)
        };

        let info = &doc.information;
        self.name = if info.name.is_empty() {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            info.name.clone()
        };
        self.id = if info.id.is_empty() { generate_uuid() } else { info.id.clone() };
        self.uid = ConnectorUid::from_id(&self.id);
        self.type_tag = TypeTag::from_str_tag(&info.type_tag);
        if session.is_some() {
            self.session = session;
        }

        let cosim = &doc.cosimulation;
        self.connect_timeout = cosim.connect_timeout;
        self.start_time = cosim.start_time;
        self.end_time = cosim.end_time;
        self.step_size = if cosim.step_size == 0.0 { DEFAULT_STEP } else { cosim.step_size };
        self.step_tolerance = if cosim.step_tolerance == 0.0 {
            self.hub.settings().step_tolerance
        } else {
            cosim.step_tolerance
        };
        self.ios = ios;
        self.file = Some(path.to_path_buf());
        self.state = ConnectorState::Configured;
        tracing::info!(
            msg_id = msg::CONNECTOR_LOAD,
            connector = %self.name,
            path = %path.display(),
            ios = self.ios.len(),
            "configuration loaded"
        );
        Ok(())
    }

    fn build_ios(&self, doc: &ConnectorFile) -> IslResult<Vec<Io>> {
        if doc.variables.is_empty() {
            return Err(IslError::LoadError("no variables declared".into()));
        }
        let mut ios: Vec<Io> = Vec::with_capacity(doc.variables.len());
        for var in &doc.variables {
            if ios.iter().any(|io| io.id() == var.id) {
                return Err(IslError::DuplicateIo(var.id.clone()));
            }
            let mut io = Io::new(
                var.id.clone(),
                var.causality,
                var.kind.kind,
                var.kind.size,
                self.limits(),
                Arc::clone(&self.termination),
            )?;
            if !var.name.is_empty() {
                io.set_name(var.name.clone());
            }
            io.set_connect_id(var.connect_id.clone())?;
            io.set_step_size(if var.step_size == 0.0 { EVENT_STEP } else { var.step_size });
            io.use_store(var.store);
            io.set_sync_timeout_duration(
                (var.sync_timeout > 0.0).then(|| Duration::from_secs_f64(var.sync_timeout)),
            );
            if let Some(depth) = var.fifo_depth {
                io.set_fifo_depth(depth)?;
            }
            io.set_initial_str(&var.kind.initial_value)?;
            ios.push(io);
        }
        Ok(ios)
    }

    fn to_file(&self) -> ConnectorFile {
        ConnectorFile {
            information: Information {
                name: self.name.clone(),
                id: self.id.clone(),
                type_tag: self.type_tag.as_string(),
            },
            cosimulation: Cosimulation {
                session: self.session.as_ref().map(|s| s.to_string()).unwrap_or_default(),
                connect_timeout: self.connect_timeout,
                start_time: self.start_time,
                end_time: self.end_time,
                step_size: self.step_size,
                step_tolerance: self.step_tolerance,
            },
            variables: self
                .ios
                .iter()
                .map(|io| Variable {
                    id: io.id().to_string(),
                    name: io.name().to_string(),
                    connect_id: io.connect_id().to_string(),
                    causality: io.causality(),
                    step_size: io.step_size(),
                    store: io.is_store_used(),
                    sync_timeout: io.sync_timeout().map_or(-1.0, |t| t.as_secs_f64()),
                    fifo_depth: Some(io.fifo_depth()),
                    kind: VariableType {
                        kind: io.signal_type(),
                        size: io.size(),
                        initial_value: io.initial_value().to_initial_string(),
                    },
                })
                .collect(),
        }
    }

    /// Write the configuration
    ///
    /// Without `path` the recorded file is used, else `<name>.json`.
    pub fn save(&mut self, path: Option<&Path>) -> IslResult<()> {
        if self.state == ConnectorState::Configured {
            self.check()?;
        }
        let target = match (path, &self.file) {
            (Some(p), _) => p.to_path_buf(),
            (None, Some(f)) => f.clone(),
            (None, None) if !self.name.is_empty() => {
                let p = PathBuf::from(format!("{}.{}", self.name, CONFIG_EXTENSION));
                tracing::debug!(msg_id = msg::CONNECTOR_SAVE_DEFAULT_NAME, path = %p.display(), "saving under connector name");
                p
            }
            (None, None) => return Err(IslError::MissingIdentifier),
        };
        self.to_file().write(&target)?;
        tracing::info!(msg_id = msg::CONNECTOR_SAVE, connector = %self.name, path = %target.display(), "configuration saved");
        self.file = Some(target);
        Ok(())
    }

    /// Validate the configuration and resolve defaults
    pub fn check(&mut self) -> IslResult<()> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        match self.run_check() {
            Ok(()) => {
                self.state = ConnectorState::Checked;
                tracing::debug!(msg_id = msg::CONNECTOR_CHECK, connector = %self.name, "configuration checked");
                Ok(())
            }
            Err(e) => {
                tracing::error!(msg_id = msg::CONNECTOR_CHECK_FAILED, connector = %self.name, "check failed: {}", e);
                Err(e)
            }
        }
    }

    fn run_check(&mut self) -> IslResult<()> {
        if self.name.is_empty() {
            return Err(IslError::MissingIdentifier);
        }
        if self.id.is_empty() {
            self.id = generate_uuid();
        }
        self.uid = ConnectorUid::from_id(&self.id);
        if self.type_tag.is_unset() {
            self.type_tag = TypeTag::ISL;
        }
        if self.connect_timeout < 0 {
            self.connect_timeout = 0;
        }

        if self.step_size == EVENT_STEP {
            tracing::debug!(msg_id = msg::CONNECTOR_CHECK_EVENT_MODE, connector = %self.name, "event mode");
        } else {
            if self.start_time < 0.0 || self.end_time < 0.0 || self.step_size < 0.0 {
                return Err(IslError::ValidationError(
                    "start time, end time and step size must not be negative".into(),
                ));
            }
            if self.start_time >= self.end_time {
                return Err(IslError::ValidationError(format!(
                    "start time {} not before end time {}",
                    self.start_time, self.end_time
                )));
            }
            if self.step_size >= self.end_time - self.start_time {
                return Err(IslError::ValidationError(format!(
                    "step size {} not smaller than the simulated span",
                    self.step_size
                )));
            }
        }
        if self.step_tolerance <= 0.0 || self.step_tolerance >= 1.0 {
            tracing::warn!(
                msg_id = msg::CONNECTOR_CHECK_WARNING,
                tolerance = self.step_tolerance,
                "step tolerance out of (0,1), using default"
            );
            self.step_tolerance = self.hub.settings().step_tolerance;
        }
        if self.ios.is_empty() {
            return Err(IslError::ValidationError("no io declared".into()));
        }

        let ctx = CheckContext {
            start_time: self.start_time,
            end_time: self.end_time,
            step_size: self.step_size,
            step_tolerance: self.step_tolerance,
            is_owner: self.is_owner,
        };
        for io in &mut self.ios {
            io.check(&ctx)?;
        }
        Ok(())
    }

    fn locked(&self) -> IslError {
        tracing::warn!(
            msg_id = msg::CONNECTOR_LOCKED,
            connector = %self.name,
            state = ?self.state,
            "configuration locked by session"
        );
        IslError::InvalidState(format!("{:?}", self.state))
    }

    /// Gate for setters: refuse under a session, otherwise require a new check
    fn configure(&mut self) -> IslResult<()> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        self.state = ConnectorState::Configured;
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> IslResult<()> {
        if name.is_empty() {
            return Err(IslError::MissingIdentifier);
        }
        self.configure()?;
        self.name = name.to_string();
        Ok(())
    }

    pub fn set_id(&mut self, id: &str) -> IslResult<()> {
        self.configure()?;
        self.id = id.to_string();
        self.uid = ConnectorUid::from_id(id);
        Ok(())
    }

    pub fn set_type(&mut self, type_tag: &str) -> IslResult<()> {
        self.configure()?;
        self.type_tag = TypeTag::from_str_tag(type_tag);
        Ok(())
    }

    /// Seconds `connect(true)` waits for peers, 0 waits forever
    pub fn set_connect_timeout(&mut self, secs: i32) -> IslResult<()> {
        self.configure()?;
        self.connect_timeout = secs;
        Ok(())
    }

    pub fn set_start_time(&mut self, time: f64) -> IslResult<()> {
        self.configure()?;
        self.start_time = time;
        Ok(())
    }

    pub fn set_end_time(&mut self, time: f64) -> IslResult<()> {
        self.configure()?;
        self.end_time = time;
        Ok(())
    }

    /// Connector step; `-1` selects event mode
    pub fn set_step_size(&mut self, step: f64) -> IslResult<()> {
        self.configure()?;
        self.step_size = step;
        Ok(())
    }

    pub fn set_step_tolerance(&mut self, tolerance: f64) -> IslResult<()> {
        self.configure()?;
        self.step_tolerance = tolerance;
        Ok(())
    }

    /// Session to create or join; only before `create`
    pub fn set_session_id(&mut self, session: &str) -> IslResult<()> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        self.session = Some(SessionId::parse(session)?);
        Ok(())
    }

    /// Viewer connectors attach to every IO read-only
    pub fn set_viewer(&mut self, viewer: bool) -> IslResult<()> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        self.viewer = viewer;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode.set(mode);
    }

    pub fn mode(&self) -> Mode {
        self.mode.get()
    }

    /// Declare an IO
    pub fn new_io(
        &mut self,
        id: &str,
        causality: Causality,
        signal_type: SignalType,
        size: usize,
    ) -> IslResult<&mut Io> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        if self.io(id).is_some() {
            tracing::warn!(msg_id = msg::CONNECTOR_IO_REJECTED, io = id, "duplicate io id");
            return Err(IslError::DuplicateIo(id.to_string()));
        }
        let io = Io::new(id, causality, signal_type, size, self.limits(), Arc::clone(&self.termination))
            .map_err(|e| {
                tracing::warn!(msg_id = msg::CONNECTOR_IO_REJECTED, io = id, "io rejected: {}", e);
                e
            })?;
        self.configure()?;
        tracing::debug!(msg_id = msg::CONNECTOR_IO_ADDED, io = id, ?causality, %signal_type, size, "io declared");
        self.ios.push(io);
        let last = self.ios.len() - 1;
        Ok(&mut self.ios[last])
    }

    /// Remove an IO and release its buffers
    pub fn remove_io(&mut self, id: &str) -> IslResult<()> {
        if self.state.has_session() {
            return Err(self.locked());
        }
        let Some(index) = self.ios.iter().position(|io| io.id() == id) else {
            return Err(IslError::NotFound(id.to_string()));
        };
        self.configure()?;
        self.ios.remove(index);
        tracing::debug!(msg_id = msg::CONNECTOR_IO_REMOVED, io = id, "io removed");
        Ok(())
    }

    pub fn io(&self, id: &str) -> Option<&Io> {
        self.ios.iter().find(|io| io.id() == id)
    }

    pub fn io_mut(&mut self, id: &str) -> Option<&mut Io> {
        self.ios.iter_mut().find(|io| io.id() == id)
    }

    /// IO by position among all IOs
    pub fn io_at(&self, index: usize) -> Option<&Io> {
        self.ios.get(index)
    }

    pub fn io_at_mut(&mut self, index: usize) -> Option<&mut Io> {
        self.ios.get_mut(index)
    }

    /// Input by position among inputs
    pub fn input(&self, index: usize) -> Option<&Io> {
        self.inputs().nth(index)
    }

    /// Output by position among outputs
    pub fn output(&self, index: usize) -> Option<&Io> {
        self.outputs().nth(index)
    }

    pub fn ios(&self) -> impl Iterator<Item = &Io> {
        self.ios.iter()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Io> {
        self.ios.iter().filter(|io| io.is_input())
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Io> {
        self.ios.iter().filter(|io| io.is_output())
    }

    pub fn nb_ios(&self) -> usize {
        self.ios.len()
    }

    pub fn nb_inputs(&self) -> usize {
        self.inputs().count()
    }

    pub fn nb_outputs(&self) -> usize {
        self.outputs().count()
    }

    /// Open the session scope and publish the outputs
    ///
    /// `session` replaces the configured session id when given.
    pub fn create(&mut self, session: Option<&str>) -> IslResult<()> {
        if let Some(session) = session {
            self.set_session_id(session)?;
        }
        if matches!(self.state, ConnectorState::Uninitialized | ConnectorState::Configured) {
            self.check()?;
        }
        if self.state != ConnectorState::Checked {
            return Err(IslError::InvalidState(format!("{:?}", self.state)));
        }
        let session = match &self.session {
            Some(s) => s.to_string(),
            None => return Err(IslError::InvalidSessionId(String::new())),
        };
        self.pid = std::process::id();

        if self.viewer {
            self.termination.set(false);
            self.state = ConnectorState::SessionCreated;
            tracing::info!(msg_id = msg::CONNECTOR_CREATE_VIEWER, connector = %self.name, %session, "viewer session created");
            return Ok(());
        }

        if let Err((code, reason)) = self.open_session(&session) {
            self.close_session(&session);
            tracing::error!(msg_id = msg::CONNECTOR_CREATE_FAILED, connector = %self.name, %session, code, "{}", reason);
            return Err(IslError::SessionCreateError { code, reason });
        }

        self.termination.set(false);
        self.state = ConnectorState::SessionCreated;
        tracing::info!(
            msg_id = msg::CONNECTOR_CREATE,
            connector = %self.name,
            %session,
            uid = %self.uid,
            outputs = self.nb_outputs(),
            "session created"
        );
        Ok(())
    }

    fn open_session(&mut self, session: &str) -> Result<(), (i32, String)> {
        if self.is_owner {
            let entry = ModelEntry {
                type_tag: self.type_tag,
                nb_ios: self.ios.len(),
                uuid: self.id.clone(),
                name: self.name.clone(),
                file: self
                    .file
                    .as_ref()
                    .map(|f| f.display().to_string())
                    .unwrap_or_default(),
            };
            self.hub
                .register_model(session, self.uid, entry)
                .map_err(|code| (code, format!("model {} already in session", self.id)))?;
            self.model_registered = true;
        } else if !self.hub.has_model(session, self.uid) {
            return Err((crate::hub::CREATE_NO_OWNER, format!("no owner for model {}", self.id)));
        }

        for io in self.ios.iter_mut().filter(|io| io.is_output()) {
            let channel = io
                .open_channel(self.start_time)
                .map_err(|e| (crate::hub::CREATE_CHANNEL_TAKEN, e.to_string()))?;
            self.hub
                .publish_channel(session, channel)
                .map_err(|code| (code, format!("connect id {} already published", io.connect_id())))?;
        }

        if self.is_owner {
            let slot = SimSlot {
                uid: self.uid,
                pid: self.pid,
                name: self.name.clone(),
                session: session.to_string(),
            };
            self.hub
                .add_sim(slot)
                .map_err(|code| (code, "simulations table full".to_string()))?;
            self.sim_registered = true;
        }
        Ok(())
    }

    /// Undo whatever `open_session` registered
    fn close_session(&mut self, session: &str) {
        if std::mem::take(&mut self.sim_registered) {
            self.hub.remove_sim(self.uid, session);
        }
        for io in &mut self.ios {
            let published = io.published_channel().cloned();
            io.detach();
            if let Some(channel) = published {
                self.hub.withdraw_channel(session, &channel);
            }
        }
        if std::mem::take(&mut self.model_registered) {
            self.hub.unregister_model(session, self.uid);
        }
    }

    /// Attach the inputs to the outputs published in the session
    ///
    /// Without `wait`, returns `Ok(false)` while a peer output is missing;
    /// inputs already attached stay attached. With `wait`, polls until every
    /// input is attached or the connect timeout elapses.
    pub fn connect(&mut self, wait: bool) -> IslResult<bool> {
        if self.state != ConnectorState::SessionCreated {
            return Err(IslError::InvalidState(format!("{:?}", self.state)));
        }
        let session = self.session_name();
        let poll = self.hub.settings().connect_poll_interval;
        let deadline = timeout_from_secs(self.connect_timeout).map(|t| Instant::now() + t);
        let mut waiting_logged = false;

        loop {
            match self.attach_pending(&session) {
                Ok(None) => break,
                Ok(Some(missing)) => {
                    if !wait {
                        tracing::debug!(msg_id = msg::CONNECTOR_CONNECT_WAITING, connector = %self.name, io = %missing, "peer not published yet");
                        return Ok(false);
                    }
                    if !waiting_logged {
                        tracing::info!(msg_id = msg::CONNECTOR_CONNECT_WAITING, connector = %self.name, io = %missing, "waiting for peer");
                        waiting_logged = true;
                    }
                }
                Err(e) => {
                    tracing::error!(msg_id = msg::CONNECTOR_CONNECT_FAILED, connector = %self.name, "connect failed: {}", e);
                    return Err(e);
                }
            }
            if self.termination.is_set() {
                return Err(IslError::Terminated);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                tracing::error!(
                    msg_id = msg::CONNECTOR_CONNECT_FAILED,
                    connector = %self.name,
                    timeout = self.connect_timeout,
                    "connect timed out"
                );
                return Err(IslError::ConnectTimeout(self.connect_timeout.max(0) as u32));
            }
            thread::sleep(poll);
        }

        self.connected_at = Some(Instant::now());
        self.state = ConnectorState::Connected;
        tracing::info!(msg_id = msg::CONNECTOR_CONNECT, connector = %self.name, %session, "connected");
        Ok(true)
    }

    /// Attach every unattached IO that can be; returns the first one still missing
    fn attach_pending(&mut self, session: &str) -> IslResult<Option<String>> {
        let mut missing = None;
        for io in &mut self.ios {
            if io.is_connected() || (!self.viewer && !io.is_input()) {
                continue;
            }
            match self.hub.find_channel(session, io.connect_id()) {
                Some(channel) if self.viewer => io.attach_viewer(channel)?,
                Some(channel) => io.attach_reader(channel)?,
                None => {
                    if missing.is_none() {
                        missing = Some(io.id().to_string());
                    }
                }
            }
        }
        Ok(missing)
    }

    /// Leave the session and release every waiter on its channels
    pub fn disconnect(&mut self) -> IslResult<()> {
        if !self.state.has_session() {
            tracing::warn!(msg_id = msg::CONNECTOR_DISCONNECT_FAILED, connector = %self.name, state = ?self.state, "not connected");
            return Err(IslError::NotConnected(self.name.clone()));
        }
        if let Some(at) = self.connected_at.take() {
            tracing::info!(
                msg_id = msg::CONNECTOR_ELAPSED,
                connector = %self.name,
                elapsed = %humantime::format_duration(at.elapsed()),
                "session elapsed time"
            );
        }
        let session = self.session_name();
        if self.viewer {
            for io in &mut self.ios {
                io.detach();
            }
        } else {
            self.close_session(&session);
        }
        self.termination.set(true);
        self.state = ConnectorState::Checked;
        tracing::info!(msg_id = msg::CONNECTOR_DISCONNECT, connector = %self.name, %session, "disconnected");
        Ok(())
    }

    fn session_name(&self) -> String {
        self.session.as_ref().map(|s| s.to_string()).unwrap_or_default()
    }

    /// Start listening for a process-wide stop request
    pub fn start_stop_listener(&mut self) -> IslResult<()> {
        self.listen(StopKey::Global)
    }

    /// Start listening for a stop request addressed to this connector's session
    pub fn listen_to_exit_session(&mut self) -> IslResult<()> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| IslError::InvalidSessionId(String::new()))?
            .to_string();
        self.listen(StopKey::Session(session))
    }

    fn listen(&mut self, key: StopKey) -> IslResult<()> {
        if self.listener.as_ref().is_some_and(|l| !l.is_finished()) {
            return Err(IslError::InvalidState("listener already running".into()));
        }
        // Join a finished listener before replacing it
        self.listener = None;
        let listener = StopListener::spawn(
            &self.hub,
            key,
            Arc::clone(&self.mode),
            Arc::clone(&self.termination),
        )?;
        self.listener = Some(listener);
        Ok(())
    }

    /// Ask the listeners of this connector's session to stop
    pub fn send_stop_session(&self) -> bool {
        match &self.session {
            Some(s) => self.hub.send_stop_session(s.as_str()),
            None => false,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.termination.is_set()
    }

    /// Set the terminated flag; raising it releases every blocked exchange
    pub fn set_terminated(&self, terminated: bool) {
        if terminated {
            tracing::info!(msg_id = msg::CONNECTOR_TERMINATED, connector = %self.name, "terminated");
        }
        self.termination.set(terminated);
    }

    /// Shared flag, for threads that must stop this connector
    pub fn termination(&self) -> Arc<Termination> {
        Arc::clone(&self.termination)
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    pub fn is_viewer(&self) -> bool {
        self.viewer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn uid(&self) -> ConnectorUid {
        self.uid
    }

    pub fn type_tag(&self) -> TypeTag {
        self.type_tag
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn step_tolerance(&self) -> f64 {
        self.step_tolerance
    }

    pub fn connect_timeout(&self) -> i32 {
        self.connect_timeout
    }
}

impl Drop for Connector {
    fn drop(&mut self) {
        if self.state.has_session() {
            let _ = self.disconnect();
        }
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("name", &self.name)
            .field("uid", &self.uid)
            .field("state", &self.state)
            .field("session", &self.session)
            .field("ios", &self.ios.len())
            .finish()
    }
}
