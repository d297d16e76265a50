//! Logging setup and stable message ids
//!
//! Every event emitted by the engine carries a `msg_id` field taken from
//! [`msg`]. Ids are grouped by component so a log consumer can filter on
//! them without parsing message text.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter
pub const LOG_ENV: &str = "ISL_LOG";

/// Stable numeric message ids
pub mod msg {
    // Connector (1xxx)
    pub const CONNECTOR_NEW: u32 = 1001;
    pub const CONNECTOR_NAME_REQUIRED: u32 = 1002;
    pub const CONNECTOR_ALREADY_CONFIGURED: u32 = 1003;
    pub const CONNECTOR_LOAD: u32 = 1010;
    pub const CONNECTOR_LOAD_FAILED: u32 = 1011;
    pub const CONNECTOR_SAVE: u32 = 1020;
    pub const CONNECTOR_SAVE_DEFAULT_NAME: u32 = 1021;
    pub const CONNECTOR_CHECK: u32 = 1030;
    pub const CONNECTOR_CHECK_WARNING: u32 = 1031;
    pub const CONNECTOR_CHECK_FAILED: u32 = 1032;
    pub const CONNECTOR_CHECK_EVENT_MODE: u32 = 1033;
    pub const CONNECTOR_LOCKED: u32 = 1040;
    pub const CONNECTOR_CREATE: u32 = 1050;
    pub const CONNECTOR_CREATE_FAILED: u32 = 1051;
    pub const CONNECTOR_CREATE_VIEWER: u32 = 1052;
    pub const CONNECTOR_CONNECT: u32 = 1060;
    pub const CONNECTOR_CONNECT_FAILED: u32 = 1061;
    pub const CONNECTOR_CONNECT_WAITING: u32 = 1062;
    pub const CONNECTOR_DISCONNECT: u32 = 1070;
    pub const CONNECTOR_DISCONNECT_FAILED: u32 = 1071;
    pub const CONNECTOR_ELAPSED: u32 = 1072;
    pub const CONNECTOR_TERMINATED: u32 = 1080;
    pub const CONNECTOR_IO_ADDED: u32 = 1090;
    pub const CONNECTOR_IO_REMOVED: u32 = 1091;
    pub const CONNECTOR_IO_REJECTED: u32 = 1092;

    // Data exchange (2xxx)
    pub const DATA_CONNECTED: u32 = 2001;
    pub const DATA_NO_CONNECT_ID: u32 = 2002;
    pub const DATA_DISCONNECTED: u32 = 2003;
    pub const DATA_TYPE_MISMATCH: u32 = 2010;
    pub const DATA_SYNC_TIMEOUT: u32 = 2020;
    pub const DATA_TERMINATED: u32 = 2021;
    pub const DATA_STEP_IGNORED: u32 = 2030;
    pub const DATA_STORE_DUPLICATE: u32 = 2040;
    pub const DATA_STORE_FLUSH: u32 = 2041;

    // FIFO (3xxx)
    pub const FIFO_OVERWRITE: u32 = 3001;
    pub const FIFO_READER_LIMIT: u32 = 3002;
    pub const FIFO_NO_HISTORY: u32 = 3003;

    // Simulations table (4xxx)
    pub const SIMS_ADD: u32 = 4001;
    pub const SIMS_FULL: u32 = 4002;
    pub const SIMS_REMOVE: u32 = 4003;

    // Stop listener (5xxx)
    pub const LISTENER_START: u32 = 5001;
    pub const LISTENER_STOP_RECEIVED: u32 = 5002;
    pub const LISTENER_EXIT: u32 = 5003;
    pub const LISTENER_NO_TARGET: u32 = 5004;

    // Settings (6xxx)
    pub const SETTINGS_LOAD_FAILED: u32 = 6001;
    pub const SETTINGS_BAD_TOLERANCE: u32 = 6002;

    // C interface (7xxx)
    pub const FFI_NULL_HANDLE: u32 = 7001;
    pub const FFI_INVALID_ARGUMENT: u32 = 7002;
    pub const FFI_CALL_FAILED: u32 = 7003;
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install a human-readable subscriber; later calls are ignored
pub fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_thread_ids(true)
        .try_init();
}

/// Install a JSON subscriber; later calls are ignored
pub fn init_json_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter(default_level))
        .try_init();
}
