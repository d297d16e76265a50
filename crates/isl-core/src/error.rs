//! Error types and flat status codes

use thiserror::Error;

use crate::SignalType;

/// Core ISL errors
#[derive(Error, Debug)]
pub enum IslError {
    // Precondition errors
    #[error("No connector")]
    NoConnector,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Missing identifier: a name or a configuration file is required")]
    MissingIdentifier,

    // Configuration errors
    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Save error: {0}")]
    SaveError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    // Registry errors
    #[error("IO already exists: {0}")]
    DuplicateIo(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Transfer errors
    #[error("Unsupported type: {0:?}")]
    UnsupportedType(SignalType),

    #[error("Type mismatch: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        expected: SignalType,
        actual: SignalType,
    },

    #[error("Size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Index out of range: {0}")]
    IndexOutOfRange(i32),

    #[error("IO not connected: {0}")]
    NotConnected(String),

    #[error("FIFO full")]
    FifoFull,

    #[error("FIFO empty")]
    FifoEmpty,

    #[error("No data available for time {0}")]
    NoData(f64),

    // Synchronization
    #[error("Synchronization timeout")]
    SyncTimeout,

    #[error("Session terminated")]
    Terminated,

    // Store
    #[error("Store not enabled")]
    StoreDisabled,

    #[error("Already stored at time {0}")]
    AlreadyStored(f64),

    // Session errors
    #[error("Session create failed (code {code}): {reason}")]
    SessionCreateError { code: i32, reason: String },

    #[error("Connect timeout after {0}s")]
    ConnectTimeout(u32),

    // Resource errors
    #[error("Allocation failed: {0}")]
    AllocationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ISL operations
pub type IslResult<T> = Result<T, IslError>;

/// Flat status codes returned across the C boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// Success
    Ok = 0,
    /// Null handle or no connector
    NullHandle = -1,
    /// Store not enabled on this IO
    StoreDisabled = -2,
    /// Value already stored (non-fatal)
    AlreadyStored = -3,
    InvalidState = -4,
    MissingIdentifier = -5,
    LoadError = -6,
    SaveError = -7,
    ValidationError = -8,
    InvalidSessionId = -9,
    DuplicateIo = -10,
    NotFound = -11,
    UnsupportedType = -12,
    TypeMismatch = -13,
    SizeMismatch = -14,
    IndexOutOfRange = -15,
    NotConnected = -16,
    FifoFull = -17,
    FifoEmpty = -18,
    NoData = -19,
    SyncTimeout = -20,
    Terminated = -21,
    SessionCreateError = -22,
    ConnectTimeout = -23,
    AllocationError = -24,
    IoError = -25,
    InvalidArgument = -26,
}

impl From<StatusCode> for i32 {
    fn from(code: StatusCode) -> Self {
        code as i32
    }
}

impl IslError {
    /// Flat status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            IslError::NoConnector => StatusCode::NullHandle,
            IslError::InvalidState(_) => StatusCode::InvalidState,
            IslError::MissingIdentifier => StatusCode::MissingIdentifier,
            IslError::LoadError(_) => StatusCode::LoadError,
            IslError::SaveError(_) => StatusCode::SaveError,
            IslError::ValidationError(_) => StatusCode::ValidationError,
            IslError::InvalidSessionId(_) => StatusCode::InvalidSessionId,
            IslError::DuplicateIo(_) => StatusCode::DuplicateIo,
            IslError::NotFound(_) => StatusCode::NotFound,
            IslError::UnsupportedType(_) => StatusCode::UnsupportedType,
            IslError::TypeMismatch { .. } => StatusCode::TypeMismatch,
            IslError::SizeMismatch { .. } => StatusCode::SizeMismatch,
            IslError::IndexOutOfRange(_) => StatusCode::IndexOutOfRange,
            IslError::NotConnected(_) => StatusCode::NotConnected,
            IslError::FifoFull => StatusCode::FifoFull,
            IslError::FifoEmpty => StatusCode::FifoEmpty,
            IslError::NoData(_) => StatusCode::NoData,
            IslError::SyncTimeout => StatusCode::SyncTimeout,
            IslError::Terminated => StatusCode::Terminated,
            IslError::StoreDisabled => StatusCode::StoreDisabled,
            IslError::AlreadyStored(_) => StatusCode::AlreadyStored,
            IslError::SessionCreateError { .. } => StatusCode::SessionCreateError,
            IslError::ConnectTimeout(_) => StatusCode::ConnectTimeout,
            IslError::AllocationError(_) => StatusCode::AllocationError,
            IslError::Io(_) => StatusCode::IoError,
        }
    }

    /// Only allocation failures make a connector unusable
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, IslError::AllocationError(_))
    }

    /// Timeouts and termination are expected near the end of a session
    pub fn is_sync_failure(&self) -> bool {
        matches!(self, IslError::SyncTimeout | IslError::Terminated)
    }
}

/// Convert a result into a flat status code
pub fn result_to_status<T>(result: &IslResult<T>) -> i32 {
    match result {
        Ok(_) => StatusCode::Ok.into(),
        Err(e) => e.status().into(),
    }
}

/// `AlreadyStored` is reported as success to store callers
pub fn status_is_success(code: i32) -> bool {
    code == StatusCode::Ok as i32 || code == StatusCode::AlreadyStored as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_codes() {
        assert_eq!(IslError::StoreDisabled.status() as i32, -2);
        assert_eq!(IslError::AlreadyStored(1.0).status() as i32, -3);
        assert!(status_is_success(0));
        assert!(status_is_success(-3));
        assert!(!status_is_success(-2));
    }

    #[test]
    fn test_recoverable() {
        assert!(IslError::SyncTimeout.is_recoverable());
        assert!(IslError::SyncTimeout.is_sync_failure());
        assert!(!IslError::AllocationError("handle".into()).is_recoverable());
    }

    #[test]
    fn test_result_to_status() {
        let ok: IslResult<()> = Ok(());
        assert_eq!(result_to_status(&ok), 0);

        let err: IslResult<()> = Err(IslError::NoConnector);
        assert_eq!(result_to_status(&err), -1);
    }
}
