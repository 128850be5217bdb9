//! Top-level error types for voicetodo
//!
//! Only infrastructure problems are errors. Denied and failed tool calls
//! are reported as [`crate::ToolCallOutcome`] values.

use thiserror::Error;

use crate::config::ConfigError;
use crate::permission::{PermissionError, PermissionStoreError};
use crate::types::ArgumentError;

/// Top-level error type for voicetodo operations
///
/// - [`Error::Storage`] - Permission storage unavailable; retry or re-init
/// - [`Error::ConsistencyFault`] - Stored permissions diverged; UI should re-sync
/// - [`Error::Config`] - Fix configuration
/// - [`Error::InvalidArguments`] - Agent produced malformed tool arguments
#[derive(Debug, Error)]
pub enum Error {
    /// Permission store failed to read or write
    #[error("storage error: {0}")]
    Storage(String),

    /// Persisted permissions differ from what was written
    #[error("permission consistency fault: {0}")]
    ConsistencyFault(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool arguments could not be converted
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl Error {
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, Self::ConsistencyFault(_))
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<PermissionStoreError> for Error {
    fn from(err: PermissionStoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<PermissionError> for Error {
    fn from(err: PermissionError) -> Self {
        match err {
            PermissionError::Store(e) => e.into(),
            fault @ PermissionError::ConsistencyFault { .. } => {
                Self::ConsistencyFault(fault.to_string())
            }
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<ArgumentError> for Error {
    fn from(err: ArgumentError) -> Self {
        Self::InvalidArguments(err.to_string())
    }
}

/// Result type for voicetodo operations
pub type Result<T> = std::result::Result<T, Error>;
