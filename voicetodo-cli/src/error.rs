//! CLI-specific error types

use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    /// Pipeline setup or storage error
    #[error("voicetodo error: {0}")]
    Core(#[from] voicetodo_core::Error),

    /// IO error (stdout, terminal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<voicetodo_core::ConfigError> for CliError {
    fn from(err: voicetodo_core::ConfigError) -> Self {
        Self::Core(err.into())
    }
}
