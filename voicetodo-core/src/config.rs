//! Pipeline configuration
//!
//! Loaded from a JSON file such as:
//!
//! ```json
//! {
//!   "retry": { "max_retries": 3, "base_delay_ms": 1000 },
//!   "permissions_path": "/data/voicetodo/permissions.json"
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::permission::FilePermissionStore;
use crate::retry::RetryConfig;

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings for the tool-call pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Retry behavior for tool actions
    pub retry: RetryConfig,
    /// Where always-allow decisions are stored.
    ///
    /// Defaults to [`FilePermissionStore::default_path`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Parse configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry.max_delay_ms ({}) is less than retry.base_delay_ms ({})",
                self.retry.max_delay_ms, self.retry.base_delay_ms
            )));
        }
        Ok(())
    }

    /// Resolved path of the permission file
    pub fn permissions_path(&self) -> PathBuf {
        self.permissions_path
            .clone()
            .unwrap_or_else(FilePermissionStore::default_path)
    }

    /// File store at the configured path
    pub fn permission_store(&self) -> FilePermissionStore {
        FilePermissionStore::new(self.permissions_path())
    }
}

/// Load pipeline configuration from a JSON file
pub async fn load_config_file(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    PipelineConfig::from_json_str(&content)
}
