//! Permission storage trait and implementations.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Errors that can occur in permission store operations.
#[derive(Debug, thiserror::Error)]
pub enum PermissionStoreError {
    /// Failed to read permissions from storage.
    #[error("Failed to read permissions: {0}")]
    Read(String),

    /// Failed to write permissions to storage.
    #[error("Failed to write permissions: {0}")]
    Write(String),

    /// IO error during storage operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Trait for always-allowed tool storage.
///
/// The store persists the whole set of tool names at once. The gate
/// re-reads after every write, so implementations may be eventually
/// consistent but must not silently drop writes.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Load the set of always-allowed tool names.
    async fn load(&self) -> Result<BTreeSet<String>, PermissionStoreError>;

    /// Replace the stored set.
    async fn save(&self, tools: &BTreeSet<String>) -> Result<(), PermissionStoreError>;
}

#[async_trait]
impl<T: PermissionStore + ?Sized> PermissionStore for Arc<T> {
    async fn load(&self) -> Result<BTreeSet<String>, PermissionStoreError> {
        (**self).load().await
    }

    async fn save(&self, tools: &BTreeSet<String>) -> Result<(), PermissionStoreError> {
        (**self).save(tools).await
    }
}

/// In-memory permission store.
///
/// Permissions are cleared when the process exits. This is the default
/// store used by the invoker.
pub struct MemoryPermissionStore {
    tools: RwLock<BTreeSet<String>>,
}

impl MemoryPermissionStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(BTreeSet::new()),
        }
    }

    /// Create a store pre-seeded with always-allowed tools.
    pub fn with_tools<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: RwLock::new(tools.into_iter().map(Into::into).collect()),
        }
    }
}

impl Default for MemoryPermissionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for MemoryPermissionStore {
    async fn load(&self) -> Result<BTreeSet<String>, PermissionStoreError> {
        self.tools
            .read()
            .map(|tools| tools.clone())
            .map_err(|e| PermissionStoreError::Read(e.to_string()))
    }

    async fn save(&self, tools: &BTreeSet<String>) -> Result<(), PermissionStoreError> {
        let mut stored = self
            .tools
            .write()
            .map_err(|e| PermissionStoreError::Write(e.to_string()))?;
        *stored = tools.clone();
        Ok(())
    }
}

/// File-based permission store.
///
/// The set is persisted as a JSON array of tool names. The file is created
/// automatically on the first save.
pub struct FilePermissionStore {
    path: PathBuf,
}

impl FilePermissionStore {
    /// Create a new file-based store at the given path.
    ///
    /// The file does not need to exist - it will be created when
    /// the set is first saved.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<data dir>/voicetodo/permissions.json`.
    ///
    /// Falls back to the current directory when the platform has no data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voicetodo")
            .join("permissions.json")
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PermissionStore for FilePermissionStore {
    async fn load(&self) -> Result<BTreeSet<String>, PermissionStoreError> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeSet::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    async fn save(&self, tools: &BTreeSet<String>) -> Result<(), PermissionStoreError> {
        // Create parent directories if needed
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(tools)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryPermissionStore::new();

        // Initially empty
        assert!(store.load().await.unwrap().is_empty());

        store.save(&set(&["addTodo"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), set(&["addTodo"]));
    }

    #[tokio::test]
    async fn test_memory_store_save_replaces() {
        let store = MemoryPermissionStore::with_tools(["addTodo", "deleteTodo"]);
        assert_eq!(store.load().await.unwrap().len(), 2);

        store.save(&set(&["listTodos"])).await.unwrap();
        assert_eq!(store.load().await.unwrap(), set(&["listTodos"]));

        store.save(&BTreeSet::new()).await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_basic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("permissions.json");

        let store = FilePermissionStore::new(&path);

        // Initially empty (file doesn't exist)
        assert!(store.load().await.unwrap().is_empty());

        store.save(&set(&["addTodo", "updateTodo"])).await.unwrap();
        assert!(path.exists());

        // New store instance sees the persisted set
        let store2 = FilePermissionStore::new(&path);
        assert_eq!(
            store2.load().await.unwrap(),
            set(&["addTodo", "updateTodo"])
        );
    }

    #[tokio::test]
    async fn test_file_store_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/dir/permissions.json");

        let store = FilePermissionStore::new(&path);
        store.save(&set(&["addTodo"])).await.unwrap();

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_file_store_handles_empty_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("permissions.json");
        std::fs::write(&path, "  \n").unwrap();

        let store = FilePermissionStore::new(&path);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("permissions.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = FilePermissionStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, PermissionStoreError::Json(_)));
    }

    #[test]
    fn test_default_path_ends_with_app_file() {
        let path = FilePermissionStore::default_path();
        assert!(path.ends_with("voicetodo/permissions.json"));
    }
}
