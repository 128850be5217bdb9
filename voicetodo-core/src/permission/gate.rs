//! Always-allow gate.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::store::{MemoryPermissionStore, PermissionStore, PermissionStoreError};

/// Errors from permission gate operations.
#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] PermissionStoreError),

    /// The store does not hold what was just written to it.
    ///
    /// The gate has already re-synced its in-memory set to `stored`.
    #[error("Permission store out of sync: wrote {expected:?}, read back {stored:?}")]
    ConsistencyFault {
        /// Set that was written
        expected: BTreeSet<String>,
        /// Set the store returned afterwards
        stored: BTreeSet<String>,
    },
}

/// Decides whether a tool may run without interactive approval.
///
/// The gate owns the in-memory always-allowed set. Lookups never touch the
/// store. Every mutation persists the new set, reads it back and adopts
/// whatever the store returned.
///
/// # Example
///
/// ```rust
/// use voicetodo_core::permission::PermissionGate;
///
/// # tokio_test::block_on(async {
/// let gate = PermissionGate::in_memory();
/// gate.init().await.unwrap();
///
/// gate.set_always_allowed("addTodo", true).await.unwrap();
/// assert!(gate.is_always_allowed("addTodo"));
/// # });
/// ```
pub struct PermissionGate {
    store: Box<dyn PermissionStore>,
    allowed: RwLock<BTreeSet<String>>,
    /// Serializes read-modify-persist-reread sequences
    write_lock: Mutex<()>,
    initialized: AtomicBool,
}

impl PermissionGate {
    /// Create a gate backed by the given store.
    ///
    /// Call [`PermissionGate::init`] before first use.
    pub fn new(store: impl PermissionStore + 'static) -> Self {
        Self::with_boxed_store(Box::new(store))
    }

    /// Create a gate with a boxed store.
    pub fn with_boxed_store(store: Box<dyn PermissionStore>) -> Self {
        Self {
            store,
            allowed: RwLock::new(BTreeSet::new()),
            write_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    /// Create a gate with an in-memory store.
    pub fn in_memory() -> Self {
        Self::new(MemoryPermissionStore::new())
    }

    /// Load the always-allowed set from the store.
    ///
    /// Calling this again reloads from the store.
    pub async fn init(&self) -> Result<(), PermissionError> {
        let _guard = self.write_lock.lock().await;
        let loaded = self.store.load().await?;
        log::debug!("Loaded {} always-allowed tools", loaded.len());
        *self.allowed.write() = loaded;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether [`PermissionGate::init`] has completed at least once.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Check whether a tool may run without asking.
    pub fn is_always_allowed(&self, tool_name: &str) -> bool {
        self.allowed.read().contains(tool_name)
    }

    /// Snapshot of the always-allowed set.
    pub fn always_allowed(&self) -> BTreeSet<String> {
        self.allowed.read().clone()
    }

    /// Grant or revoke always-allow for a tool.
    ///
    /// The new set is persisted and then read back. If the store returns
    /// something other than what was written, the in-memory set adopts the
    /// stored value and [`PermissionError::ConsistencyFault`] is returned.
    /// If writing or reading back fails, the in-memory set is unchanged.
    pub async fn set_always_allowed(
        &self,
        tool_name: &str,
        allowed: bool,
    ) -> Result<(), PermissionError> {
        let _guard = self.write_lock.lock().await;

        let mut updated = self.allowed.read().clone();
        if allowed {
            updated.insert(tool_name.to_string());
        } else {
            updated.remove(tool_name);
        }

        self.commit(updated).await?;
        log::debug!(
            "Tool '{}' always-allowed set to {}",
            tool_name,
            allowed
        );
        Ok(())
    }

    /// Revoke always-allow for every tool.
    pub async fn clear_all(&self) -> Result<(), PermissionError> {
        let _guard = self.write_lock.lock().await;
        self.store.save(&BTreeSet::new()).await?;
        self.allowed.write().clear();
        log::debug!("Cleared all always-allowed tools");
        Ok(())
    }

    /// Persist `updated`, re-read and adopt the stored set.
    ///
    /// Caller must hold `write_lock`.
    async fn commit(&self, updated: BTreeSet<String>) -> Result<(), PermissionError> {
        self.store.save(&updated).await?;
        let stored = self.store.load().await?;

        let drifted = stored != updated;
        *self.allowed.write() = stored.clone();

        if drifted {
            log::error!(
                "Permission store drift: wrote {:?}, read back {:?}",
                updated,
                stored
            );
            return Err(PermissionError::ConsistencyFault {
                expected: updated,
                stored,
            });
        }
        Ok(())
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::in_memory()
    }
}
