//! Always-allow permissions for tool execution.
//!
//! Tools the user approved with "always allow" run without an interactive
//! prompt. Everything else goes through the [`crate::approval`] channel.
//!
//! # Overview
//!
//! - **[`PermissionGate`]**: Owns the always-allowed set and mediates updates
//! - **[`PermissionStore`]**: Trait for persisting the set
//! - **[`MemoryPermissionStore`]**: In-memory store (cleared on exit)
//! - **[`FilePermissionStore`]**: JSON file store
//!
//! # Example
//!
//! ```rust
//! use voicetodo_core::permission::{MemoryPermissionStore, PermissionGate};
//!
//! # tokio_test::block_on(async {
//! let gate = PermissionGate::new(MemoryPermissionStore::with_tools(["listTodos"]));
//! gate.init().await.unwrap();
//!
//! assert!(gate.is_always_allowed("listTodos"));
//! assert!(!gate.is_always_allowed("deleteTodo"));
//!
//! gate.clear_all().await.unwrap();
//! assert!(!gate.is_always_allowed("listTodos"));
//! # });
//! ```

mod gate;
mod store;

pub use gate::{PermissionError, PermissionGate};
pub use store::{FilePermissionStore, MemoryPermissionStore, PermissionStore, PermissionStoreError};
