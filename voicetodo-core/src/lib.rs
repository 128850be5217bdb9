//! # voicetodo-core
//!
//! The tool-call pipeline behind the voicetodo agent. When the model asks to
//! run a tool (`addTodo`, `deleteTodo`, ...) the call goes through:
//!
//! 1. **Permission**: tools in the always-allowed set run immediately.
//! 2. **Approval**: anything else is published on an [`ApprovalChannel`]
//!    and waits for a human to grant once, grant always, or deny.
//! 3. **Execution**: the action runs with retry. Transient failures
//!    (5xx, timeouts, connection errors) back off exponentially.
//!
//! The result is always a [`ToolCallOutcome`]: denial and exhausted retries
//! are outcomes, not errors.
//!
//! ## Quick Start
//!
//! ```rust
//! use voicetodo_core::{ToolArguments, ToolInvoker};
//!
//! # tokio_test::block_on(async {
//! let invoker = ToolInvoker::builder().build().await.unwrap();
//!
//! // Grant every request once
//! invoker.approvals().subscribe(|pending: &voicetodo_core::PendingApproval| {
//!     pending.respond(true);
//! });
//!
//! let outcome = invoker
//!     .invoke(
//!         "addTodo",
//!         ToolArguments::new().with("title", "Buy milk"),
//!         || async { Ok::<_, String>("Added 'Buy milk'".to_string()) },
//!     )
//!     .await;
//!
//! assert!(outcome.success);
//! assert_eq!(outcome.retry_count, 0);
//! # });
//! ```
//!
//! ## Configuration
//!
//! ```rust,no_run
//! use voicetodo_core::{config::load_config_file, ToolInvoker};
//!
//! # async fn example() -> voicetodo_core::Result<()> {
//! let config = load_config_file("voicetodo.json").await?;
//! let invoker = ToolInvoker::builder().with_config(config).build().await?;
//! # Ok(())
//! # }
//! ```

pub mod approval;
pub mod config;
pub mod error;
pub mod events;
pub mod invoker;
pub mod permission;
pub mod record;
pub mod retry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use approval::{
    ApprovalChannel, ApprovalResponder, ApprovalSubscriber, PendingApproval, SubscriptionId,
};
pub use config::{load_config_file, ConfigError, PipelineConfig};
pub use error::{Error, Result};
pub use events::{HookId, InvokerHook, ToolCallEvent};
pub use invoker::{ToolInvoker, ToolInvokerBuilder};
pub use permission::{
    FilePermissionStore, MemoryPermissionStore, PermissionError, PermissionGate, PermissionStore,
    PermissionStoreError,
};
pub use record::ToolCallRecord;
pub use retry::{
    backoff_delay, execute_with_retry, is_transient_error, ErrorClassifier, RetryCallback,
    RetryConfig, RetryExecutor, RetryInfo, SubstringClassifier,
};
pub use types::{
    ApprovalDecision, ArgValue, ArgumentError, ToolArguments, ToolCallOutcome, ToolCallRequest,
    ToolCallStatus, PERMISSION_DENIED_MESSAGE,
};
