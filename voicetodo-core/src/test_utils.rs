//! Test utilities for voicetodo-core.
//!
//! Scripted tool actions, canned approval responders, event collection and
//! a permission store that can be told to fail.
//!
//! Enable with the `test-utils` feature:
//!
//! ```toml
//! [dev-dependencies]
//! voicetodo-core = { version = "...", features = ["test-utils"] }
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use voicetodo_core::test_utils::{AutoResponder, ScriptedAction};
//! use voicetodo_core::{ApprovalDecision, ToolArguments, ToolInvoker};
//!
//! # tokio_test::block_on(async {
//! let invoker = ToolInvoker::builder().build().await.unwrap();
//! let responder = AutoResponder::new(ApprovalDecision::once());
//! invoker.approvals().subscribe(responder.clone());
//!
//! let action = ScriptedAction::new().then_ok("Added 'milk'");
//! let outcome = invoker
//!     .invoke("addTodo", ToolArguments::new(), action.as_action())
//!     .await;
//!
//! assert!(outcome.success);
//! assert_eq!(responder.request_count(), 1);
//! assert_eq!(action.call_count(), 1);
//! # });
//! ```

use std::collections::{BTreeSet, VecDeque};
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::approval::{ApprovalSubscriber, PendingApproval};
use crate::events::{InvokerHook, ToolCallEvent};
use crate::permission::{PermissionStore, PermissionStoreError};
use crate::types::{ApprovalDecision, ToolCallRequest, ToolCallStatus};

type Step = Result<String, String>;

/// A tool action that returns pre-programmed results in order.
///
/// Once the script is exhausted the last step repeats. An empty script
/// succeeds with `"ok"`.
#[derive(Clone, Default)]
pub struct ScriptedAction {
    steps: Arc<Mutex<VecDeque<Step>>>,
    last: Arc<Mutex<Option<Step>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result
    pub fn then_ok(self, result: impl Into<String>) -> Self {
        self.steps.lock().push_back(Ok(result.into()));
        self
    }

    /// Queue a failure with the given message
    pub fn then_err(self, error: impl Into<String>) -> Self {
        self.steps.lock().push_back(Err(error.into()));
        self
    }

    /// Queue `times` failures with the same message
    pub fn then_err_times(self, error: impl Into<String>, times: usize) -> Self {
        let error = error.into();
        {
            let mut steps = self.steps.lock();
            for _ in 0..times {
                steps.push_back(Err(error.clone()));
            }
        }
        self
    }

    /// Run the next scripted step
    pub fn call(&self) -> Ready<Step> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().pop_front();
        let mut last = self.last.lock();
        let step = match step {
            Some(step) => {
                *last = Some(step.clone());
                step
            }
            None => last.clone().unwrap_or_else(|| Ok("ok".to_string())),
        };
        ready(step)
    }

    /// Closure suitable for [`crate::ToolInvoker::invoke`]
    pub fn as_action(&self) -> impl FnMut() -> Ready<Step> + Send + 'static {
        let this = self.clone();
        move || this.call()
    }

    /// Number of times the action ran
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Approval subscriber that answers every request with a fixed decision.
#[derive(Clone)]
pub struct AutoResponder {
    decision: ApprovalDecision,
    requests: Arc<Mutex<Vec<ToolCallRequest>>>,
}

impl AutoResponder {
    pub fn new(decision: ApprovalDecision) -> Self {
        Self {
            decision,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn granting() -> Self {
        Self::new(ApprovalDecision::once())
    }

    pub fn denying() -> Self {
        Self::new(ApprovalDecision::Denied)
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ToolCallRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl ApprovalSubscriber for AutoResponder {
    fn on_request(&self, pending: &PendingApproval) {
        self.requests.lock().push(pending.request().clone());
        pending.respond_decision(self.decision);
    }
}

/// Collects invoker events for verification in tests.
#[derive(Clone, Default)]
pub struct EventCollector {
    events: Arc<Mutex<Vec<ToolCallEvent>>>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events.
    pub fn events(&self) -> Vec<ToolCallEvent> {
        self.events.lock().clone()
    }

    /// Lifecycle status after each event, in order
    pub fn statuses(&self) -> Vec<ToolCallStatus> {
        self.events.lock().iter().map(ToolCallEvent::status).collect()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&ToolCallEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl InvokerHook for EventCollector {
    fn on_event(&self, event: &ToolCallEvent) {
        self.events.lock().push(event.clone());
    }
}

/// In-memory permission store whose reads and writes can be made to fail.
///
/// With `set_drop_saves(true)` writes report success but are not kept.
#[derive(Clone, Default)]
pub struct FlakyStore {
    tools: Arc<Mutex<BTreeSet<String>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
    drop_saves: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_drop_saves(&self, enabled: bool) {
        self.drop_saves.store(enabled, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// What the store currently holds
    pub fn stored(&self) -> BTreeSet<String> {
        self.tools.lock().clone()
    }
}

#[async_trait]
impl PermissionStore for FlakyStore {
    async fn load(&self) -> Result<BTreeSet<String>, PermissionStoreError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(PermissionStoreError::Read("storage offline".to_string()));
        }
        Ok(self.tools.lock().clone())
    }

    async fn save(&self, tools: &BTreeSet<String>) -> Result<(), PermissionStoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PermissionStoreError::Write("storage offline".to_string()));
        }
        if self.drop_saves.load(Ordering::SeqCst) {
            return Ok(());
        }
        *self.tools.lock() = tools.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_action_order_and_repeat() {
        let action = ScriptedAction::new().then_err("503").then_ok("done");
        assert_eq!(action.call().await, Err("503".to_string()));
        assert_eq!(action.call().await, Ok("done".to_string()));
        assert_eq!(action.call().await, Ok("done".to_string()));
        assert_eq!(action.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_succeeds() {
        let action = ScriptedAction::new();
        assert_eq!(action.call().await, Ok("ok".to_string()));
    }

    #[tokio::test]
    async fn test_flaky_store() {
        let store = FlakyStore::new();
        store
            .save(&BTreeSet::from(["addTodo".to_string()]))
            .await
            .unwrap();
        assert_eq!(store.save_count(), 1);

        store.set_fail_saves(true);
        assert!(store.save(&BTreeSet::new()).await.is_err());
        assert_eq!(store.stored().len(), 1);

        store.set_fail_loads(true);
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn test_flaky_store_drop_saves() {
        let store = FlakyStore::new();
        store.set_drop_saves(true);
        store
            .save(&BTreeSet::from(["addTodo".to_string()]))
            .await
            .unwrap();
        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(store.save_count(), 0);
    }
}
