//! Tool invocation entry point
//!
//! [`ToolInvoker`] resolves permission for a tool call (always-allow set or
//! interactive approval), then runs the action through the retry executor
//! and returns the outcome unchanged.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::approval::ApprovalChannel;
use crate::config::PipelineConfig;
use crate::events::{HookId, InvokerHook, ToolCallEvent};
use crate::permission::{MemoryPermissionStore, PermissionGate, PermissionStore};
use crate::retry::{ErrorClassifier, RetryConfig, RetryExecutor, RetryInfo, SubstringClassifier};
use crate::types::{ApprovalDecision, ToolArguments, ToolCallOutcome, ToolCallRequest};

type HookMap = RwLock<HashMap<HookId, Arc<dyn InvokerHook>>>;

fn emit_to(hooks: &HookMap, event: ToolCallEvent) {
    let hooks = hooks.read();
    for hook in hooks.values() {
        hook.on_event(&event);
    }
}

/// Runs tool calls through permission, approval and retry
///
/// Create one per application session with [`ToolInvoker::builder`] and
/// share it by reference; independent calls may run concurrently.
///
/// ```rust
/// use voicetodo_core::{ToolArguments, ToolInvoker};
///
/// # tokio_test::block_on(async {
/// let invoker = ToolInvoker::builder()
///     .with_trusted_tool("listTodos")
///     .build()
///     .await
///     .unwrap();
///
/// let outcome = invoker
///     .invoke("listTodos", ToolArguments::new(), || async {
///         Ok::<_, String>("2 todos".to_string())
///     })
///     .await;
/// assert!(outcome.success);
/// # });
/// ```
pub struct ToolInvoker {
    gate: Arc<PermissionGate>,
    approvals: Arc<ApprovalChannel>,
    retry_config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
    hooks: Arc<HookMap>,
    next_hook_id: AtomicU64,
}

impl ToolInvoker {
    /// Create a new ToolInvokerBuilder for fluent configuration
    pub fn builder() -> ToolInvokerBuilder {
        ToolInvokerBuilder::new()
    }

    /// The always-allow gate, for settings screens that grant or revoke
    pub fn gate(&self) -> &Arc<PermissionGate> {
        &self.gate
    }

    /// The approval channel UI surfaces subscribe to
    pub fn approvals(&self) -> &Arc<ApprovalChannel> {
        &self.approvals
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Add an event hook to observe tool call lifecycle
    pub fn add_hook(&self, hook: impl InvokerHook + 'static) -> HookId {
        let id = HookId(self.next_hook_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.write().insert(id, Arc::new(hook));
        id
    }

    /// Remove a previously added hook. Returns `false` if not found.
    pub fn remove_hook(&self, id: HookId) -> bool {
        self.hooks.write().remove(&id).is_some()
    }

    fn emit_event(&self, event: ToolCallEvent) {
        emit_to(&self.hooks, event);
    }

    /// Invoke a tool, asking for approval unless it is always allowed.
    ///
    /// Permission resolves before the first attempt; attempts are
    /// sequential. Denial and exhaustion are reported in the outcome.
    pub async fn invoke<F, Fut, E>(
        &self,
        tool_name: &str,
        arguments: ToolArguments,
        action: F,
    ) -> ToolCallOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        self.invoke_request(ToolCallRequest::new(tool_name, arguments), action)
            .await
    }

    /// Invoke a tool for a prebuilt request
    pub async fn invoke_request<F, Fut, E>(
        &self,
        request: ToolCallRequest,
        mut action: F,
    ) -> ToolCallOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let start = Instant::now();
        let request_id = request.id;
        let tool_name = request.tool_name.clone();

        // Emit Requested (always fires exactly once)
        self.emit_event(ToolCallEvent::Requested {
            request_id,
            tool_name: tool_name.clone(),
            arguments: request.arguments.clone(),
        });

        let hooks = self.hooks.clone();
        let retry_tool = tool_name.clone();
        let executor = RetryExecutor::new(self.retry_config.clone())
            .with_shared_classifier(self.classifier.clone())
            .with_retry_callback(Arc::new(move |info: RetryInfo| {
                emit_to(
                    &hooks,
                    ToolCallEvent::Retrying {
                        request_id,
                        tool_name: retry_tool.clone(),
                        attempt: info.attempt,
                        delay: info.delay,
                        error: info.error,
                    },
                );
            }));

        let mut attempt = 0;
        let outcome = executor
            .execute(
                &tool_name,
                || {
                    attempt += 1;
                    self.emit_event(ToolCallEvent::Executing {
                        request_id,
                        tool_name: tool_name.clone(),
                        attempt,
                    });
                    action()
                },
                self.resolve_permission(&request),
            )
            .await;

        let duration = start.elapsed();
        match (&outcome.result, outcome.success) {
            (Some(result), true) => self.emit_event(ToolCallEvent::Completed {
                request_id,
                tool_name: tool_name.clone(),
                result: result.clone(),
                retry_count: outcome.retry_count,
                duration,
            }),
            _ => self.emit_event(ToolCallEvent::Failed {
                request_id,
                tool_name: tool_name.clone(),
                error: outcome.error.clone().unwrap_or_default(),
                retry_count: outcome.retry_count,
                permission_denied: outcome.permission_denied,
                duration,
            }),
        }

        log::debug!(
            "Tool '{}' ({}) finished with {}",
            tool_name,
            request_id,
            outcome.status()
        );
        outcome
    }

    /// Decide whether the call may run
    async fn resolve_permission(&self, request: &ToolCallRequest) -> bool {
        let request_id = request.id;
        let tool_name = &request.tool_name;

        if self.gate.is_always_allowed(tool_name) {
            self.emit_event(ToolCallEvent::PermissionGranted {
                request_id,
                tool_name: tool_name.clone(),
                auto: true,
                remembered: false,
            });
            return true;
        }

        self.emit_event(ToolCallEvent::PermissionRequired {
            request_id,
            tool_name: tool_name.clone(),
        });

        match self.approvals.request_decision(request.clone()).await {
            ApprovalDecision::Granted { remember } => {
                if remember {
                    if let Err(e) = self.gate.set_always_allowed(tool_name, true).await {
                        log::error!("Failed to remember approval for '{}': {}", tool_name, e);
                    }
                }
                self.emit_event(ToolCallEvent::PermissionGranted {
                    request_id,
                    tool_name: tool_name.clone(),
                    auto: false,
                    remembered: remember,
                });
                true
            }
            ApprovalDecision::Denied => {
                self.emit_event(ToolCallEvent::PermissionDenied {
                    request_id,
                    tool_name: tool_name.clone(),
                });
                false
            }
        }
    }
}

/// Builder for creating a ToolInvoker with fluent configuration
///
/// `.build().await` loads the always-allowed set, so storage errors surface
/// there rather than on the first call.
pub struct ToolInvokerBuilder {
    store: Option<Box<dyn PermissionStore>>,
    gate: Option<Arc<PermissionGate>>,
    approvals: Option<Arc<ApprovalChannel>>,
    retry_config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
    hooks: Vec<Arc<dyn InvokerHook>>,
    /// Tools to grant always-allow at build time
    trusted_tools: Vec<String>,
}

impl Default for ToolInvokerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolInvokerBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            gate: None,
            approvals: None,
            retry_config: RetryConfig::default(),
            classifier: Arc::new(SubstringClassifier),
            hooks: Vec::new(),
            trusted_tools: Vec::new(),
        }
    }

    /// Persist always-allow decisions in a custom store.
    ///
    /// Defaults to [`MemoryPermissionStore`]. Ignored if
    /// [`ToolInvokerBuilder::with_gate`] is used.
    pub fn with_permission_store(mut self, store: impl PermissionStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Share an existing gate. It is initialized at build time if needed.
    pub fn with_gate(mut self, gate: Arc<PermissionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Share an existing approval channel
    pub fn with_approval_channel(mut self, approvals: Arc<ApprovalChannel>) -> Self {
        self.approvals = Some(approvals);
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Replace the transient-error classifier used for retries
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Apply a loaded configuration: retry settings and a file store at the
    /// configured (or default) path.
    pub fn with_config(self, config: PipelineConfig) -> Self {
        let store = config.permission_store();
        self.with_retry_config(config.retry)
            .with_permission_store(store)
    }

    /// Always allow a tool without asking.
    ///
    /// The grant is written through the permission store during
    /// [`build`](Self::build), so with a file store (including the one
    /// [`with_config`](Self::with_config) installs) it persists like a
    /// remembered user grant.
    pub fn with_trusted_tool(mut self, tool_name: impl Into<String>) -> Self {
        self.trusted_tools.push(tool_name.into());
        self
    }

    pub fn add_hook(mut self, hook: impl InvokerHook + 'static) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    pub async fn build(self) -> crate::error::Result<ToolInvoker> {
        let gate = match self.gate {
            Some(gate) => gate,
            None => {
                let store = self
                    .store
                    .unwrap_or_else(|| Box::new(MemoryPermissionStore::new()));
                Arc::new(PermissionGate::with_boxed_store(store))
            }
        };
        if !gate.is_initialized() {
            gate.init().await?;
        }

        for tool_name in &self.trusted_tools {
            if !gate.is_always_allowed(tool_name) {
                gate.set_always_allowed(tool_name, true).await?;
            }
        }

        let hooks: HashMap<HookId, Arc<dyn InvokerHook>> = self
            .hooks
            .into_iter()
            .enumerate()
            .map(|(i, hook)| (HookId(i as u64), hook))
            .collect();
        let next_hook_id = AtomicU64::new(hooks.len() as u64);

        Ok(ToolInvoker {
            gate,
            approvals: self
                .approvals
                .unwrap_or_else(|| Arc::new(ApprovalChannel::new())),
            retry_config: self.retry_config,
            classifier: self.classifier,
            hooks: Arc::new(RwLock::new(hooks)),
            next_hook_id,
        })
    }
}
