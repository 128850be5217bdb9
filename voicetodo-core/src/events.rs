use std::time::Duration;

use uuid::Uuid;

use crate::types::{ToolArguments, ToolCallStatus};

/// Events emitted while a tool call moves through the pipeline
///
/// Every event carries the request id so UI and audit layers can
/// correlate them with the final outcome.
#[derive(Debug, Clone)]
pub enum ToolCallEvent {
    /// Invocation received (fires exactly once per call)
    Requested {
        /// Request ID
        request_id: Uuid,
        /// Tool name
        tool_name: String,
        /// Call arguments
        arguments: ToolArguments,
    },

    /// Tool is not always-allowed; waiting for a human
    PermissionRequired {
        request_id: Uuid,
        tool_name: String,
    },

    /// Permission granted
    PermissionGranted {
        request_id: Uuid,
        tool_name: String,
        /// The tool was already always-allowed
        auto: bool,
        /// The user asked to always allow the tool
        remembered: bool,
    },

    /// Permission denied by the user
    PermissionDenied {
        request_id: Uuid,
        tool_name: String,
    },

    /// An attempt is starting
    Executing {
        request_id: Uuid,
        tool_name: String,
        /// 1-based attempt number
        attempt: usize,
    },

    /// A transient failure will be retried after `delay`
    Retrying {
        request_id: Uuid,
        tool_name: String,
        /// 1-based number of the attempt that failed
        attempt: usize,
        delay: Duration,
        error: String,
    },

    /// Tool succeeded
    Completed {
        request_id: Uuid,
        tool_name: String,
        result: String,
        retry_count: usize,
        /// Time from request to completion, including approval
        duration: Duration,
    },

    /// Tool failed or was denied
    Failed {
        request_id: Uuid,
        tool_name: String,
        error: String,
        retry_count: usize,
        permission_denied: bool,
        duration: Duration,
    },
}

impl ToolCallEvent {
    pub fn request_id(&self) -> Uuid {
        match self {
            ToolCallEvent::Requested { request_id, .. }
            | ToolCallEvent::PermissionRequired { request_id, .. }
            | ToolCallEvent::PermissionGranted { request_id, .. }
            | ToolCallEvent::PermissionDenied { request_id, .. }
            | ToolCallEvent::Executing { request_id, .. }
            | ToolCallEvent::Retrying { request_id, .. }
            | ToolCallEvent::Completed { request_id, .. }
            | ToolCallEvent::Failed { request_id, .. } => *request_id,
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            ToolCallEvent::Requested { tool_name, .. }
            | ToolCallEvent::PermissionRequired { tool_name, .. }
            | ToolCallEvent::PermissionGranted { tool_name, .. }
            | ToolCallEvent::PermissionDenied { tool_name, .. }
            | ToolCallEvent::Executing { tool_name, .. }
            | ToolCallEvent::Retrying { tool_name, .. }
            | ToolCallEvent::Completed { tool_name, .. }
            | ToolCallEvent::Failed { tool_name, .. } => tool_name,
        }
    }

    /// Lifecycle state the call is in once this event has fired
    pub fn status(&self) -> ToolCallStatus {
        match self {
            ToolCallEvent::Requested { .. } | ToolCallEvent::PermissionRequired { .. } => {
                ToolCallStatus::PendingApproval
            }
            ToolCallEvent::PermissionGranted { .. } | ToolCallEvent::Executing { .. } => {
                ToolCallStatus::Executing
            }
            ToolCallEvent::Retrying { .. } => ToolCallStatus::Retrying,
            ToolCallEvent::Completed { .. } => ToolCallStatus::Success,
            ToolCallEvent::PermissionDenied { .. } => ToolCallStatus::Denied,
            ToolCallEvent::Failed {
                permission_denied, ..
            } => {
                if *permission_denied {
                    ToolCallStatus::Denied
                } else {
                    ToolCallStatus::Failed
                }
            }
        }
    }
}

/// Hook for observing tool call lifecycle
///
/// # Example
/// ```
/// use voicetodo_core::events::{InvokerHook, ToolCallEvent};
///
/// struct Logger;
///
/// impl InvokerHook for Logger {
///     fn on_event(&self, event: &ToolCallEvent) {
///         match event {
///             ToolCallEvent::Retrying { tool_name, delay, .. } => {
///                 println!("Retrying {} in {:?}", tool_name, delay);
///             }
///             ToolCallEvent::Completed { tool_name, .. } => {
///                 println!("{} done", tool_name);
///             }
///             _ => {}
///         }
///     }
/// }
/// ```
pub trait InvokerHook: Send + Sync {
    /// Called when an event occurs
    fn on_event(&self, event: &ToolCallEvent);
}

/// Blanket implementation for closures
impl<F> InvokerHook for F
where
    F: Fn(&ToolCallEvent) + Send + Sync,
{
    fn on_event(&self, event: &ToolCallEvent) {
        self(event)
    }
}

/// Unique identifier for a registered hook.
///
/// Used to remove hooks via [`crate::ToolInvoker::remove_hook`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub(crate) u64);
