//! Interactive approval requests
//!
//! [`ApprovalChannel`] publishes a pending request to every subscribed
//! surface and suspends the caller until one of them answers. Each request
//! is a fresh one-shot: the first decision wins, later decisions are no-ops,
//! and a decision that arrives after the caller went away is discarded.
//!
//! ```rust
//! use voicetodo_core::approval::{ApprovalChannel, PendingApproval};
//! use voicetodo_core::ToolArguments;
//!
//! # tokio_test::block_on(async {
//! let channel = ApprovalChannel::new();
//! channel.subscribe(|pending: &PendingApproval| {
//!     pending.respond(pending.tool_name() == "listTodos");
//! });
//!
//! assert!(channel.request_permission("listTodos", &ToolArguments::new()).await);
//! assert!(!channel.request_permission("deleteTodo", &ToolArguments::new()).await);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::types::{ApprovalDecision, ToolArguments, ToolCallRequest};

/// Receives pending approval requests
///
/// Implementations must eventually answer every request they receive,
/// either directly through [`PendingApproval::respond`] or later through
/// [`ApprovalChannel::respond`]. Unanswered requests stay pending.
pub trait ApprovalSubscriber: Send + Sync {
    /// Called once per published request
    fn on_request(&self, pending: &PendingApproval);
}

/// Blanket implementation for closures
impl<F> ApprovalSubscriber for F
where
    F: Fn(&PendingApproval) + Send + Sync,
{
    fn on_request(&self, pending: &PendingApproval) {
        self(pending)
    }
}

/// Identifier for a registered subscriber.
///
/// Used to remove subscribers via [`ApprovalChannel::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct ResponderInner {
    resolved: AtomicBool,
    tx: Mutex<Option<oneshot::Sender<ApprovalDecision>>>,
}

/// Resolves one pending request
///
/// Cloning shares the same underlying one-shot; whichever clone responds
/// first decides.
#[derive(Clone)]
pub struct ApprovalResponder {
    inner: Arc<ResponderInner>,
}

impl ApprovalResponder {
    fn new(tx: oneshot::Sender<ApprovalDecision>) -> Self {
        Self {
            inner: Arc::new(ResponderInner {
                resolved: AtomicBool::new(false),
                tx: Mutex::new(Some(tx)),
            }),
        }
    }

    /// Deliver a decision.
    ///
    /// Returns `true` if this call resolved the request and the caller was
    /// still waiting. Returns `false` if another decision already won or the
    /// caller was cancelled.
    pub fn respond_decision(&self, decision: ApprovalDecision) -> bool {
        if self.inner.resolved.swap(true, Ordering::AcqRel) {
            return false;
        }
        match self.inner.tx.lock().take() {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    /// Grant (`true`) or deny (`false`) once
    pub fn respond(&self, granted: bool) -> bool {
        self.respond_decision(granted.into())
    }

    /// Grant this call and remember the tool as always allowed.
    ///
    /// Same return contract as [`ApprovalResponder::respond_decision`].
    pub fn grant_always(&self) -> bool {
        self.respond_decision(ApprovalDecision::always())
    }

    /// Whether a decision has been delivered
    pub fn is_resolved(&self) -> bool {
        self.inner.resolved.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for ApprovalResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalResponder")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// A tool call waiting for a human decision
#[derive(Debug, Clone)]
pub struct PendingApproval {
    request: Arc<ToolCallRequest>,
    responder: ApprovalResponder,
}

impl PendingApproval {
    pub fn request(&self) -> &ToolCallRequest {
        &self.request
    }

    pub fn id(&self) -> Uuid {
        self.request.id
    }

    pub fn tool_name(&self) -> &str {
        &self.request.tool_name
    }

    pub fn arguments(&self) -> &ToolArguments {
        &self.request.arguments
    }

    /// Grant (`true`) or deny (`false`) this call once
    pub fn respond(&self, granted: bool) -> bool {
        self.responder.respond_decision(granted.into())
    }

    /// Deliver a full decision, including the remember flag
    pub fn respond_decision(&self, decision: ApprovalDecision) -> bool {
        self.responder.respond_decision(decision)
    }

    /// Grant this call and always allow the tool from now on
    pub fn grant_always(&self) -> bool {
        self.responder.respond_decision(ApprovalDecision::always())
    }

    pub fn deny(&self) -> bool {
        self.responder.respond_decision(ApprovalDecision::Denied)
    }

    pub fn is_resolved(&self) -> bool {
        self.responder.is_resolved()
    }

    /// Handle that can resolve this request without holding the event
    pub fn responder(&self) -> ApprovalResponder {
        self.responder.clone()
    }
}

type PendingMap = Mutex<HashMap<Uuid, PendingApproval>>;

/// Removes a request from the pending map when its waiter finishes or is
/// cancelled.
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Broadcasts approval requests and awaits the first decision
///
/// Holds no durable state. Requests pending when the process exits are lost.
pub struct ApprovalChannel {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn ApprovalSubscriber>)>>,
    next_subscription: AtomicU64,
    pending: PendingMap,
}

impl ApprovalChannel {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a subscriber for future requests
    pub fn subscribe(&self, subscriber: impl ApprovalSubscriber + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Receive future requests on an async channel instead of a callback
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<PendingApproval>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |pending: &PendingApproval| {
            // Receiver gone means the surface went away; other subscribers may still answer
            let _ = tx.send(pending.clone());
        });
        (id, rx)
    }

    /// Remove a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() < before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Ask for permission to run a tool once.
    ///
    /// Returns `true` if granted.
    pub async fn request_permission(&self, tool_name: &str, arguments: &ToolArguments) -> bool {
        self.request_decision(ToolCallRequest::new(tool_name, arguments.clone()))
            .await
            .is_granted()
    }

    /// Publish a request and wait for its decision.
    ///
    /// Dropping the returned future abandons the request: it is removed from
    /// [`ApprovalChannel::pending`] and any later decision is discarded.
    pub async fn request_decision(&self, request: ToolCallRequest) -> ApprovalDecision {
        let id = request.id;
        let (tx, rx) = oneshot::channel();
        let event = PendingApproval {
            request: Arc::new(request),
            responder: ApprovalResponder::new(tx),
        };

        self.pending.lock().insert(id, event.clone());
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        // Snapshot so subscribers may (un)subscribe from inside the callback
        let subscribers: Vec<_> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, s)| s.clone())
            .collect();
        if subscribers.is_empty() {
            log::warn!(
                "Approval for '{}' ({}) requested with no subscribers",
                event.tool_name(),
                id
            );
        }
        for subscriber in &subscribers {
            subscriber.on_request(&event);
        }
        drop(event);

        match rx.await {
            Ok(decision) => decision,
            // The pending entry owns a sender until the guard drops, so an
            // unanswered request keeps waiting rather than resolving
            Err(_) => std::future::pending().await,
        }
    }

    /// Resolve a pending request by id.
    ///
    /// Returns `false` if the request is unknown, already resolved or was
    /// abandoned by its caller.
    pub fn respond(&self, request_id: Uuid, decision: ApprovalDecision) -> bool {
        let responder = self
            .pending
            .lock()
            .get(&request_id)
            .map(PendingApproval::responder);
        match responder {
            Some(responder) => responder.respond_decision(decision),
            None => false,
        }
    }

    /// Requests still waiting for a decision
    pub fn pending(&self) -> Vec<ToolCallRequest> {
        self.pending
            .lock()
            .values()
            .filter(|p| !p.is_resolved())
            .map(|p| p.request().clone())
            .collect()
    }
}

impl Default for ApprovalChannel {
    fn default() -> Self {
        Self::new()
    }
}
