//! Common test utilities shared across test files.
//!
//! Scripted actions, responders and collectors come from
//! `voicetodo_core::test_utils`; this module holds the glue on top.
//! Items here may not be used by all test files, hence the module-level allow.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use voicetodo_core::test_utils::{AutoResponder, EventCollector};
use voicetodo_core::{ApprovalDecision, PermissionGate, ToolCallEvent, ToolInvoker};

/// Subscribe a responder answering every request with `decision`
pub fn auto_respond(invoker: &ToolInvoker, decision: ApprovalDecision) -> AutoResponder {
    let responder = AutoResponder::new(decision);
    invoker.approvals().subscribe(responder.clone());
    responder
}

pub async fn invoker_with_gate(gate: Arc<PermissionGate>) -> ToolInvoker {
    ToolInvoker::builder()
        .with_gate(gate)
        .build()
        .await
        .unwrap()
}

/// Backoff delays announced by `Retrying` events, in order
pub fn retry_delays(collector: &EventCollector) -> Vec<Duration> {
    collector
        .events()
        .iter()
        .filter_map(|e| match e {
            ToolCallEvent::Retrying { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect()
}

/// Paused-clock timers may land up to a tick past their deadline
pub fn assert_elapsed(start: tokio::time::Instant, expected_ms: u64) {
    let elapsed = start.elapsed();
    let expected = Duration::from_millis(expected_ms);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(10),
        "expected ~{:?}, got {:?}",
        expected,
        elapsed
    );
}
