//! Tool call formatting for CLI output

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use voicetodo_core::{InvokerHook, ToolArguments, ToolCallEvent, ToolCallOutcome};

/// One `key: value` line per argument, in key order
pub fn format_arguments(arguments: &ToolArguments) -> String {
    arguments
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single-line summary of a finished call
pub fn format_outcome(tool_name: &str, outcome: &ToolCallOutcome) -> String {
    if outcome.success {
        let result = outcome.result.as_deref().unwrap_or_default();
        match outcome.retry_count {
            0 => format!("\u{2713} {}: {}", tool_name, result),
            1 => format!("\u{2713} {}: {} (after 1 retry)", tool_name, result),
            n => format!("\u{2713} {}: {} (after {} retries)", tool_name, result, n),
        }
    } else if outcome.permission_denied {
        format!("\u{2717} {}: denied", tool_name)
    } else {
        let error = outcome.error.as_deref().unwrap_or_default();
        match outcome.retry_count {
            1 => format!("\u{2717} {}: {}", tool_name, error),
            n => format!("\u{2717} {}: {} (gave up after {} attempts)", tool_name, error, n),
        }
    }
}

/// Present-tense line for an event worth showing, `None` for the rest.
///
/// Terminal events are left to [`format_outcome`], which the session prints
/// once per call.
pub fn format_event(event: &ToolCallEvent) -> Option<String> {
    match event {
        ToolCallEvent::Executing {
            tool_name, attempt, ..
        } if *attempt == 1 => Some(format!("\u{2699} {}...", tool_name)),
        ToolCallEvent::Retrying {
            tool_name,
            attempt,
            delay,
            error,
            ..
        } => Some(format!(
            "\u{21bb} {} attempt {} failed ({}), retrying in {}ms",
            tool_name,
            attempt,
            error,
            delay.as_millis()
        )),
        _ => None,
    }
}

/// Queue for formatted lines that still need to be printed
pub type EventQueue = Arc<Mutex<VecDeque<String>>>;

/// Create a new event queue
pub fn new_event_queue() -> EventQueue {
    Arc::new(Mutex::new(VecDeque::new()))
}

/// Hook that queues formatted tool events for later presentation
///
/// Lines are queued rather than printed immediately so output does not
/// interleave with an approval prompt.
pub struct PresentationHook {
    queue: EventQueue,
}

impl PresentationHook {
    pub fn new(queue: EventQueue) -> Self {
        Self { queue }
    }
}

impl InvokerHook for PresentationHook {
    fn on_event(&self, event: &ToolCallEvent) {
        if let Some(line) = format_event(event) {
            self.queue.lock().push_back(line);
        }
    }
}

/// Drain and write all queued lines
pub fn flush_events(queue: &EventQueue, writer: &mut impl Write) -> io::Result<()> {
    let mut queue = queue.lock();
    while let Some(line) = queue.pop_front() {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()
}
