//! Tool approval prompts for the terminal
//!
//! Offers three choices for each pending tool call:
//! - Approve once
//! - Always allow the tool (persisted by the permission gate)
//! - Deny

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;
use voicetodo_core::{ApprovalChannel, ApprovalDecision, PendingApproval, SubscriptionId};

use crate::presentation::format_arguments;

// =============================================================================
// Core Types
// =============================================================================

/// All information needed to prompt for approval
#[derive(Debug, Clone)]
pub struct PermissionPrompt {
    /// Tool name
    pub tool_name: String,
    /// Request ID (for responding through the channel)
    pub request_id: Uuid,
    /// Formatted display of the call arguments, if there are any
    pub formatted_display: Option<String>,
}

impl From<&PendingApproval> for PermissionPrompt {
    fn from(pending: &PendingApproval) -> Self {
        let arguments = pending.arguments();
        Self {
            tool_name: pending.tool_name().to_string(),
            request_id: pending.id(),
            formatted_display: (!arguments.is_empty()).then(|| format_arguments(arguments)),
        }
    }
}

/// Trait for approval prompt implementations
///
/// Implement this to create custom approval UX.
pub trait ApprovalPrompter: Send + Sync {
    /// Prompt the user and return their choice
    fn prompt(&self, request: &PermissionPrompt) -> ApprovalDecision;

    /// Human-readable name for this prompter
    fn name(&self) -> &'static str;
}

// =============================================================================
// Default Prompter Implementation
// =============================================================================

/// Simple approval prompter with clear options
///
/// Displays:
/// - y: approve once
/// - a: always allow this tool
/// - n: deny
///
/// End of input denies. Prompts are serialized, so concurrent requests are
/// asked one at a time.
pub struct SimplePrompter<R = BufReader<Stdin>, W = Stdout> {
    io: Mutex<(R, W)>,
}

impl SimplePrompter {
    /// Prompt on stdin/stdout
    pub fn new() -> Self {
        Self::with_io(BufReader::new(io::stdin()), io::stdout())
    }
}

impl Default for SimplePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: BufRead, W: Write> SimplePrompter<R, W> {
    /// Prompt on custom input and output
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    fn run_prompt(&self, request: &PermissionPrompt) -> io::Result<ApprovalDecision> {
        let mut io = self.io.lock();
        let (reader, writer) = &mut *io;

        print_tool_header(writer, request)?;
        writeln!(writer, "\n\x1b[33mPermission required:\x1b[0m")?;
        writeln!(writer, "  \x1b[1my\x1b[0m  approve once")?;
        writeln!(writer, "  \x1b[1ma\x1b[0m  always allow this tool")?;
        writeln!(writer, "  \x1b[1mn\x1b[0m  deny")?;

        loop {
            write!(writer, "\nChoice: ")?;
            writer.flush()?;

            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                print_confirmation(writer, "Denied (no input)")?;
                return Ok(ApprovalDecision::Denied);
            }

            match line.trim().to_lowercase().as_str() {
                "y" | "yes" => {
                    print_confirmation(writer, "Approved once")?;
                    return Ok(ApprovalDecision::once());
                }
                "a" | "always" => {
                    print_confirmation(writer, &format!("Always allowing {}", request.tool_name))?;
                    return Ok(ApprovalDecision::always());
                }
                "n" | "no" | "deny" => {
                    print_confirmation(writer, "Denied")?;
                    return Ok(ApprovalDecision::Denied);
                }
                "" => continue,
                _ => {
                    writeln!(writer, "\x1b[31mInvalid choice. Use y/a/n\x1b[0m")?;
                }
            }
        }
    }
}

impl<R, W> ApprovalPrompter for SimplePrompter<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn name(&self) -> &'static str {
        "SimplePrompter"
    }

    fn prompt(&self, request: &PermissionPrompt) -> ApprovalDecision {
        match self.run_prompt(request) {
            Ok(decision) => decision,
            Err(e) => {
                log::warn!("Approval prompt for '{}' failed: {}", request.tool_name, e);
                ApprovalDecision::Denied
            }
        }
    }
}

/// Default prompter type
pub type DefaultPrompter = SimplePrompter;

// =============================================================================
// Wiring
// =============================================================================

/// Answer every request on `channel` with `prompter`.
///
/// Each request is prompted on a blocking task so the async runtime keeps
/// running other tool calls meanwhile. Requests already resolved by another
/// surface are skipped.
pub fn attach_prompter(
    channel: &ApprovalChannel,
    prompter: impl ApprovalPrompter + 'static,
) -> SubscriptionId {
    let prompter: Arc<dyn ApprovalPrompter> = Arc::new(prompter);
    channel.subscribe(move |pending: &PendingApproval| {
        let pending = pending.clone();
        let prompter = prompter.clone();
        let task = move || {
            if pending.is_resolved() {
                return;
            }
            let decision = prompter.prompt(&PermissionPrompt::from(&pending));
            if !pending.respond_decision(decision) {
                log::debug!(
                    "Decision for '{}' ({}) arrived after the request closed",
                    pending.tool_name(),
                    pending.id()
                );
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(task);
            }
            Err(_) => task(),
        }
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print the tool header
pub fn print_tool_header(writer: &mut impl Write, request: &PermissionPrompt) -> io::Result<()> {
    writeln!(writer, "\n\u{1f6e0}\u{fe0f}  \x1b[1m{}\x1b[0m", request.tool_name)?;

    if let Some(ref display) = request.formatted_display {
        for line in display.lines() {
            writeln!(writer, "  {}", line)?;
        }
    }
    Ok(())
}

/// Print a confirmation message
pub fn print_confirmation(writer: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(writer, "  \x1b[32m\u{2713}\x1b[0m {}", message)
}
