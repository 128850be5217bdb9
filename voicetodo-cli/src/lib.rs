//! Terminal front end for the voicetodo tool-call pipeline
//!
//! This crate provides:
//! - Interactive approval prompts for pending tool calls
//! - Formatting of arguments, lifecycle events and outcomes
//! - A [`TerminalSession`] that wires both into a [`voicetodo_core::ToolInvoker`]

pub mod approval;
mod error;
pub mod presentation;
mod session;

pub use approval::{
    attach_prompter, print_confirmation, print_tool_header, ApprovalPrompter, DefaultPrompter,
    PermissionPrompt, SimplePrompter,
};
pub use error::CliError;
pub use presentation::{
    flush_events, format_arguments, format_event, format_outcome, new_event_queue, EventQueue,
    PresentationHook,
};
pub use session::TerminalSession;
