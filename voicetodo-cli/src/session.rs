//! Interactive terminal session

use std::fmt::Display;
use std::future::Future;
use std::io::{self, Write};
use std::path::Path;

use parking_lot::Mutex;
use voicetodo_core::{load_config_file, PipelineConfig, ToolArguments, ToolCallOutcome, ToolInvoker};

use crate::approval::{attach_prompter, ApprovalPrompter, SimplePrompter};
use crate::error::CliError;
use crate::presentation::{flush_events, format_outcome, new_event_queue, EventQueue, PresentationHook};

/// A [`ToolInvoker`] with a terminal prompter attached and its events
/// rendered to an output stream
pub struct TerminalSession {
    invoker: ToolInvoker,
    events: EventQueue,
    output: Mutex<Box<dyn Write + Send>>,
}

impl TerminalSession {
    /// Load configuration from `path` and prompt on stdin/stdout
    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self, CliError> {
        let config = load_config_file(path).await?;
        Self::new(config).await
    }

    /// Prompt on stdin/stdout
    pub async fn new(config: PipelineConfig) -> Result<Self, CliError> {
        Self::with_prompter(config, SimplePrompter::new(), io::stdout()).await
    }

    /// Use a custom prompter and output stream
    pub async fn with_prompter(
        config: PipelineConfig,
        prompter: impl ApprovalPrompter + 'static,
        output: impl Write + Send + 'static,
    ) -> Result<Self, CliError> {
        let events = new_event_queue();
        let invoker = ToolInvoker::builder()
            .with_config(config)
            .add_hook(PresentationHook::new(events.clone()))
            .build()
            .await?;
        attach_prompter(invoker.approvals(), prompter);
        log::debug!(
            "Terminal session ready, {} tool(s) always allowed",
            invoker.gate().always_allowed().len()
        );

        Ok(Self {
            invoker,
            events,
            output: Mutex::new(Box::new(output)),
        })
    }

    pub fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }

    /// Invoke a tool, then print its events and a summary line
    pub async fn run<F, Fut, E>(
        &self,
        tool_name: &str,
        arguments: ToolArguments,
        action: F,
    ) -> Result<ToolCallOutcome, CliError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
    {
        let outcome = self.invoker.invoke(tool_name, arguments, action).await;

        let mut output = self.output.lock();
        flush_events(&self.events, &mut *output)?;
        writeln!(output, "{}", format_outcome(tool_name, &outcome))?;
        output.flush()?;
        Ok(outcome)
    }

    /// Revoke every always-allow decision
    pub async fn reset_permissions(&self) -> Result<(), CliError> {
        self.invoker
            .gate()
            .clear_all()
            .await
            .map_err(voicetodo_core::Error::from)?;
        Ok(())
    }
}
