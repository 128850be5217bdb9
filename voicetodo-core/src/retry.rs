//! Retry logic for tool execution
//!
//! Runs a tool action after its permission resolves, retrying transient
//! failures with exponential backoff. Failures surface as a
//! [`ToolCallOutcome`], never as an error.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ToolCallOutcome;

/// Error-message fragments that mark a failure as transient
pub const TRANSIENT_MARKERS: [&str; 6] = ["500", "502", "503", "504", "timeout", "connection"];

/// Substituted when an action fails with an empty message
const EMPTY_ERROR_MESSAGE: &str = "Tool failed without an error message";

/// Configuration for retry behavior on transient errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3)
    pub max_retries: usize,
    /// Base delay in milliseconds for exponential backoff (default: 1000ms)
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 30000ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first backoff delay, raising the cap if it would fall below it
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.max_delay_ms = self.max_delay_ms.max(self.base_delay_ms);
        self
    }

    /// Attempts actually made; zero is treated as a single attempt
    pub fn max_attempts(&self) -> usize {
        self.max_retries.max(1)
    }
}

/// Information about a retry attempt
#[derive(Debug, Clone)]
pub struct RetryInfo {
    /// Tool being retried
    pub tool_name: String,
    /// Which attempt just failed (1-based)
    pub attempt: usize,
    /// Maximum attempts configured
    pub max_attempts: usize,
    /// How long we'll wait before retrying
    pub delay: Duration,
    /// The error that triggered the retry
    pub error: String,
}

/// Callback type for retry events
pub type RetryCallback = Arc<dyn Fn(RetryInfo) + Send + Sync>;

/// Decides whether a failed attempt is worth retrying
pub trait ErrorClassifier: Send + Sync {
    fn is_transient(&self, message: &str) -> bool;
}

impl<F> ErrorClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_transient(&self, message: &str) -> bool {
        self(message)
    }
}

/// Default classifier based on [`is_transient_error`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl ErrorClassifier for SubstringClassifier {
    fn is_transient(&self, message: &str) -> bool {
        is_transient_error(message)
    }
}

/// Determine if an error message describes a transient failure
///
/// Matches server errors (5xx), timeouts and connection problems anywhere
/// in the case-folded message.
pub fn is_transient_error(message: &str) -> bool {
    let folded = message.to_lowercase();
    TRANSIENT_MARKERS
        .iter()
        .any(|marker| folded.contains(marker))
}

/// Calculate the backoff delay after a failed zero-based attempt
///
/// `base_delay_ms * 2^attempt`, capped at `max_delay_ms`.
pub fn backoff_delay(attempt: usize, config: &RetryConfig) -> Duration {
    let shift = attempt.min(32) as u32;
    let exp = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let delay = config.base_delay_ms.saturating_mul(exp);
    Duration::from_millis(delay.min(config.max_delay_ms))
}

/// Runs tool actions with permission check and bounded retry
#[derive(Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
    classifier: Arc<dyn ErrorClassifier>,
    on_retry: Option<RetryCallback>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(SubstringClassifier),
            on_retry: None,
        }
    }

    /// Replace the transient-error classifier
    pub fn with_classifier(mut self, classifier: impl ErrorClassifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Share a classifier with other executors
    pub fn with_shared_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Invoke a callback before each backoff sleep
    pub fn with_retry_callback(mut self, callback: RetryCallback) -> Self {
        self.on_retry = Some(callback);
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Await `permission`, then run `action` with retry.
    ///
    /// - Permission denied: returns [`ToolCallOutcome::denied`] without
    ///   running the action.
    /// - Success on zero-based attempt `i`: `retry_count = i`.
    /// - Fatal failure, or transient failure on the last attempt: stops and
    ///   returns the last error with `retry_count` = attempts made.
    ///
    /// Attempts are strictly sequential. Dropping the future during a
    /// backoff sleep runs no further attempts.
    pub async fn execute<F, Fut, E, P>(
        &self,
        tool_name: &str,
        mut action: F,
        permission: P,
    ) -> ToolCallOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: Display,
        P: Future<Output = bool>,
    {
        if !permission.await {
            log::debug!("Tool '{}' denied, not executing", tool_name);
            return ToolCallOutcome::denied();
        }

        let max_attempts = self.config.max_attempts();
        let mut last_error = String::new();
        let mut attempts = 0;

        for attempt in 0..max_attempts {
            attempts = attempt + 1;
            last_error = match action().await {
                Ok(result) => return ToolCallOutcome::success(result, attempt),
                Err(err) => err.to_string(),
            };
            if last_error.is_empty() {
                last_error = EMPTY_ERROR_MESSAGE.to_string();
            }

            if !self.classifier.is_transient(&last_error) {
                log::debug!(
                    "Tool '{}' failed with non-transient error on attempt {}: {}",
                    tool_name,
                    attempts,
                    last_error
                );
                break;
            }
            if attempts >= max_attempts {
                break;
            }

            let delay = backoff_delay(attempt, &self.config);
            log::warn!(
                "Tool '{}' attempt {}/{} failed: {}. Retrying in {}ms",
                tool_name,
                attempts,
                max_attempts,
                last_error,
                delay.as_millis()
            );
            if let Some(callback) = &self.on_retry {
                callback(RetryInfo {
                    tool_name: tool_name.to_string(),
                    attempt: attempts,
                    max_attempts,
                    delay,
                    error: last_error.clone(),
                });
            }

            tokio::time::sleep(delay).await;
        }

        log::warn!(
            "Tool '{}' failed after {} attempt(s): {}",
            tool_name,
            attempts,
            last_error
        );
        ToolCallOutcome::failure(last_error, attempts)
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

/// Convenience wrapper around [`RetryExecutor::execute`] with the default
/// classifier.
///
/// # Example
///
/// ```ignore
/// let outcome = execute_with_retry(
///     "addTodo",
///     || async { todos.add("Buy milk").await },
///     &RetryConfig::default(),
///     async { true },
/// )
/// .await;
/// ```
pub async fn execute_with_retry<F, Fut, E, P>(
    tool_name: &str,
    action: F,
    config: &RetryConfig,
    permission: P,
) -> ToolCallOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: Display,
    P: Future<Output = bool>,
{
    RetryExecutor::new(config.clone())
        .execute(tool_name, action, permission)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Action that fails with the given messages, then succeeds
    fn scripted(
        failures: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut() -> std::future::Ready<Result<String, String>> {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(match failures.get(n) {
                Some(msg) => Err(msg.to_string()),
                None => Ok(format!("done after {}", n)),
            })
        }
    }

    /// Paused-clock timers may land up to a tick past their deadline
    fn assert_elapsed(start: Instant, expected_ms: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_millis(expected_ms);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(10),
            "expected ~{:?}, got {:?}",
            expected,
            elapsed
        );
    }

    fn recording_callback() -> (RetryCallback, Arc<Mutex<Vec<Duration>>>) {
        let delays = Arc::new(Mutex::new(Vec::new()));
        let delays_clone = delays.clone();
        let callback: RetryCallback = Arc::new(move |info: RetryInfo| {
            delays_clone.lock().unwrap().push(info.delay);
        });
        (callback, delays)
    }

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay_ms, 1000);
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[test]
    fn test_retry_config_zero_attempts_runs_once() {
        assert_eq!(RetryConfig::default().with_max_retries(0).max_attempts(), 1);
    }

    #[test]
    fn test_is_transient_error_markers() {
        for message in [
            "HTTP 500 Internal Server Error",
            "502 Bad Gateway",
            "upstream returned 503",
            "504 gateway",
            "Request TIMEOUT",
            "Connection reset by peer",
        ] {
            assert!(is_transient_error(message), "{} should be transient", message);
        }
    }

    #[test]
    fn test_is_transient_error_fatal() {
        for message in ["invalid argument", "401 Unauthorized", "todo not found", ""] {
            assert!(!is_transient_error(message), "{} should be fatal", message);
        }
    }

    #[test]
    fn test_backoff_delay_doubles() {
        let config = RetryConfig::default();
        assert_eq!(backoff_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2, &config), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_delay_respects_max() {
        let config = RetryConfig {
            max_retries: 100,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        };
        assert_eq!(backoff_delay(10, &config), Duration::from_millis(5000));
        assert_eq!(backoff_delay(usize::MAX, &config), Duration::from_millis(5000));
    }

    #[test]
    fn test_base_delay_above_cap_raises_cap() {
        let config = RetryConfig::default().with_base_delay(Duration::from_secs(60));
        assert_eq!(config.max_delay_ms, 60_000);
        assert_eq!(backoff_delay(0, &config), Duration::from_secs(60));
        assert_eq!(backoff_delay(3, &config), Duration::from_secs(60));

        let config = RetryConfig::default().with_base_delay(Duration::from_millis(50));
        assert_eq!(config.max_delay_ms, 30_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let calls = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();

        let outcome = execute_with_retry(
            "addTodo",
            scripted(vec![], calls.clone()),
            &RetryConfig::default(),
            async { true },
        )
        .await;

        assert!(outcome.success);
        assert_eq!(outcome.result.as_deref(), Some("done after 0"));
        assert_eq!(outcome.retry_count, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_elapsed(start, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (callback, delays) = recording_callback();
        let start = Instant::now();

        let outcome = RetryExecutor::default()
            .with_retry_callback(callback)
            .execute(
                "addTodo",
                scripted(vec!["503 Service Unavailable", "503 Service Unavailable"], calls.clone()),
                async { true },
            )
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_elapsed(start, 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_stops_immediately() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (callback, delays) = recording_callback();
        let start = Instant::now();

        let outcome = RetryExecutor::default()
            .with_retry_callback(callback)
            .execute(
                "addTodo",
                scripted(vec!["invalid argument"; 3], calls.clone()),
                async { true },
            )
            .await;

        assert!(!outcome.success);
        assert!(!outcome.permission_denied);
        assert_eq!(outcome.retry_count, 1);
        assert_eq!(outcome.error.as_deref(), Some("invalid argument"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(delays.lock().unwrap().is_empty());
        assert_elapsed(start, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_exhaustion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (callback, delays) = recording_callback();
        let start = Instant::now();

        let outcome = RetryExecutor::default()
            .with_retry_callback(callback)
            .execute(
                "addTodo",
                scripted(vec!["timeout"; 10], calls.clone()),
                async { true },
            )
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.retry_count, 3);
        assert_eq!(outcome.error.as_deref(), Some("timeout"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // No sleep after the final attempt
        assert_eq!(
            *delays.lock().unwrap(),
            vec![Duration::from_millis(1000), Duration::from_millis(2000)]
        );
        assert_elapsed(start, 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_fatal_reports_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = execute_with_retry(
            "updateTodo",
            scripted(vec!["connection refused", "todo not found"], calls.clone()),
            &RetryConfig::default(),
            async { true },
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.error.as_deref(), Some("todo not found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_never_runs_action() {
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = execute_with_retry(
            "deleteTodo",
            scripted(vec![], calls.clone()),
            &RetryConfig::default(),
            async { false },
        )
        .await;

        assert!(!outcome.success);
        assert!(outcome.permission_denied);
        assert_eq!(outcome.error.as_deref(), Some("Permission denied by user"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_error_message_is_replaced() {
        let outcome = execute_with_retry(
            "addTodo",
            || async { Err::<String, _>(String::new()) },
            &RetryConfig::default(),
            async { true },
        )
        .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(EMPTY_ERROR_MESSAGE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier() {
        let calls = Arc::new(AtomicUsize::new(0));

        let outcome = RetryExecutor::default()
            .with_classifier(|message: &str| message.contains("busy"))
            .execute(
                "addTodo",
                scripted(vec!["database busy", "503"], calls.clone()),
                async { true },
            )
            .await;

        // "busy" retried, "503" is fatal under this classifier
        assert!(!outcome.success);
        assert_eq!(outcome.retry_count, 2);
        assert_eq!(outcome.error.as_deref(), Some("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_runs_no_more_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action_calls = calls.clone();

        let handle = tokio::spawn(async move {
            execute_with_retry(
                "addTodo",
                scripted(vec!["503"; 10], action_calls),
                &RetryConfig::default(),
                async { true },
            )
            .await
        });

        // First attempt fails immediately, then the task sleeps for 1s
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
