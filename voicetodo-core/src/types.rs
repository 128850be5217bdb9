//! Tool call data model
//!
//! Requests, arguments, approval decisions and outcomes shared by every
//! stage of the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when the outcome of a denied call is rendered
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission denied by user";

/// Errors converting loosely-typed JSON into [`ToolArguments`]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgumentError {
    /// Tool input was not a JSON object
    #[error("Tool arguments must be a JSON object, got: {0}")]
    NotAnObject(&'static str),

    /// An argument held an array or object
    #[error("Argument '{key}' must be a string, number, boolean or null, got: {kind}")]
    NonScalar {
        /// Parameter name
        key: String,
        /// JSON type that was found
        kind: &'static str,
    },

    /// A number could not be represented as f64
    #[error("Argument '{0}' is not a representable number")]
    InvalidNumber(String),
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single tool argument value
///
/// Arguments coming from the agent are loosely typed, but they are always
/// scalars. Serializes as a plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl ArgValue {
    /// Returns the string value, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric value, if this is a number
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean value, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ArgValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    /// Convert to a JSON value
    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ArgValue::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Null => write!(f, "null"),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Number(n) => write!(f, "{}", n),
            ArgValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        ArgValue::Number(value)
    }
}

impl From<i32> for ArgValue {
    fn from(value: i32) -> Self {
        ArgValue::Number(f64::from(value))
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        ArgValue::Number(value as f64)
    }
}

impl From<u32> for ArgValue {
    fn from(value: u32) -> Self {
        ArgValue::Number(f64::from(value))
    }
}

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ArgValue::Null)
    }
}

impl TryFrom<Value> for ArgValue {
    type Error = &'static str;

    /// Fails with the JSON type name for arrays and objects
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(ArgValue::Null),
            Value::Bool(b) => Ok(ArgValue::Bool(b)),
            Value::Number(n) => n.as_f64().map(ArgValue::Number).ok_or("number"),
            Value::String(s) => Ok(ArgValue::String(s)),
            other => Err(json_type_name(&other)),
        }
    }
}

/// Named arguments for a tool call
///
/// Keys are unique and iterate in sorted order, so two argument sets built
/// in different orders compare and display identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(BTreeMap<String, ArgValue>);

impl ToolArguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert an argument, returning the previous value for the key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Option<ArgValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Convert to a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for ToolArguments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl TryFrom<Value> for ToolArguments {
    type Error = ArgumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(ArgumentError::NotAnObject(json_type_name(&other))),
        };

        let mut args = ToolArguments::new();
        for (key, value) in map {
            let arg = ArgValue::try_from(value).map_err(|kind| {
                if kind == "number" {
                    ArgumentError::InvalidNumber(key.clone())
                } else {
                    ArgumentError::NonScalar {
                        key: key.clone(),
                        kind,
                    }
                }
            })?;
            args.0.insert(key, arg);
        }
        Ok(args)
    }
}

/// An intent to invoke a named tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlates events and audit records for this call
    pub id: Uuid,
    /// Tool name, e.g. "addTodo"
    pub tool_name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(tool_name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// The human response to a pending approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Run the tool. With `remember`, always allow this tool from now on.
    Granted { remember: bool },
    /// Do not run the tool
    Denied,
}

impl ApprovalDecision {
    /// Approve this call only
    pub fn once() -> Self {
        ApprovalDecision::Granted { remember: false }
    }

    /// Approve and remember the tool as always allowed
    pub fn always() -> Self {
        ApprovalDecision::Granted { remember: true }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, ApprovalDecision::Granted { .. })
    }

    pub fn should_remember(&self) -> bool {
        matches!(self, ApprovalDecision::Granted { remember: true })
    }
}

impl From<bool> for ApprovalDecision {
    fn from(granted: bool) -> Self {
        if granted {
            ApprovalDecision::once()
        } else {
            ApprovalDecision::Denied
        }
    }
}

/// Lifecycle state of a tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolCallStatus {
    PendingApproval,
    Executing,
    Retrying,
    Success,
    Failed,
    Denied,
}

impl ToolCallStatus {
    /// Success, Failed and Denied are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ToolCallStatus::Success | ToolCallStatus::Failed | ToolCallStatus::Denied
        )
    }
}

impl fmt::Display for ToolCallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolCallStatus::PendingApproval => "PENDING_APPROVAL",
            ToolCallStatus::Executing => "EXECUTING",
            ToolCallStatus::Retrying => "RETRYING",
            ToolCallStatus::Success => "SUCCESS",
            ToolCallStatus::Failed => "FAILED",
            ToolCallStatus::Denied => "DENIED",
        };
        write!(f, "{}", s)
    }
}

/// Terminal result of one tool call
///
/// A failed outcome always carries an `error` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub success: bool,
    /// Tool-defined payload on success
    pub result: Option<String>,
    /// Diagnostic on failure
    pub error: Option<String>,
    /// Zero-based attempt index on success, attempts made on failure
    pub retry_count: usize,
    /// True only when the user declined the call
    pub permission_denied: bool,
}

impl ToolCallOutcome {
    pub fn success(result: impl Into<String>, retry_count: usize) -> Self {
        Self {
            success: true,
            result: Some(result.into()),
            error: None,
            retry_count,
            permission_denied: false,
        }
    }

    pub fn failure(error: impl Into<String>, retry_count: usize) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            retry_count,
            permission_denied: false,
        }
    }

    pub fn denied() -> Self {
        Self {
            success: false,
            result: None,
            error: Some(PERMISSION_DENIED_MESSAGE.to_string()),
            retry_count: 0,
            permission_denied: true,
        }
    }

    /// Terminal lifecycle state for this outcome
    pub fn status(&self) -> ToolCallStatus {
        if self.success {
            ToolCallStatus::Success
        } else if self.permission_denied {
            ToolCallStatus::Denied
        } else {
            ToolCallStatus::Failed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_ignore_insertion_order() {
        let a = ToolArguments::new().with("title", "milk").with("priority", 2);
        let b = ToolArguments::new().with("priority", 2).with("title", "milk");
        assert_eq!(a, b);

        let keys: Vec<_> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["priority", "title"]);
    }

    #[test]
    fn test_arguments_keys_are_unique() {
        let mut args = ToolArguments::new().with("title", "milk");
        let previous = args.insert("title", "eggs");
        assert_eq!(previous, Some(ArgValue::from("milk")));
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("title").and_then(ArgValue::as_str), Some("eggs"));
    }

    #[test]
    fn test_arguments_from_json_object() {
        let args = ToolArguments::try_from(json!({
            "title": "Buy milk",
            "priority": 3,
            "done": false,
            "category": null
        }))
        .unwrap();

        assert_eq!(args.get("title"), Some(&ArgValue::from("Buy milk")));
        assert_eq!(args.get("priority").and_then(ArgValue::as_f64), Some(3.0));
        assert_eq!(args.get("done").and_then(ArgValue::as_bool), Some(false));
        assert!(args.get("category").unwrap().is_null());
    }

    #[test]
    fn test_arguments_reject_non_object() {
        let err = ToolArguments::try_from(json!(["a", "b"])).unwrap_err();
        assert_eq!(err, ArgumentError::NotAnObject("array"));
    }

    #[test]
    fn test_arguments_reject_nested_values() {
        let err = ToolArguments::try_from(json!({"tags": ["home"]})).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::NonScalar {
                key: "tags".to_string(),
                kind: "array"
            }
        );
    }

    #[test]
    fn test_arguments_serialize_as_plain_json() {
        let args = ToolArguments::new()
            .with("title", "milk")
            .with("done", true)
            .with("note", None::<String>);
        let json = serde_json::to_value(&args).unwrap();
        assert_eq!(json, json!({"title": "milk", "done": true, "note": null}));
        assert_eq!(args.to_json(), json);

        let parsed: ToolArguments = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, args);
    }

    #[test]
    fn test_arg_value_display() {
        assert_eq!(ArgValue::from("milk").to_string(), "milk");
        assert_eq!(ArgValue::from(2).to_string(), "2");
        assert_eq!(ArgValue::from(1.5).to_string(), "1.5");
        assert_eq!(ArgValue::from(true).to_string(), "true");
        assert_eq!(ArgValue::Null.to_string(), "null");
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = ToolCallRequest::new("addTodo", ToolArguments::new());
        let b = ToolCallRequest::new("addTodo", ToolArguments::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_decision_helpers() {
        assert!(ApprovalDecision::once().is_granted());
        assert!(!ApprovalDecision::once().should_remember());
        assert!(ApprovalDecision::always().should_remember());
        assert!(!ApprovalDecision::Denied.is_granted());
        assert_eq!(ApprovalDecision::from(true), ApprovalDecision::once());
        assert_eq!(ApprovalDecision::from(false), ApprovalDecision::Denied);
    }

    #[test]
    fn test_outcome_status() {
        let cases = [
            (ToolCallOutcome::success("ok", 0), ToolCallStatus::Success),
            (ToolCallOutcome::failure("boom", 1), ToolCallStatus::Failed),
            (ToolCallOutcome::denied(), ToolCallStatus::Denied),
        ];
        for (outcome, expected) in cases {
            assert_eq!(outcome.status(), expected);
            assert!(outcome.status().is_terminal());
        }
        assert!(!ToolCallStatus::PendingApproval.is_terminal());
        assert!(!ToolCallStatus::Retrying.is_terminal());
    }

    #[test]
    fn test_failed_outcomes_always_carry_error() {
        let denied = ToolCallOutcome::denied();
        assert!(!denied.success);
        assert!(denied.permission_denied);
        assert_eq!(denied.error.as_deref(), Some(PERMISSION_DENIED_MESSAGE));

        let failed = ToolCallOutcome::failure("invalid argument", 1);
        assert_eq!(failed.error.as_deref(), Some("invalid argument"));
        assert!(!failed.permission_denied);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ToolCallStatus::PendingApproval.to_string(), "PENDING_APPROVAL");
        assert_eq!(
            serde_json::to_value(ToolCallStatus::PendingApproval).unwrap(),
            json!("PENDING_APPROVAL")
        );
    }
}
