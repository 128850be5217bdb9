//! Auditable record of a finished tool call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ToolArguments, ToolCallOutcome, ToolCallRequest, ToolCallStatus};

/// What the conversation layer persists for each tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: Uuid,
    pub tool_name: String,
    pub arguments: ToolArguments,
    pub status: ToolCallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub retry_count: usize,
    pub created_at: DateTime<Utc>,
}

impl ToolCallRecord {
    pub fn new(request: &ToolCallRequest, outcome: &ToolCallOutcome) -> Self {
        Self {
            id: request.id,
            tool_name: request.tool_name.clone(),
            arguments: request.arguments.clone(),
            status: outcome.status(),
            result: outcome.result.clone(),
            error: outcome.error.clone(),
            retry_count: outcome.retry_count,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_success() {
        let request = ToolCallRequest::new("addTodo", ToolArguments::new().with("title", "milk"));
        let record = ToolCallRecord::new(&request, &ToolCallOutcome::success("Added 'milk'", 1));

        assert_eq!(record.id, request.id);
        assert_eq!(record.status, ToolCallStatus::Success);
        assert_eq!(record.result.as_deref(), Some("Added 'milk'"));
        assert_eq!(record.retry_count, 1);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], json!("SUCCESS"));
        assert_eq!(json["arguments"], json!({"title": "milk"}));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_record_from_denial() {
        let request = ToolCallRequest::new("deleteTodo", ToolArguments::new().with("id", 7));
        let record = ToolCallRecord::new(&request, &ToolCallOutcome::denied());
        assert_eq!(record.status, ToolCallStatus::Denied);
        assert_eq!(record.error.as_deref(), Some("Permission denied by user"));

        let json = serde_json::to_string(&record).unwrap();
        let parsed: ToolCallRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
