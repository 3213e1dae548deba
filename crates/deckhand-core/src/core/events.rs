//! Event and tool-result contracts.
//!
//! `StreamEvent` is what the calling transport sees for a turn. `init` is
//! always first and exactly one of `complete` / `error` is last.
//! `ToolOutput` is what the reasoning runtime sees for a tool call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Events emitted while a turn runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Turn accepted; carries the backend session id.
    Init { message: String, session_id: String },

    /// Progress note for the user.
    Status { message: String },

    /// Assistant text without tool calls.
    Assistant { text: String },

    /// Assistant message that issued tool calls.
    ToolUse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        tool_calls: Vec<ToolCallSummary>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        friendly: Vec<String>,
    },

    /// Terminal failure for the turn.
    Error { error: String },

    /// Terminal success for the turn.
    Complete {
        success: bool,
        /// Last assistant text.
        result: String,
        message_count: usize,
        /// Continuation token from the reasoning runtime.
        #[serde(default)]
        session_id: Option<String>,
        user_session_id: String,
        slide_count: usize,
        applied_edit_count: usize,
    },
}

impl StreamEvent {
    pub fn status(message: impl Into<String>) -> Self {
        StreamEvent::Status {
            message: message.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        StreamEvent::Error {
            error: error.into(),
        }
    }

    /// Returns true for `complete` and `error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete { .. } | StreamEvent::Error { .. })
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Init { .. } => "init",
            StreamEvent::Status { .. } => "status",
            StreamEvent::Assistant { .. } => "assistant",
            StreamEvent::ToolUse { .. } => "tool_use",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Complete { .. } => "complete",
        }
    }
}

/// One tool call inside a `tool_use` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallSummary {
    pub name: String,
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly: Option<String>,
}

/// Result of a tool call.
///
/// Serializes as `{"success": true, ...fields}` or `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    Success(Map<String, Value>),
    Failure(String),
}

impl Serialize for ToolOutput {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        match self {
            ToolOutput::Success(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("success", &true)?;
                for (key, value) in fields {
                    if key != "success" {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            ToolOutput::Failure(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ToolOutput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        if let Some(error) = fields.remove("error") {
            let message = match error {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(ToolOutput::Failure(message));
        }
        fields.remove("success");
        Ok(ToolOutput::Success(fields))
    }
}

impl ToolOutput {
    /// Creates a successful output. Non-object data is wrapped as `result`.
    pub fn success(data: Value) -> Self {
        match data {
            Value::Object(fields) => ToolOutput::Success(fields),
            Value::Null => ToolOutput::Success(Map::new()),
            other => {
                let mut fields = Map::new();
                fields.insert("result".to_string(), other);
                ToolOutput::Success(fields)
            }
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        ToolOutput::Failure(message.into())
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ToolOutput::Success(_))
    }

    /// Returns a field of a successful output.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            ToolOutput::Success(fields) => fields.get(key),
            ToolOutput::Failure(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ToolOutput::Success(_) => None,
            ToolOutput::Failure(message) => Some(message),
        }
    }

    /// Serializes for the reasoning runtime.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"error":"Failed to serialize tool output"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_success_serializes_flat_with_flag() {
        let output = ToolOutput::success(json!({"slide_index": 2, "edit_id": "e1"}));
        let value: Value = serde_json::from_str(&output.to_json_string()).unwrap();
        assert_eq!(
            value,
            json!({"success": true, "slide_index": 2, "edit_id": "e1"})
        );
    }

    #[test]
    fn test_failure_serializes_error_only() {
        let output = ToolOutput::failure("No active session");
        assert_eq!(output.to_json_string(), r#"{"error":"No active session"}"#);

        let parsed: ToolOutput = serde_json::from_str(&output.to_json_string()).unwrap();
        assert_eq!(parsed.error_message(), Some("No active session"));
    }

    #[test]
    fn test_scalar_success_is_wrapped() {
        let output = ToolOutput::success(json!(3));
        assert_eq!(output.get("result"), Some(&json!(3)));
    }

    #[test]
    fn test_stream_event_tags() {
        let event = StreamEvent::Init {
            message: "Starting agent...".to_string(),
            session_id: "s1".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["session_id"], "s1");

        let event = StreamEvent::ToolUse {
            text: None,
            tool_calls: vec![ToolCallSummary {
                name: "commit_edits".to_string(),
                input: json!({}),
                friendly: Some("Saving changes...".to_string()),
            }],
            friendly: vec!["Saving changes...".to_string()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert!(value.get("text").is_none());
        assert_eq!(value["tool_calls"][0]["name"], "commit_edits");
    }

    #[test]
    fn test_terminal_events() {
        assert!(StreamEvent::error("boom").is_terminal());
        assert!(!StreamEvent::status("working").is_terminal());
    }
}
