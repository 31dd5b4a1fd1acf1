//! Normalization boundary
//!
//! Turns a handler's `Result` (or its panic) into the single string the agent
//! sees: pretty JSON on success, `Failed to <operation>: <message>` otherwise.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use common::redact_secrets;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ErrorKind, ToolError, panic_message};

/// Result of one tool call after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(Value),
    Failure { kind: ErrorKind, message: String },
}

impl ToolOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolOutcome::Failure { .. })
    }

    /// The string handed back to the agent.
    pub fn text(&self) -> String {
        match self {
            ToolOutcome::Success(value) => format_success(value),
            ToolOutcome::Failure { message, .. } => message.clone(),
        }
    }

    /// MCP tool result: one text content block plus `isError`.
    pub fn to_call_result(&self) -> CallToolResult {
        CallToolResult {
            content: vec![TextContent::new(self.text())],
            is_error: self.is_error(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl TextContent {
    fn new(text: String) -> Self {
        Self { kind: "text", text }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

/// Pretty-printed JSON; the same value always yields the same text.
pub fn format_success(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// `Failed to <operation>: <message>` with every known secret masked.
pub fn format_failure<S: AsRef<str>>(operation: &str, err: &ToolError, secrets: &[S]) -> String {
    let message = redact_secrets(&err.to_string(), secrets);
    format!("Failed to {operation}: {message}")
}

/// Run a handler future, converting a panic into `ToolError::Unknown`.
pub async fn catch_panics<F>(handler: F) -> Result<Value, ToolError>
where
    F: Future<Output = Result<Value, ToolError>>,
{
    match AssertUnwindSafe(handler).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(ToolError::unknown(format!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_is_pretty_and_round_trips() {
        let payload = json!({"id": 7, "name": "Lunch Run", "splits": [1.5, 2.0]});
        let text = ToolOutcome::Success(payload.clone()).text();

        assert!(text.contains('\n'));
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), payload);
        assert_eq!(text, format_success(&payload));
    }

    #[test]
    fn failure_text_has_operation_prefix() {
        let err = ToolError::http(401, "Unauthorized", "Unauthorized");
        assert_eq!(
            format_failure::<&str>("get activity", &err, &[]),
            "Failed to get activity: HTTP 401 Unauthorized: Unauthorized"
        );
    }

    #[test]
    fn failure_text_masks_secrets() {
        let err = ToolError::unknown("upstream echoed Bearer at_live_123456 back");
        let text = format_failure("list events", &err, &["at_live_123456"]);
        assert!(!text.contains("at_live_123456"), "got: {text}");
        assert!(text.contains("[REDACTED]"), "got: {text}");
    }

    #[test]
    fn call_result_shape() {
        let outcome = ToolOutcome::Failure {
            kind: ErrorKind::Validation,
            message: "Failed to get athlete: invalid arguments: x".into(),
        };
        let value = serde_json::to_value(outcome.to_call_result()).unwrap();
        assert_eq!(
            value,
            json!({
                "content": [{"type": "text", "text": "Failed to get athlete: invalid arguments: x"}],
                "isError": true
            })
        );
    }

    async fn exploding_handler() -> Result<Value, ToolError> {
        panic!("index out of bounds")
    }

    #[tokio::test]
    async fn panics_become_unknown_errors() {
        let err = catch_panics(exploding_handler()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unknown);
        assert_eq!(err.to_string(), "handler panicked: index out of bounds");
    }

    #[tokio::test]
    async fn ordinary_results_pass_through() {
        let value = catch_panics(async { Ok::<_, ToolError>(json!([1, 2])) })
            .await
            .unwrap();
        assert_eq!(value, json!([1, 2]));
    }
}
