//! Tool failure taxonomy
//!
//! Everything that can go wrong inside a tool handler ends up as one of four
//! variants. The normalization boundary turns them into text; nothing here
//! escapes a handler as an error.

use serde::Serialize;

/// Longest provider error body kept in a message.
const MAX_BODY_CHARS: usize = 500;

/// Why a tool call failed.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Arguments rejected before any credential or network work.
    #[error("invalid arguments: {0}")]
    Validation(String),

    /// Credential check or token refresh failed.
    #[error(transparent)]
    Auth(#[from] oauth_lifecycle::Error),

    /// Provider answered with a non-success status.
    #[error("HTTP {status}{}{}", reason_suffix(.status_text), body_suffix(.body))]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Network failure, timeout, unparsable response, or a panicking handler.
    #[error("{0}")]
    Unknown(String),
}

/// Category of a `ToolError`, for metrics and structured results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Http,
    Unknown,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Http => "http",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    /// Build an `Http` error, trimming the body to a readable length.
    pub fn http(status: u16, status_text: impl Into<String>, body: &str) -> Self {
        Self::Http {
            status,
            status_text: status_text.into(),
            body: truncate_chars(body.trim(), MAX_BODY_CHARS),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Validation(_) => ErrorKind::Validation,
            ToolError::Auth(_) => ErrorKind::Auth,
            ToolError::Http { .. } => ErrorKind::Http,
            ToolError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status from the provider, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ToolError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// A tool definition that cannot be registered.
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("tool `{tool}`: invalid input schema: {message}")]
    Schema { tool: String, message: String },

    #[error("tool `{tool}`: invalid path template: {message}")]
    Path { tool: String, message: String },

    #[error("tool `{tool}`: unsupported HTTP method `{method}`")]
    Method { tool: String, method: String },

    #[error("duplicate tool name `{0}`")]
    Duplicate(String),
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Unknown(format!("JSON error: {e}"))
    }
}

/// Unregistered statuses have no reason phrase.
fn reason_suffix(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!(" {text}")
    }
}

fn body_suffix(body: &str) -> String {
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_owned(),
    }
}

/// Reduce a caught panic payload to a message.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked with a non-string payload".to_owned()
    }
}
