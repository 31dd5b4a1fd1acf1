//! Error types for the credential lifecycle

use std::time::Duration;

/// Errors from checking or refreshing a credential set.
///
/// Every variant's message names the token refresh so the normalized tool
/// output tells an operator which half of the call failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The token endpoint answered with a non-success status.
    #[error("token refresh failed: {status}{}{}", reason_suffix(.status_text), body_suffix(.body))]
    TokenRefresh {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("token refresh request failed: {0}")]
    Http(String),

    #[error("token refresh timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("invalid token refresh response: {0}")]
    InvalidResponse(String),

    /// The stored set cannot be refreshed at all (e.g. no refresh token).
    #[error("cannot perform token refresh: {0}")]
    InvalidCredentials(String),
}

impl Error {
    /// Whether recovery needs the user to authorize the connector again.
    ///
    /// 401/403 and an OAuth `invalid_grant` mean the refresh token itself is
    /// dead; retrying with it cannot succeed.
    pub fn requires_reauthorization(&self) -> bool {
        match self {
            Error::TokenRefresh { status, body, .. } => {
                matches!(status, 401 | 403) || (*status == 400 && body.contains("invalid_grant"))
            }
            Error::InvalidCredentials(_) => true,
            Error::Http(_) | Error::Timeout(_) | Error::InvalidResponse(_) => false,
        }
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Error::TokenRefresh { .. } if self.requires_reauthorization() => "rejected",
            Error::TokenRefresh { .. } => "http_status",
            Error::Http(_) => "network",
            Error::Timeout(_) => "timeout",
            Error::InvalidResponse(_) => "invalid_response",
            Error::InvalidCredentials(_) => "invalid_credentials",
        }
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
    let body = body.trim();
    if body.is_empty() {
        String::new()
    } else {
        format!(": {body}")
    }
}

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;
