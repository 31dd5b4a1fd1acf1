//! Authenticated provider HTTP client
//!
//! Every request goes through `CredentialManager::ensure_valid` first, then
//! carries the resulting `Authorization` header. Non-success responses become
//! `ToolError::Http` here, so handlers only ever see typed failures.

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use oauth_lifecycle::CredentialManager;
use reqwest::{Method, Url};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ToolError;

/// Default bound on one provider call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Static header added to every provider request (e.g. an API version).
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderInjection {
    pub name: String,
    pub value: String,
}

/// One provider call, relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Provider client bound to one connector instance's credentials.
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
    credentials: Arc<CredentialManager>,
    headers: HeaderMap,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<CredentialManager>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http_client,
            credentials,
            headers: HeaderMap::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add static headers. Invalid names/values are skipped with a warning and
    /// `Authorization` is never overridden: it always comes from the
    /// credential set.
    pub fn with_headers(mut self, injections: &[HeaderInjection]) -> Self {
        for injection in injections {
            let name = match HeaderName::from_str(&injection.name) {
                Ok(n) => n,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header name");
                    continue;
                }
            };
            if name == AUTHORIZATION {
                warn!(header = %injection.name, "refusing to override authorization header");
                continue;
            }
            let value = match HeaderValue::from_str(&injection.value) {
                Ok(v) => v,
                Err(e) => {
                    warn!(header = %injection.name, error = %e, "skipping invalid header value");
                    continue;
                }
            };
            self.headers.insert(name, value);
        }
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    fn url_for(&self, path: &str) -> Result<Url, ToolError> {
        let invalid = |e: &dyn std::fmt::Display| {
            ToolError::unknown(format!("invalid provider URL for {path}: {e}"))
        };
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return Url::parse(&self.base_url).map_err(|e| invalid(&e));
        }
        // With a trailing slash the base is a directory and `join` appends to it.
        let base = Url::parse(&format!("{}/", self.base_url)).map_err(|e| invalid(&e))?;
        base.join(relative).map_err(|e| invalid(&e))
    }

    /// Validate credentials, send the request, and decode a JSON response.
    ///
    /// An empty success body decodes to `Value::Null`.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, ToolError> {
        let url = self.url_for(&request.path)?;
        let credentials = self.credentials.ensure_valid().await?;
        let authorization = HeaderValue::from_str(&credentials.authorization()).map_err(|_| {
            ToolError::unknown("stored access token is not a valid header value")
        })?;

        let mut builder = self
            .http_client
            .request(request.method.clone(), url)
            .headers(self.headers.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization)
            .timeout(self.timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::unknown(format!(
                    "request to {} timed out after {}s",
                    request.path,
                    self.timeout.as_secs()
                ))
            } else {
                ToolError::unknown(format!(
                    "request to {} failed: {}",
                    request.path,
                    e.without_url()
                ))
            }
        })?;

        let status = response.status();
        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "provider responded"
        );

        let body = response
            .text()
            .await
            .map_err(|e| ToolError::unknown(format!("reading response body failed: {e}")))?;

        if !status.is_success() {
            return Err(ToolError::http(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                &body,
            ));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body)
            .map_err(|e| ToolError::unknown(format!("response is not valid JSON: {e}")))
    }
}
