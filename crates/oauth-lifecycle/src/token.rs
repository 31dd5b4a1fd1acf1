//! OAuth token refresh
//!
//! One POST to the provider's token endpoint with the refresh_token grant.
//! The response is read through the endpoint's `ResponseFields` so providers
//! with renamed fields need no code of their own. A single attempt is made;
//! retry policy belongs to whoever called the tool.

use reqwest::header::ACCEPT;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::REFRESH_GRANT_TYPE;
use crate::endpoint::{BodyEncoding, ResponseFields, TokenEndpoint};
use crate::error::{Error, Result};

/// Parsed token endpoint response.
///
/// `expires_in` is a delta in seconds from the response time. Optional fields
/// are `None` when the provider omitted them (or sent null/empty), in which
/// case the stored values are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    pub token_type: Option<String>,
}

impl TokenResponse {
    /// Read a token response out of a JSON object using `fields` for names.
    pub fn from_json(value: &Value, fields: &ResponseFields) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidResponse("expected a JSON object".into()))?;

        let access_token = non_empty_string(object, &fields.access_token).ok_or_else(|| {
            Error::InvalidResponse(format!("missing `{}`", fields.access_token))
        })?;

        let expires_in = object
            .get(&fields.expires_in)
            .and_then(parse_seconds)
            .ok_or_else(|| {
                Error::InvalidResponse(format!(
                    "missing or non-numeric `{}`",
                    fields.expires_in
                ))
            })?;

        Ok(Self {
            access_token,
            refresh_token: non_empty_string(object, &fields.refresh_token),
            expires_in,
            token_type: non_empty_string(object, &fields.token_type),
        })
    }
}

fn non_empty_string(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Accept `3600`, `3600.0` and `"3600"`; reject negatives and non-numbers.
fn parse_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
}

/// Exchange a refresh token for a new access token.
///
/// `client_secret` is left out of the body when empty (public clients).
pub async fn refresh_token(
    client: &reqwest::Client,
    endpoint: &TokenEndpoint,
    client_id: &str,
    client_secret: &str,
    refresh: &str,
) -> Result<TokenResponse> {
    let fields = &endpoint.request;
    let mut params: Vec<(&str, &str)> = vec![
        (fields.client_id.as_str(), client_id),
        (fields.grant_type.as_str(), REFRESH_GRANT_TYPE),
        (fields.refresh_token.as_str(), refresh),
    ];
    if !client_secret.is_empty() {
        params.push((fields.client_secret.as_str(), client_secret));
    }

    let request = client
        .post(&endpoint.url)
        .header(ACCEPT, "application/json")
        .timeout(endpoint.timeout);
    let request = match endpoint.encoding {
        BodyEncoding::Json => {
            let body: Map<String, Value> = params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
                .collect();
            request.json(&body)
        }
        BodyEncoding::Form => request.form(&params),
    };

    debug!(url = %endpoint.url, encoding = ?endpoint.encoding, "requesting token refresh");
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            Error::Timeout(endpoint.timeout)
        } else {
            Error::Http(e.without_url().to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenRefresh {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            body,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::InvalidResponse(format!("reading body: {e}")))?;
    let value: Value = serde_json::from_str(&body)
        .map_err(|e| Error::InvalidResponse(format!("body is not JSON: {e}")))?;
    TokenResponse::from_json(&value, &endpoint.response)
}
