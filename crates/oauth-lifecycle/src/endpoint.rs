//! Per-provider token endpoint description
//!
//! Providers agree on the refresh_token grant but disagree on the details:
//! some want a JSON body, some form-urlencoded, and a few rename the fields.
//! `TokenEndpoint` carries those differences so one refresh implementation
//! serves every connector.

use std::time::Duration;

use serde::Deserialize;

use crate::constants::DEFAULT_REFRESH_TIMEOUT;

/// How the refresh request body is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyEncoding {
    #[default]
    Json,
    Form,
}

/// Field names sent in the refresh request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestFields {
    pub client_id: String,
    pub client_secret: String,
    pub grant_type: String,
    pub refresh_token: String,
}

impl Default for RequestFields {
    fn default() -> Self {
        Self {
            client_id: "client_id".into(),
            client_secret: "client_secret".into(),
            grant_type: "grant_type".into(),
            refresh_token: "refresh_token".into(),
        }
    }
}

/// Field names read from the token response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResponseFields {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub token_type: String,
}

impl Default for ResponseFields {
    fn default() -> Self {
        Self {
            access_token: "access_token".into(),
            refresh_token: "refresh_token".into(),
            expires_in: "expires_in".into(),
            token_type: "token_type".into(),
        }
    }
}

/// Where and how to refresh tokens for one provider.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub url: String,
    pub encoding: BodyEncoding,
    pub request: RequestFields,
    pub response: ResponseFields,
    pub timeout: Duration,
}

impl TokenEndpoint {
    /// Standard OAuth2 field names, JSON body, default timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            encoding: BodyEncoding::default(),
            request: RequestFields::default(),
            response: ResponseFields::default(),
            timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_request_fields(mut self, fields: RequestFields) -> Self {
        self.request = fields;
        self
    }

    pub fn with_response_fields(mut self, fields: ResponseFields) -> Self {
        self.response = fields;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
