//! Credential set for one connector instance
//!
//! The wire shape is camelCase JSON with `expiresAt` as an RFC 3339 string.
//! An `expiresAt` that is missing or cannot be parsed deserializes to `None`,
//! which every check treats as already expired.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use common::Secret;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TOKEN_TYPE, SAFETY_MARGIN};
use crate::token::TokenResponse;

/// OAuth2 token bundle plus the client identity used to refresh it.
///
/// `client_id` and `client_secret` never change after construction; the other
/// fields are rewritten by `apply_refresh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    #[serde(default, with = "expiry")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub client_id: String,
    #[serde(default = "empty_secret")]
    pub client_secret: Secret<String>,
}

fn default_token_type() -> String {
    DEFAULT_TOKEN_TYPE.to_owned()
}

fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

/// Freshness of the access token, derived from `expires_at` on every check.
///
/// ```text
/// Valid ──(time passes)──► Stale ──ensure_valid──► refreshing
///   ▲                                                 │
///   └──────────────── token response ◄────────────────┤
///                                                     └──► refresh error
/// ```
///
/// The refreshing and failed states only exist for the duration of an
/// `ensure_valid` call and are not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    /// At least `SAFETY_MARGIN` of lifetime left.
    Valid,
    /// Inside the margin, past expiry, or expiry unknown.
    Stale,
}

impl TokenState {
    pub fn label(&self) -> &'static str {
        match self {
            TokenState::Valid => "valid",
            TokenState::Stale => "stale",
        }
    }
}

impl CredentialSet {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            access_token: Secret::new(access_token.into()),
            refresh_token: Secret::new(refresh_token.into()),
            expires_at,
            token_type: default_token_type(),
            client_id: client_id.into(),
            client_secret: Secret::new(client_secret.into()),
        }
    }

    /// Lifetime left at `now`; negative once expired, `None` when unknown.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.expires_at.map(|expires| expires - now)
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> TokenState {
        let margin = TimeDelta::from_std(SAFETY_MARGIN).unwrap_or(TimeDelta::MAX);
        match self.remaining_at(now) {
            Some(remaining) if remaining >= margin => TokenState::Valid,
            _ => TokenState::Stale,
        }
    }

    pub fn state(&self) -> TokenState {
        self.state_at(Utc::now())
    }

    /// Fold a successful token response into this set.
    ///
    /// The refresh token and token type are only replaced when the provider
    /// sent new ones.
    pub fn apply_refresh(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        let seconds = i64::try_from(response.expires_in).unwrap_or(i64::MAX);
        let lifetime = TimeDelta::try_seconds(seconds).unwrap_or(TimeDelta::MAX);

        self.access_token = Secret::new(response.access_token);
        self.expires_at = Some(
            now.checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        if let Some(refresh) = response.refresh_token {
            self.refresh_token = Secret::new(refresh);
        }
        if let Some(token_type) = response.token_type {
            self.token_type = token_type;
        }
    }

    /// `Authorization` header value, e.g. `Bearer at_123`.
    pub fn authorization(&self) -> String {
        let token_type = if self.token_type.is_empty() {
            DEFAULT_TOKEN_TYPE
        } else {
            self.token_type.as_str()
        };
        format!("{token_type} {}", self.access_token.expose())
    }

    /// Every value that must never show up in tool output or logs.
    pub fn secret_values(&self) -> Vec<String> {
        [
            &self.access_token,
            &self.refresh_token,
            &self.client_secret,
        ]
        .into_iter()
        .map(|s| s.expose().clone())
        .filter(|s| !s.is_empty())
        .collect()
    }
}

/// RFC 3339 (de)serialization for `expires_at` that never fails.
///
/// Unix milliseconds are accepted as well since several connectors store
/// `Date.now()`-style numbers.
mod expiry {
    use super::*;
    use serde::{Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw.as_ref().and_then(parse))
    }

    fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|at| at.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        }
    }
}
