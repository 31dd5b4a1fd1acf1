//! Credential lifecycle manager
//!
//! Holds one connector instance's `CredentialSet` behind an async lock and
//! guarantees callers get a token with at least `SAFETY_MARGIN` of life left.
//! Refreshed values are written back in place, so every clone of the shared
//! handle sees them.
//!
//! Concurrent refresh: in `RefreshMode::Concurrent` (the default) two calls
//! that both observe a stale token will both hit the token endpoint; the last
//! response wins. Providers that rotate refresh tokens on every use may reject
//! the loser's refresh token afterwards. `RefreshMode::SingleFlight` puts the
//! refresh behind a gate and re-checks freshness once inside it, so only the
//! first caller refreshes.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::credentials::{CredentialSet, TokenState};
use crate::endpoint::TokenEndpoint;
use crate::error::{Error, Result};
use crate::token;

/// Whether concurrent stale-token observers may refresh in parallel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    #[default]
    Concurrent,
    SingleFlight,
}

/// Notified after every successful refresh with the updated set.
///
/// This is the seam for persistence: the lifecycle manager never writes
/// credentials anywhere itself. `on_refresh` runs while the manager holds its
/// write lock, so it must not call back into the manager.
pub trait RefreshListener: Send + Sync {
    fn on_refresh<'a>(
        &'a self,
        credentials: &'a CredentialSet,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// Owns one provider's credential set and refreshes it on demand.
pub struct CredentialManager {
    endpoint: TokenEndpoint,
    http_client: reqwest::Client,
    credentials: Arc<RwLock<CredentialSet>>,
    mode: RefreshMode,
    refresh_gate: Mutex<()>,
    listener: Option<Arc<dyn RefreshListener>>,
}

impl CredentialManager {
    pub fn new(
        endpoint: TokenEndpoint,
        credentials: CredentialSet,
        http_client: reqwest::Client,
    ) -> Self {
        info!(
            token_url = %endpoint.url,
            client_id = %credentials.client_id,
            state = credentials.state().label(),
            "credential manager initialized"
        );
        Self {
            endpoint,
            http_client,
            credentials: Arc::new(RwLock::new(credentials)),
            mode: RefreshMode::default(),
            refresh_gate: Mutex::new(()),
            listener: None,
        }
    }

    pub fn with_refresh_mode(mut self, mode: RefreshMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn RefreshListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn endpoint(&self) -> &TokenEndpoint {
        &self.endpoint
    }

    pub fn refresh_mode(&self) -> RefreshMode {
        self.mode
    }

    /// Shared handle to the live credential set.
    pub fn shared(&self) -> Arc<RwLock<CredentialSet>> {
        Arc::clone(&self.credentials)
    }

    /// Copy of the current set. Does not refresh.
    pub async fn snapshot(&self) -> CredentialSet {
        self.credentials.read().await.clone()
    }

    pub async fn state(&self) -> TokenState {
        self.credentials.read().await.state()
    }

    /// Current token and secret values, for scrubbing outgoing text.
    pub async fn secret_values(&self) -> Vec<String> {
        self.credentials.read().await.secret_values()
    }

    /// Return credentials that stay valid for at least the safety margin,
    /// refreshing first if needed.
    ///
    /// Must complete before the authenticated request it guards is built.
    pub async fn ensure_valid(&self) -> Result<CredentialSet> {
        let current = self.snapshot().await;
        if current.state_at(Utc::now()) == TokenState::Valid {
            return Ok(current);
        }

        debug!(
            client_id = %current.client_id,
            expires_at = ?current.expires_at,
            "access token stale, refreshing before use"
        );

        match self.mode {
            RefreshMode::Concurrent => self.refresh_from(current).await,
            RefreshMode::SingleFlight => {
                let _gate = self.refresh_gate.lock().await;
                let latest = self.snapshot().await;
                if latest.state_at(Utc::now()) == TokenState::Valid {
                    debug!("token refreshed by a concurrent caller");
                    return Ok(latest);
                }
                self.refresh_from(latest).await
            }
        }
    }

    /// Refresh unconditionally.
    pub async fn refresh(&self) -> Result<CredentialSet> {
        match self.mode {
            RefreshMode::Concurrent => self.refresh_from(self.snapshot().await).await,
            RefreshMode::SingleFlight => {
                let _gate = self.refresh_gate.lock().await;
                self.refresh_from(self.snapshot().await).await
            }
        }
    }

    async fn refresh_from(&self, current: CredentialSet) -> Result<CredentialSet> {
        if current.refresh_token.is_empty() {
            metrics::counter!("oauth_token_refreshes_total", "outcome" => "invalid_credentials")
                .increment(1);
            return Err(Error::InvalidCredentials(
                "no refresh token stored; the connector must be authorized again".into(),
            ));
        }

        let result = token::refresh_token(
            &self.http_client,
            &self.endpoint,
            &current.client_id,
            current.client_secret.expose(),
            current.refresh_token.expose(),
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                metrics::counter!("oauth_token_refreshes_total", "outcome" => e.label())
                    .increment(1);
                warn!(
                    client_id = %current.client_id,
                    error = %e,
                    reauthorize = e.requires_reauthorization(),
                    "token refresh failed"
                );
                return Err(e);
            }
        };

        let rotated = response.refresh_token.is_some();
        let updated = {
            let mut credentials = self.credentials.write().await;
            credentials.apply_refresh(response, Utc::now());
            // Notify under the write lock: persisted sets follow the same order
            // as in-memory updates, so an older set is never written last.
            if let Some(listener) = &self.listener {
                listener.on_refresh(&credentials).await;
            }
            credentials.clone()
        };

        metrics::counter!("oauth_token_refreshes_total", "outcome" => "success").increment(1);
        info!(
            client_id = %updated.client_id,
            expires_at = ?updated.expires_at,
            rotated,
            "token refresh succeeded"
        );
        Ok(updated)
    }
}
