//! Build the configured connector
//!
//! Loads the credential file, applies client identity overrides from config,
//! wires persistence into the credential manager, and registers one
//! `RestTool` per `[[tools]]` entry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use connector::{ApiClient, Connector, RestTool};
use oauth_lifecycle::{CredentialManager, TokenEndpoint};
use tracing::info;

use crate::config::Config;
use crate::credential_file::{self, CredentialFile};

pub async fn build_connector(config: &Config) -> Result<Connector> {
    let oauth = &config.oauth;

    let mut credentials = credential_file::load(&oauth.credentials_file)
        .await
        .with_context(|| {
            format!(
                "failed to load credentials from {}",
                oauth.credentials_file.display()
            )
        })?;
    if let Some(client_id) = &oauth.client_id {
        credentials.client_id = client_id.clone();
    }
    if let Some(client_secret) = &oauth.client_secret {
        credentials.client_secret = client_secret.clone();
    }
    if credentials.client_id.trim().is_empty() {
        bail!("no client_id in config or credentials file");
    }

    let endpoint = TokenEndpoint::new(&oauth.token_url)
        .with_encoding(oauth.encoding)
        .with_request_fields(oauth.fields.request.clone())
        .with_response_fields(oauth.fields.response.clone())
        .with_timeout(Duration::from_secs(oauth.timeout_secs));

    let http_client = reqwest::Client::new();
    let manager = CredentialManager::new(endpoint, credentials, http_client.clone())
        .with_refresh_mode(oauth.refresh_mode)
        .with_listener(Arc::new(CredentialFile::new(&oauth.credentials_file)));

    let client = ApiClient::new(&config.api.base_url, Arc::new(manager), http_client)
        .with_timeout(Duration::from_secs(config.server.timeout_secs))
        .with_headers(&config.api.headers);

    let mut connector = Connector::new(&config.api.name, client);
    for def in &config.tools {
        let tool = RestTool::new(def.clone()).context("invalid tool definition")?;
        connector
            .register(Arc::new(tool))
            .context("invalid tool definition")?;
    }

    info!(
        connector = %connector.id(),
        tools = config.tools.len(),
        refresh_mode = ?oauth.refresh_mode,
        "connector ready"
    );
    Ok(connector)
}
