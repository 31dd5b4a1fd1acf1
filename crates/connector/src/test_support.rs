//! In-process provider and token endpoint for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use chrono::{TimeDelta, Utc};
use oauth_lifecycle::{CredentialManager, CredentialSet, TokenEndpoint};

/// What the mock saw for one request.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authorization: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Answers every request with a fixed status and body and records it.
#[derive(Clone)]
pub struct MockProvider {
    addr: String,
    status: StatusCode,
    body: String,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockProvider {
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mock = Self {
            addr: format!("http://{addr}"),
            status,
            body: body.into(),
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new().fallback(record).with_state(mock.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        mock
    }

    pub fn url(&self) -> String {
        self.addr.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> SeenRequest {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

async fn record(State(mock): State<MockProvider>, request: Request<Body>) -> (StatusCode, String) {
    mock.calls.fetch_add(1, Ordering::SeqCst);
    let headers: Vec<(String, String)> = request
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
        .collect();
    let authorization = headers
        .iter()
        .find(|(k, _)| k == "authorization")
        .map(|(_, v)| v.clone())
        .unwrap_or_default();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let bytes = axum::body::to_bytes(request.into_body(), 1024 * 1024)
        .await
        .unwrap();
    mock.seen.lock().unwrap().push(SeenRequest {
        method,
        path,
        query,
        authorization,
        headers,
        body: String::from_utf8_lossy(&bytes).to_string(),
    });
    (mock.status, mock.body.clone())
}

/// Credential set good for another hour: `ensure_valid` stays off the network.
pub fn fresh_credentials() -> CredentialSet {
    CredentialSet::new(
        "at_live",
        "rt_live",
        Some(Utc::now() + TimeDelta::hours(1)),
        "client-1",
        "client-secret-1",
    )
}

/// Manager whose token endpoint is unreachable; only usable with fresh tokens.
pub fn fresh_manager() -> Arc<CredentialManager> {
    Arc::new(CredentialManager::new(
        TokenEndpoint::new("http://127.0.0.1:9/oauth/token"),
        fresh_credentials(),
        reqwest::Client::new(),
    ))
}

/// Manager holding an expired set with refresh token `r1`.
pub fn expired_manager(token_url: &str) -> Arc<CredentialManager> {
    Arc::new(CredentialManager::new(
        TokenEndpoint::new(token_url),
        CredentialSet::new(
            "at_expired",
            "r1",
            Some(Utc::now() - TimeDelta::seconds(1)),
            "client-1",
            "client-secret-1",
        ),
        reqwest::Client::new(),
    ))
}
