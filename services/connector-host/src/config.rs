//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret may come from `CONNECTOR_CLIENT_SECRET`, from
//! `client_secret_file`, or inline; it is held in a `Secret` either way.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use common::Secret;
use connector::{HeaderInjection, RestToolDef};
use oauth_lifecycle::{BodyEncoding, RefreshMode, RequestFields, ResponseFields};
use serde::Deserialize;

/// Env var that overrides every other client secret source.
pub const CLIENT_SECRET_ENV: &str = "CONNECTOR_CLIENT_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub api: ApiConfig,
    #[serde(default)]
    pub tools: Vec<RestToolDef>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Bound on one provider call, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Token endpoint and credential storage
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub token_url: String,
    /// Overrides the `clientId` stored in the credentials file.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<Secret<String>>,
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub encoding: BodyEncoding,
    #[serde(default)]
    pub refresh_mode: RefreshMode,
    /// JSON credential set; rewritten after every successful refresh.
    pub credentials_file: PathBuf,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub fields: FieldNames,
}

/// Renamed request/response fields for non-standard token endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct FieldNames {
    #[serde(default)]
    pub request: RequestFields,
    #[serde(default)]
    pub response: ResponseFields,
}

/// Provider API the tools talk to
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// Connector identifier, used in logs and `/health`.
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub headers: Vec<HeaderInjection>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_connections() -> usize {
    256
}

/// Absolute http(s) URL with a host.
fn is_http_url(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. `CONNECTOR_CLIENT_SECRET` env var
    /// 2. `client_secret_file` path from config
    /// 3. inline `client_secret`
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !is_http_url(&self.oauth.token_url) {
            return Err(common::Error::config(format!(
                "token_url must be an absolute http:// or https:// URL, got: {}",
                self.oauth.token_url
            )));
        }
        if !is_http_url(&self.api.base_url) {
            return Err(common::Error::config(format!(
                "base_url must be an absolute http:// or https:// URL, got: {}",
                self.api.base_url
            )));
        }
        if self.api.name.trim().is_empty() {
            return Err(common::Error::config("api.name must not be empty"));
        }
        if self.server.timeout_secs == 0 {
            return Err(common::Error::config(
                "server.timeout_secs must be greater than 0",
            ));
        }
        if self.oauth.timeout_secs == 0 {
            return Err(common::Error::config(
                "oauth.timeout_secs must be greater than 0",
            ));
        }
        if self.server.max_connections == 0 {
            return Err(common::Error::config(
                "max_connections must be greater than 0",
            ));
        }
        if self.tools.is_empty() {
            return Err(common::Error::config("at least one [[tools]] entry is required"));
        }
        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("connector-host.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn valid_toml() -> String {
        r#"
[server]
listen_addr = "127.0.0.1:8080"

[oauth]
token_url = "https://www.strava.com/oauth/token"
client_id = "12345"
client_secret = "inline-secret"
credentials_file = "/var/lib/connector/strava.json"

[api]
name = "strava"
base_url = "https://www.strava.com/api/v3"

[[api.headers]]
name = "x-api-version"
value = "3"

[[tools]]
name = "get_activity"
description = "Fetch one activity"
operation = "get activity"
path = "activities/{id}"

[tools.input_schema]
type = "object"
required = ["id"]

[tools.input_schema.properties.id]
type = "integer"
"#
        .to_string()
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("connector-host.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_valid_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, &valid_toml());

        let config = Config::load(&path).unwrap();

        assert_eq!(config.server.timeout_secs, 30);
        assert_eq!(config.server.max_connections, 256);
        assert_eq!(config.oauth.client_id.as_deref(), Some("12345"));
        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "inline-secret"
        );
        assert_eq!(config.oauth.encoding, BodyEncoding::Json);
        assert_eq!(config.oauth.refresh_mode, RefreshMode::Concurrent);
        assert_eq!(config.oauth.fields.request, RequestFields::default());
        assert_eq!(config.api.headers.len(), 1);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].method, "GET");
        assert_eq!(
            config.tools[0].input_schema.as_ref().unwrap()["properties"]["id"]["type"],
            "integer"
        );
    }

    #[test]
    fn test_optional_oauth_settings() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let contents = valid_toml().replace(
            "credentials_file = \"/var/lib/connector/strava.json\"",
            r#"credentials_file = "/var/lib/connector/strava.json"
encoding = "form"
refresh_mode = "single_flight"
timeout_secs = 10

[oauth.fields.request]
refresh_token = "refreshToken"

[oauth.fields.response]
expires_in = "expires""#,
        );
        let path = write_config(&dir, &contents);

        let config = Config::load(&path).unwrap();

        assert_eq!(config.oauth.encoding, BodyEncoding::Form);
        assert_eq!(config.oauth.refresh_mode, RefreshMode::SingleFlight);
        assert_eq!(config.oauth.timeout_secs, 10);
        assert_eq!(config.oauth.fields.request.refresh_token, "refreshToken");
        assert_eq!(config.oauth.fields.request.client_id, "client_id");
        assert_eq!(config.oauth.fields.response.expires_in, "expires");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, &valid_toml());

        unsafe { set_env(CLIENT_SECRET_ENV, "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "env-secret"
        );
    }

    #[test]
    fn test_client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let contents = valid_toml().replace(
            "client_secret = \"inline-secret\"",
            &format!("client_secret_file = \"{}\"", secret_path.display()),
        );
        let path = write_config(&dir, &contents);

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.oauth.client_secret.as_ref().unwrap().expose(),
            "file-secret"
        );
    }

    #[test]
    fn test_client_secret_file_missing_is_an_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let contents = valid_toml().replace(
            "client_secret = \"inline-secret\"",
            "client_secret_file = \"/nonexistent/client_secret\"",
        );
        let path = write_config(&dir, &contents);

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("client_secret_file"), "got: {err}");
    }

    #[test]
    fn test_secret_never_printed_in_debug() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, &valid_toml());

        let config = Config::load(&path).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("inline-secret"), "got: {debug}");
    }

    #[test]
    fn test_invalid_urls_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(
            &dir,
            &valid_toml().replace("https://www.strava.com/oauth/token", "strava.com/oauth"),
        );
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("token_url must be an absolute http"), "got: {err}");

        let path = write_config(
            &dir,
            &valid_toml().replace("https://www.strava.com/api/v3", "ftp://strava.com"),
        );
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("base_url must be an absolute http"), "got: {err}");

        // Scheme prefix alone is not enough: the URL must parse with a host.
        let path = write_config(
            &dir,
            &valid_toml().replace("https://www.strava.com/api/v3", "https://"),
        );
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("base_url must be an absolute http"), "got: {err}");
    }

    #[test]
    fn http_url_check_parses_the_url() {
        assert!(is_http_url("https://www.strava.com/api/v3"));
        assert!(is_http_url("http://127.0.0.1:9/token"));
        assert!(is_http_url("HTTPS://example.com"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ftp://example.com"));
        assert!(!is_http_url("http//example.com"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &valid_toml().replace(
                "listen_addr = \"127.0.0.1:8080\"",
                "listen_addr = \"127.0.0.1:8080\"\ntimeout_secs = 0",
            ),
        );
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");

        let path = write_config(
            &dir,
            &valid_toml().replace(
                "listen_addr = \"127.0.0.1:8080\"",
                "listen_addr = \"127.0.0.1:8080\"\nmax_connections = 0",
            ),
        );
        assert!(Config::load(&path).is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn test_config_without_tools_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let contents = valid_toml();
        let without_tools = &contents[..contents.find("[[tools]]").unwrap()];
        let path = write_config(&dir, without_tools);

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("[[tools]]"), "got: {err}");
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("connector-host.toml"));
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }
}
