//! Credential file persistence
//!
//! The credential set lives in one JSON file. Refreshed sets are written back
//! through `RefreshListener`: each write goes to its own temp file in the same
//! directory and is renamed over the target, so a crash mid-write leaves the
//! previous set intact and concurrent writers never share a temp file.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Error;
use oauth_lifecycle::{CredentialSet, RefreshListener};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Read and parse a credential set.
pub async fn load(path: &Path) -> common::Result<CredentialSet> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Credentials(format!("reading {}: {e}", path.display())))?;
    let credentials: CredentialSet = serde_json::from_str(&contents)
        .map_err(|e| Error::Credentials(format!("parsing {}: {e}", path.display())))?;
    info!(
        path = %path.display(),
        client_id = %credentials.client_id,
        state = credentials.state().label(),
        "loaded credentials"
    );
    Ok(credentials)
}

/// Write a credential set atomically, readable by the owner only.
pub async fn write_atomic(path: &Path, credentials: &CredentialSet) -> common::Result<()> {
    let json = serde_json::to_vec_pretty(credentials)
        .map_err(|e| Error::Credentials(format!("serializing credentials: {e}")))?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || persist(&target, &json))
        .await
        .map_err(|e| Error::Credentials(format!("credential write task failed: {e}")))??;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

fn persist(path: &Path, contents: &[u8]) -> common::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = match path.file_name() {
        Some(name) => format!(".{}.", name.to_string_lossy()),
        None => ".credentials.".to_owned(),
    };

    // tempfile creates the file with mode 0600 on unix, before any byte is written.
    let mut file = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| Error::Credentials(format!("creating temp credential file: {e}")))?;
    file.write_all(contents)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| Error::Credentials(format!("writing temp credential file: {e}")))?;
    file.persist(path)
        .map_err(|e| Error::Credentials(format!("renaming temp credential file: {}", e.error)))?;
    Ok(())
}

/// Persists every refreshed credential set to `path`.
///
/// Writes are serialized. A failed write is logged and otherwise ignored: the
/// refreshed token is already in memory and the call that triggered the
/// refresh proceeds.
pub struct CredentialFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl RefreshListener for CredentialFile {
    fn on_refresh<'a>(
        &'a self,
        credentials: &'a CredentialSet,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            if let Err(e) = write_atomic(&self.path, credentials).await {
                warn!(path = %self.path.display(), error = %e, "failed to persist refreshed token");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use oauth_lifecycle::TokenState;

    fn sample() -> CredentialSet {
        CredentialSet::new(
            "at_sample",
            "rt_sample",
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap()),
            "client-1",
            "secret-1",
        )
    }

    #[tokio::test]
    async fn write_then_load_preserves_the_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");

        write_atomic(&path, &sample()).await.unwrap();
        let loaded = load(&path).await.unwrap();

        assert_eq!(loaded, sample());
    }

    #[tokio::test]
    async fn written_file_uses_camel_case_and_iso_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");

        write_atomic(&path, &sample()).await.unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(raw["accessToken"], "at_sample");
        assert_eq!(raw["refreshToken"], "rt_sample");
        assert_eq!(raw["expiresAt"], "2030-01-02T03:04:05.000Z");
        assert_eq!(raw["tokenType"], "Bearer");
        assert_eq!(raw["clientId"], "client-1");
        assert_eq!(raw["clientSecret"], "secret-1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        write_atomic(&path, &sample()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn no_temp_file_is_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        write_atomic(&path, &sample()).await.unwrap();
        write_atomic(&path, &sample()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        let first = sample();
        let mut second = sample();
        second.refresh_token = common::Secret::new("rt_second".to_string());

        for _ in 0..50 {
            let (a, b) = tokio::join!(write_atomic(&path, &first), write_atomic(&path, &second));
            a.unwrap();
            b.unwrap();
        }

        let loaded = load(&path).await.unwrap();
        assert!(loaded == first || loaded == second);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn listener_serializes_concurrent_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        let listener = std::sync::Arc::new(CredentialFile::new(&path));

        let mut handles = Vec::new();
        for i in 0..8 {
            let listener = std::sync::Arc::clone(&listener);
            let mut set = sample();
            set.access_token = common::Secret::new(format!("at_{i}"));
            handles.push(tokio::spawn(async move { listener.on_refresh(&set).await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let loaded = load(&path).await.unwrap();
        assert!(loaded.access_token.expose().starts_with("at_"));
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn unparsable_expiry_loads_as_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        std::fs::write(
            &path,
            r#"{"accessToken":"a","refreshToken":"r","expiresAt":"soon","clientId":"c"}"#,
        )
        .unwrap();

        let loaded = load(&path).await.unwrap();
        assert_eq!(loaded.expires_at, None);
        assert_eq!(loaded.state(), TokenState::Stale);
        assert!(loaded.client_secret.is_empty());
    }

    #[tokio::test]
    async fn missing_or_malformed_file_is_a_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = load(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(missing, Error::Credentials(_)));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"accessToken\":").unwrap();
        let broken = load(&path).await.unwrap_err();
        assert!(broken.to_string().starts_with("Credential file error: parsing"));
    }

    #[tokio::test]
    async fn listener_persists_refreshed_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strava.json");
        let listener = CredentialFile::new(&path);

        let mut refreshed = sample();
        refreshed.expires_at = Some(Utc.with_ymd_and_hms(2031, 6, 1, 12, 0, 0).unwrap());
        listener.on_refresh(&refreshed).await;

        assert_eq!(load(&path).await.unwrap(), refreshed);
    }

    #[tokio::test]
    async fn listener_survives_unwritable_path() {
        let listener = CredentialFile::new("/nonexistent/dir/strava.json");
        listener.on_refresh(&sample()).await;
    }
}
