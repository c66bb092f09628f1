//! On-disk state under `~/.filen-cli`.
//!
//! Three kinds of artifacts live here: the credentials file, per-batch
//! resume state, and the WebDAV daemon's PID/config files. Every write is a
//! whole-file replacement through a temp file in the same directory followed
//! by a rename, so a crash can never leave a half-written file behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Directory name under the home directory.
const DATA_DIR_NAME: &str = ".filen-cli";

#[derive(Error, Debug)]
pub enum StateError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed state file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// WebDAV server configuration persisted as `webdav_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebdavConfig {
    pub port: u16,
    pub protocol: String,
    pub username: String,
    pub password: String,
}

impl Default for WebdavConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            protocol: "http".to_string(),
            username: "filen".to_string(),
            password: "filen-webdav".to_string(),
        }
    }
}

/// Handle to the user-scoped state directory.
#[derive(Debug, Clone)]
pub struct StateStore {
    base: PathBuf,
}

impl StateStore {
    /// Open the store at `~/.filen-cli`, creating directories as needed.
    pub fn open() -> Result<Self, StateError> {
        let home = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or(StateError::NoHomeDir)?;
        Self::open_at(home.join(DATA_DIR_NAME))
    }

    /// Open the store at an explicit root. Used by tests and by anything
    /// that must not touch the real home directory.
    pub fn open_at(base: impl Into<PathBuf>) -> Result<Self, StateError> {
        let base = base.into();
        for dir in [
            base.clone(),
            base.join("batch_states"),
            base.join("webdav-ssl"),
        ] {
            fs::create_dir_all(&dir).map_err(|e| StateError::io(&dir, e))?;
        }
        Ok(Self { base })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.base.join("credentials.json")
    }

    pub fn batch_state_dir(&self) -> PathBuf {
        self.base.join("batch_states")
    }

    fn batch_state_path(&self, batch_id: &str) -> PathBuf {
        self.batch_state_dir()
            .join(format!("batch_state_{batch_id}.json"))
    }

    pub fn webdav_pid_path(&self) -> PathBuf {
        self.base.join("webdav.pid")
    }

    pub fn webdav_config_path(&self) -> PathBuf {
        self.base.join("webdav_config.json")
    }

    pub fn webdav_ssl_dir(&self) -> PathBuf {
        self.base.join("webdav-ssl")
    }

    // ========================================================================
    // Generic JSON persistence
    // ========================================================================

    /// Atomically replace `path` with pretty-printed JSON.
    fn write_json<T: Serialize>(
        &self,
        path: &Path,
        value: &T,
        mode_0600: bool,
    ) -> Result<(), StateError> {
        let dir = path.parent().unwrap_or(&self.base);
        let mut tmp =
            tempfile::NamedTempFile::new_in(dir).map_err(|e| StateError::io(path, e))?;

        let json = serde_json::to_vec_pretty(value).expect("state types serialize infallibly");
        tmp.write_all(&json).map_err(|e| StateError::io(path, e))?;

        #[cfg(unix)]
        if mode_0600 {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            tmp.as_file()
                .set_permissions(perms)
                .map_err(|e| StateError::io(path, e))?;
        }
        #[cfg(not(unix))]
        let _ = mode_0600;

        tmp.persist(path)
            .map_err(|e| StateError::io(path, e.error))?;
        debug!(path = %path.display(), "state file written");
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StateError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::io(path, e)),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| StateError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn remove(&self, path: &Path) -> Result<(), StateError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StateError::io(path, e)),
        }
    }

    // ========================================================================
    // Credentials
    // ========================================================================

    pub fn save_credentials(&self, credentials: &crate::auth::Credentials) -> Result<(), StateError> {
        self.write_json(&self.credentials_path(), credentials, true)
    }

    pub fn read_credentials(&self) -> Result<Option<crate::auth::Credentials>, StateError> {
        match self.read_json(&self.credentials_path()) {
            // A corrupt credentials file means re-login, not a crash.
            Err(StateError::Malformed { path, source }) => {
                warn!(path = %path.display(), error = %source, "ignoring malformed credentials file");
                Ok(None)
            }
            other => other,
        }
    }

    pub fn clear_credentials(&self) -> Result<(), StateError> {
        self.remove(&self.credentials_path())
    }

    // ========================================================================
    // Batch state
    // ========================================================================

    pub fn save_batch_state(
        &self,
        batch_id: &str,
        state: &crate::batch::BatchState,
    ) -> Result<(), StateError> {
        self.write_json(&self.batch_state_path(batch_id), state, false)
    }

    pub fn load_batch_state(
        &self,
        batch_id: &str,
    ) -> Result<Option<crate::batch::BatchState>, StateError> {
        match self.read_json(&self.batch_state_path(batch_id)) {
            Err(StateError::Malformed { path, source }) => {
                warn!(path = %path.display(), error = %source, "ignoring malformed batch state");
                Ok(None)
            }
            other => other,
        }
    }

    pub fn delete_batch_state(&self, batch_id: &str) -> Result<(), StateError> {
        self.remove(&self.batch_state_path(batch_id))
    }

    // ========================================================================
    // WebDAV daemon files
    // ========================================================================

    pub fn save_webdav_pid(&self, pid: u32) -> Result<(), StateError> {
        let path = self.webdav_pid_path();
        fs::write(&path, pid.to_string()).map_err(|e| StateError::io(&path, e))
    }

    pub fn read_webdav_pid(&self) -> Option<u32> {
        let raw = fs::read_to_string(self.webdav_pid_path()).ok()?;
        raw.trim().parse().ok()
    }

    pub fn clear_webdav_pid(&self) -> Result<(), StateError> {
        self.remove(&self.webdav_pid_path())
    }

    pub fn save_webdav_config(&self, config: &WebdavConfig) -> Result<(), StateError> {
        self.write_json(&self.webdav_config_path(), config, false)
    }

    /// Read the WebDAV configuration, falling back to defaults when the file
    /// is absent or unreadable.
    pub fn read_webdav_config(&self) -> WebdavConfig {
        self.read_json(&self.webdav_config_path())
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;

    fn store() -> (tempfile::TempDir, StateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open_at(dir.path().join("state")).unwrap();
        (dir, store)
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".into(),
            api_key: "K".into(),
            master_keys: "aa|bb".into(),
            base_folder_uuid: "root-uuid".into(),
            user_id: "42".into(),
            last_logged_in_at: "2026-08-01T00:00:00Z".into(),
            last_refresh_at: None,
        }
    }

    #[test]
    fn directories_are_created() {
        let (_dir, store) = store();
        assert!(store.batch_state_dir().is_dir());
        assert!(store.webdav_ssl_dir().is_dir());
    }

    #[test]
    fn credentials_round_trip() {
        let (_dir, store) = store();
        assert!(store.read_credentials().unwrap().is_none());

        store.save_credentials(&credentials()).unwrap();
        let loaded = store.read_credentials().unwrap().unwrap();
        assert_eq!(loaded.email, "user@example.com");
        assert_eq!(loaded.master_keys, "aa|bb");

        store.clear_credentials().unwrap();
        assert!(store.read_credentials().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn credentials_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, store) = store();
        store.save_credentials(&credentials()).unwrap();
        let mode = fs::metadata(store.credentials_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn credentials_file_uses_wire_keys() {
        let (_dir, store) = store();
        store.save_credentials(&credentials()).unwrap();

        let raw = fs::read_to_string(store.credentials_path()).unwrap();
        for key in [
            "\"email\"",
            "\"apiKey\"",
            "\"masterKeys\"",
            "\"baseFolderUUID\"",
            "\"userId\"",
            "\"lastLoggedInAt\"",
        ] {
            assert!(raw.contains(key), "missing {key} in {raw}");
        }
    }

    #[test]
    fn corrupt_credentials_are_treated_as_absent() {
        let (_dir, store) = store();
        fs::write(store.credentials_path(), b"{not json").unwrap();
        assert!(store.read_credentials().unwrap().is_none());
    }

    #[test]
    fn webdav_pid_round_trip() {
        let (_dir, store) = store();
        assert!(store.read_webdav_pid().is_none());
        store.save_webdav_pid(12345).unwrap();
        assert_eq!(store.read_webdav_pid(), Some(12345));
        store.clear_webdav_pid().unwrap();
        assert!(store.read_webdav_pid().is_none());
    }

    #[test]
    fn webdav_config_defaults() {
        let (_dir, store) = store();
        let config = store.read_webdav_config();
        assert_eq!(config.port, 8080);
        assert_eq!(config.username, "filen");
        assert_eq!(config.password, "filen-webdav");

        let custom = WebdavConfig {
            port: 9000,
            ..WebdavConfig::default()
        };
        store.save_webdav_config(&custom).unwrap();
        assert_eq!(store.read_webdav_config().port, 9000);
    }
}
