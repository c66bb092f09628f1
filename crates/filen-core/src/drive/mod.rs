//! Path resolver and metadata cache over the opaque UUID tree.
//!
//! The server addresses everything by UUID and stores only ciphertext; this
//! module decrypts directory listings into [`Node`]s, resolves `/`-separated
//! paths by walking them, and keeps TTL-bounded caches so the WebDAV
//! front-end is not one-API-call-per-PROPFIND.

mod cache;
mod node;
mod ops;
mod resolver;

pub use cache::{ListingCache, LISTING_TTL};
pub use node::{FileMetadata, FileNode, FolderNode, Node, ENCRYPTED_SENTINEL};

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::api::{ApiClient, ApiError};
use crate::auth::Credentials;
use crate::crypto::envelope::decrypt_metadata;
use crate::crypto::CryptoError;

#[derive(Error, Debug)]
pub enum DriveError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A path segment did not resolve. Carries the deepest prefix reached.
    #[error("path not found: {partial}")]
    NotFound { partial: String },

    /// A metadata envelope failed to decrypt with every master key.
    #[error("failed to decrypt metadata with any master key")]
    UndecryptableMetadata,

    /// The operation needs a folder but the path resolved to a file, or
    /// vice versa.
    #[error("{path} is not a {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
    },

    /// A file's content key is not usable (sentinel entry or foreign format).
    #[error("file {uuid} has no usable content key")]
    BadFileKey { uuid: String },

    #[error("local IO error on {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A folder was created but did not appear in the subsequent listing.
    #[error("created folder \"{name}\" but could not find it afterwards")]
    CreatedFolderMissing { name: String },

    #[error("invalid glob pattern \"{0}\"")]
    BadPattern(String),
}

/// Authenticated view of the remote drive.
///
/// Cheap to share behind an `Arc`: the caches are lock-free and writes to
/// the remote tree are serialized by the server. The WebDAV front-end
/// clones one instance per request.
pub struct DriveClient {
    api: Arc<ApiClient>,
    email: String,
    /// Decrypted master keys, oldest first. Encryption always uses the
    /// newest; decryption tries newest to oldest.
    master_keys: Vec<String>,
    base_folder_uuid: String,
    cache: ListingCache,
}

impl DriveClient {
    pub fn new(api: Arc<ApiClient>, credentials: &Credentials) -> Self {
        Self {
            api,
            email: credentials.email.clone(),
            master_keys: credentials.master_key_list(),
            base_folder_uuid: credentials.base_folder_uuid.clone(),
            cache: ListingCache::new(),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn base_folder_uuid(&self) -> &str {
        &self.base_folder_uuid
    }

    pub(crate) fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// The newest master key, used for all new encryptions.
    pub(crate) fn master_key(&self) -> &str {
        self.master_keys
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// The root folder as a node.
    pub fn root_node(&self) -> Node {
        Node::Folder(FolderNode {
            uuid: self.base_folder_uuid.clone(),
            name: String::new(),
            parent: None,
            timestamp: 0,
        })
    }

    /// Try every master key, newest first. Supports key rotation: old blobs
    /// stay readable under superseded keys.
    pub(crate) fn try_decrypt(&self, envelope: &str) -> Result<String, DriveError> {
        for key in self.master_keys.iter().rev() {
            match decrypt_metadata(envelope, key) {
                Ok(plaintext) => return Ok(plaintext),
                Err(_) => continue,
            }
        }
        Err(DriveError::UndecryptableMetadata)
    }

    /// Decrypt a folder name envelope. The plaintext may be a bare string or
    /// a JSON object `{"name": …}`; both are accepted.
    pub(crate) fn decrypt_folder_name(&self, envelope: &str) -> Option<String> {
        let plaintext = self.try_decrypt(envelope).ok()?;
        if plaintext.starts_with('{') {
            match serde_json::from_str::<serde_json::Value>(&plaintext) {
                Ok(value) => value
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string),
                Err(e) => {
                    warn!(error = %e, "folder name decrypted to malformed JSON");
                    None
                }
            }
        } else {
            Some(plaintext)
        }
    }

    /// Decrypt a file metadata envelope into its JSON record.
    pub(crate) fn decrypt_file_metadata(&self, envelope: &str) -> Option<FileMetadata> {
        let plaintext = self.try_decrypt(envelope).ok()?;
        match serde_json::from_str(&plaintext) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(error = %e, "file metadata decrypted to malformed JSON");
                None
            }
        }
    }

    /// Invalidate the listing entries for one folder (and, with them, the
    /// whole path cache). Every mutation goes through this.
    pub fn invalidate(&self, folder_uuid: &str) {
        self.cache.invalidate_folder(folder_uuid);
    }
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("email", &self.email)
            .field("base_folder_uuid", &self.base_folder_uuid)
            .field("master_keys", &self.master_keys.len())
            .finish_non_exhaustive()
    }
}

/// Normalize a user-supplied remote path to its canonical form: no leading
/// or trailing slash, empty string for the root.
pub fn canonical_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed == "." {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Split a canonical path into its segments.
pub(crate) fn path_segments(canonical: &str) -> Vec<&str> {
    canonical.split('/').filter(|s| !s.is_empty()).collect()
}

/// The parent portion of a remote path (`""` for top-level entries).
pub fn parent_path(path: &str) -> String {
    let canonical = canonical_path(path);
    match canonical.rfind('/') {
        Some(idx) => canonical[..idx].to_string(),
        None => String::new(),
    }
}

/// The final segment of a remote path.
pub fn base_name(path: &str) -> String {
    let canonical = canonical_path(path);
    canonical
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_path_strips_slashes_and_dot() {
        assert_eq!(canonical_path("/a/b/"), "a/b");
        assert_eq!(canonical_path("a/b"), "a/b");
        assert_eq!(canonical_path("/"), "");
        assert_eq!(canonical_path(""), "");
        assert_eq!(canonical_path("."), "");
        assert_eq!(canonical_path("  /a "), "a");
    }

    #[test]
    fn parent_and_base() {
        assert_eq!(parent_path("/a/b/c"), "a/b");
        assert_eq!(parent_path("/a"), "");
        assert_eq!(base_name("/a/b/c.txt"), "c.txt");
        assert_eq!(base_name("/a"), "a");
        assert_eq!(base_name("/"), "");
    }

    #[test]
    fn segments_skip_empties() {
        assert_eq!(path_segments("a//b"), vec!["a", "b"]);
        assert!(path_segments("").is_empty());
    }

    fn client_with_keys(keys: &[&str]) -> DriveClient {
        let credentials = Credentials {
            email: "user@example.com".into(),
            api_key: "K".into(),
            master_keys: keys.join("|"),
            base_folder_uuid: "root".into(),
            user_id: "1".into(),
            last_logged_in_at: String::new(),
            last_refresh_at: None,
        };
        DriveClient::new(
            Arc::new(ApiClient::new(Default::default(), Default::default())),
            &credentials,
        )
    }

    #[test]
    fn try_decrypt_walks_key_history() {
        use crate::crypto::envelope::encrypt_metadata;

        let old_key = "a".repeat(64);
        let new_key = "b".repeat(64);
        let client = client_with_keys(&[&old_key, &new_key]);

        // Blob sealed under the old key is still readable.
        let envelope = encrypt_metadata("legacy", &old_key).unwrap();
        assert_eq!(client.try_decrypt(&envelope).unwrap(), "legacy");

        // New encryptions use the newest key.
        assert_eq!(client.master_key(), new_key);

        // A blob under a foreign key fails with every key.
        let foreign = encrypt_metadata("x", &"c".repeat(64)).unwrap();
        assert!(matches!(
            client.try_decrypt(&foreign),
            Err(DriveError::UndecryptableMetadata)
        ));
    }

    #[test]
    fn folder_name_accepts_bare_and_json_forms() {
        use crate::crypto::envelope::encrypt_metadata;

        let key = "a".repeat(64);
        let client = client_with_keys(&[&key]);

        let bare = encrypt_metadata("plain-name", &key).unwrap();
        assert_eq!(client.decrypt_folder_name(&bare).unwrap(), "plain-name");

        let json = encrypt_metadata(r#"{"name":"json-name"}"#, &key).unwrap();
        assert_eq!(client.decrypt_folder_name(&json).unwrap(), "json-name");

        let garbage = encrypt_metadata("{broken", &key).unwrap();
        assert!(client.decrypt_folder_name(&garbage).is_none());
    }
}
