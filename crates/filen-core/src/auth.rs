//! Login handshake, master-key handling and credential persistence.
//!
//! The flow mirrors the protocol: fetch the account's salt and auth version,
//! derive the master key and auth password locally, log in (optionally with
//! a 2FA code), then decrypt the returned master-key history with the
//! locally derived key. Only derived material ever crosses the wire.

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};
use crate::crypto::envelope::decrypt_metadata;
use crate::crypto::kdf::derive_keys;
use crate::crypto::CryptoError;
use crate::state::{StateError, StateStore};

/// Placeholder sent when the caller has no 2FA code. The server answers with
/// `enter_2fa` if the account actually requires one.
const TWO_FACTOR_PLACEHOLDER: &str = "XXXXXX";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    State(#[from] StateError),

    /// No credentials on disk, or the stored record is missing fields.
    #[error("no valid credentials found - please login")]
    MissingCredentials,

    /// The server response was well-formed JSON but semantically unusable.
    #[error("login failed: {0}")]
    InvalidResponse(String),
}

/// Persisted session record. Field names are the on-disk schema and must not
/// change.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub email: String,
    pub api_key: String,
    /// Decrypted master keys joined with `|`, newest last. Multiple keys
    /// coexist after a password change so old metadata stays readable.
    pub master_keys: String,
    #[serde(rename = "baseFolderUUID")]
    pub base_folder_uuid: String,
    pub user_id: String,
    pub last_logged_in_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refresh_at: Option<String>,
}

impl Credentials {
    /// Master keys as a list, oldest first.
    pub fn master_key_list(&self) -> Vec<String> {
        self.master_keys
            .split('|')
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// All required fields present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty()
            && !self.api_key.is_empty()
            && !self.master_key_list().is_empty()
            && !self.base_folder_uuid.is_empty()
    }
}

/// Summary of the current session for `whoami`.
#[derive(Debug, Clone)]
pub struct WhoAmI {
    pub email: String,
    pub user_id: String,
    pub base_folder_uuid: String,
}

/// Perform the full login flow and persist the resulting credentials.
///
/// Pass `two_factor_code = None` on the first attempt; if the account needs
/// a code the call fails with [`ApiError::NeedTwoFactor`] and the caller
/// re-invokes with the code. All other errors are terminal.
pub async fn login(
    api: &ApiClient,
    store: &StateStore,
    email: &str,
    password: &str,
    two_factor_code: Option<&str>,
) -> Result<Credentials, AuthError> {
    debug!(email, "fetching auth info");
    let auth_info = api.auth_info(email).await?;
    if auth_info.salt.is_empty() {
        return Err(AuthError::InvalidResponse(
            "server did not provide a salt".into(),
        ));
    }

    debug!(auth_version = auth_info.auth_version, "deriving keys");
    let derived = derive_keys(password, auth_info.auth_version, &auth_info.salt)?;

    let code = two_factor_code.unwrap_or(TWO_FACTOR_PLACEHOLDER);
    let login_data = api
        .login(email, &derived.auth_password, auth_info.auth_version, code)
        .await?;

    if login_data.api_key.is_empty() {
        return Err(AuthError::InvalidResponse("no API key received".into()));
    }

    // Decrypt the key history with the locally derived key. Keys that fail
    // belong to other devices' derivations and are dropped; if nothing
    // decrypts, the derived key itself is the only usable key.
    let raw_keys = login_data.master_keys.clone().into_vec();
    let mut master_keys = Vec::new();
    for encrypted in &raw_keys {
        match decrypt_metadata(encrypted, &derived.master_key) {
            Ok(key) => master_keys.push(key),
            Err(e) => warn!(error = %e, "failed to decrypt a master key, skipping"),
        }
    }
    if master_keys.is_empty() {
        warn!("no master keys decrypted, falling back to derived key");
        master_keys.push(derived.master_key.to_string());
    }
    debug!(count = master_keys.len(), "master keys ready");

    api.set_api_key(Some(login_data.api_key.clone()));

    let base_folder = api.base_folder().await?;
    if base_folder.uuid.is_empty() {
        return Err(AuthError::InvalidResponse(
            "could not fetch base folder UUID".into(),
        ));
    }

    let credentials = Credentials {
        email: email.to_string(),
        api_key: login_data.api_key.clone(),
        master_keys: master_keys.join("|"),
        base_folder_uuid: base_folder.uuid,
        user_id: login_data.user_id(),
        last_logged_in_at: Utc::now().to_rfc3339(),
        last_refresh_at: None,
    };

    store.save_credentials(&credentials)?;
    info!(email, "login successful");
    Ok(credentials)
}

/// Load stored credentials and install the API key on the wire client.
pub fn load_session(api: &ApiClient, store: &StateStore) -> Result<Credentials, AuthError> {
    let credentials = store
        .read_credentials()?
        .filter(Credentials::is_complete)
        .ok_or(AuthError::MissingCredentials)?;
    api.set_api_key(Some(credentials.api_key.clone()));
    Ok(credentials)
}

/// Check that the stored session still works with a lightweight
/// authenticated call.
pub async fn validate_session(api: &ApiClient) -> bool {
    match api.base_folder().await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "session validation failed");
            false
        }
    }
}

/// Re-validate the session and bump the refresh stamp. API keys are
/// long-lived; there is no token rotation to perform.
pub async fn refresh_session(
    api: &ApiClient,
    store: &StateStore,
) -> Result<Credentials, AuthError> {
    let mut credentials = load_session(api, store)?;
    if !validate_session(api).await {
        return Err(AuthError::MissingCredentials);
    }
    credentials.last_refresh_at = Some(Utc::now().to_rfc3339());
    store.save_credentials(&credentials)?;
    Ok(credentials)
}

/// Clear credentials and wire-client auth.
pub fn logout(api: &ApiClient, store: &StateStore) -> Result<(), AuthError> {
    store.clear_credentials()?;
    api.set_api_key(None);
    info!("logged out, local credentials cleared");
    Ok(())
}

/// Current user summary, or `None` when not logged in.
pub fn whoami(store: &StateStore) -> Option<WhoAmI> {
    let credentials = store.read_credentials().ok()??;
    if !credentials.is_complete() {
        return None;
    }
    Some(WhoAmI {
        email: credentials.email,
        user_id: credentials.user_id,
        base_folder_uuid: credentials.base_folder_uuid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            email: "user@example.com".into(),
            api_key: "K".into(),
            master_keys: "old|new".into(),
            base_folder_uuid: "root".into(),
            user_id: "1".into(),
            last_logged_in_at: "2026-08-01T00:00:00Z".into(),
            last_refresh_at: None,
        }
    }

    #[test]
    fn master_key_list_splits_and_drops_empties() {
        let mut c = credentials();
        assert_eq!(c.master_key_list(), vec!["old", "new"]);

        c.master_keys = "only".into();
        assert_eq!(c.master_key_list(), vec!["only"]);

        c.master_keys = "a||b|".into();
        assert_eq!(c.master_key_list(), vec!["a", "b"]);
    }

    #[test]
    fn completeness_requires_all_fields() {
        let mut c = credentials();
        assert!(c.is_complete());
        c.api_key.clear();
        assert!(!c.is_complete());

        let mut c = credentials();
        c.master_keys = "|".into();
        assert!(!c.is_complete());
    }

    #[test]
    fn whoami_requires_complete_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open_at(dir.path()).unwrap();
        assert!(whoami(&store).is_none());

        store.save_credentials(&credentials()).unwrap();
        let me = whoami(&store).unwrap();
        assert_eq!(me.email, "user@example.com");
        assert_eq!(me.base_folder_uuid, "root");
    }

    #[test]
    fn load_session_installs_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open_at(dir.path()).unwrap();
        let api = ApiClient::new(Default::default(), Default::default());

        assert!(matches!(
            load_session(&api, &store),
            Err(AuthError::MissingCredentials)
        ));
        assert!(!api.has_api_key());

        store.save_credentials(&credentials()).unwrap();
        let loaded = load_session(&api, &store).unwrap();
        assert_eq!(loaded.api_key, "K");
        assert!(api.has_api_key());
    }
}
