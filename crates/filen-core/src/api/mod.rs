//! Authenticated JSON transport plus the raw chunk endpoints.
//!
//! The gateway speaks a uniform envelope: every response is
//! `{status, message, code, data}` with `status == true` on success. Chunk
//! content bypasses the gateway and goes straight to the ingest (upload) and
//! egest (download) hosts as raw bytes.
//!
//! Transient failures (transport errors, 5xx) are retried here with
//! exponential backoff; everything else surfaces as a typed [`ApiError`] for
//! the layers above to interpret.

pub mod types;

use std::sync::RwLock;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, trace, warn};

use types::{AuthInfo, BaseFolder, DirContent, DirTree, FileExists, LoginData, RawFile};

/// Default gateway/ingest/egest hosts.
pub const GATEWAY_URL: &str = "https://gateway.filen.io";
pub const INGEST_URL: &str = "https://ingest.filen.io";
pub const EGEST_URL: &str = "https://egest.filen.io";

/// Per-call HTTP timeout. Long files complete under chunk-level retries, so
/// there is deliberately no aggregate deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by the wire client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level failure after exhausting retries.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server kept answering 5xx after exhausting retries.
    #[error("server error: HTTP {status}")]
    Server { status: u16 },

    /// An authenticated call was attempted without an API key, or the server
    /// rejected the key. The user must log in again.
    #[error("not authenticated - please login")]
    NotAuthenticated,

    /// HTTP 409: the entity already exists. Upper layers may treat this as
    /// benign (folder creation races resolve by refetching).
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The account requires a two-factor code for this login.
    #[error("two-factor authentication code required")]
    NeedTwoFactor,

    /// The submitted two-factor code was wrong.
    #[error("two-factor authentication code was not accepted")]
    WrongTwoFactor,

    /// The server answered with `status == false` and a reason.
    #[error("server rejected request: {message}")]
    Rejected { message: String },

    /// The response envelope decoded but `data` did not match the expected
    /// shape.
    #[error("malformed server response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether a retry at a higher level (next chunk attempt, next task) has
    /// any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Server { .. })
    }
}

/// Retry/backoff policy threaded into the client rather than hard-coded at
/// call sites.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per call (first try included).
    pub attempts: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Ceiling for the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay before retrying after the given zero-based attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Gateway, ingest and egest base URLs.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub gateway: String,
    pub ingest: String,
    pub egest: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gateway: GATEWAY_URL.to_string(),
            ingest: INGEST_URL.to_string(),
            egest: EGEST_URL.to_string(),
        }
    }
}

/// The uniform gateway response envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Stateless JSON transport with bearer authentication.
///
/// Cheap to share behind an `Arc`; the only mutable state is the API key
/// installed after login.
pub struct ApiClient {
    http: reqwest::Client,
    endpoints: Endpoints,
    retry: RetryPolicy,
    api_key: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(endpoints: Endpoints, retry: RetryPolicy) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            endpoints,
            retry,
            api_key: RwLock::new(None),
        }
    }

    /// Install the bearer token returned by `/login`.
    pub fn set_api_key(&self, key: Option<String>) {
        *self.api_key.write().expect("api key lock poisoned") = key;
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key
            .read()
            .expect("api key lock poisoned")
            .is_some()
    }

    fn api_key(&self) -> Option<String> {
        self.api_key.read().expect("api key lock poisoned").clone()
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Issue one gateway call, retrying transport errors and 5xx with
    /// exponential backoff, and unwrap the response envelope.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        authenticated: bool,
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.endpoints.gateway);
        let key = if authenticated {
            Some(self.api_key().ok_or(ApiError::NotAuthenticated)?)
        } else {
            None
        };

        let mut attempt = 0;
        loop {
            let mut req = self.http.request(method.clone(), &url);
            if let Some(ref body) = body {
                req = req.json(body);
            }
            if let Some(ref key) = key {
                req = req.bearer_auth(key);
            }

            trace!(%url, attempt, "gateway request");
            let result = req.send().await;

            let retriable_status = match &result {
                Ok(resp) => resp.status().is_server_error(),
                Err(_) => true,
            };
            if retriable_status && attempt + 1 < self.retry.attempts {
                let delay = self.retry.delay_after(attempt);
                match &result {
                    Ok(resp) => warn!(%url, status = %resp.status(), ?delay, "server error, retrying"),
                    Err(e) => warn!(%url, error = %e, ?delay, "network error, retrying"),
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let resp = result?;
            let status = resp.status();
            if status.is_server_error() {
                return Err(ApiError::Server {
                    status: status.as_u16(),
                });
            }
            if status == StatusCode::UNAUTHORIZED {
                return Err(ApiError::NotAuthenticated);
            }
            if status == StatusCode::CONFLICT {
                let message = resp.text().await.unwrap_or_default();
                return Err(ApiError::Conflict { message });
            }
            if status.is_client_error() {
                let message = resp.text().await.unwrap_or_default();
                return Err(ApiError::Rejected {
                    message: format!("HTTP {status}: {message}"),
                });
            }

            let envelope: Envelope = resp.json().await?;
            if !envelope.status {
                return Err(Self::map_rejection(&envelope));
            }

            let data = envelope.data.unwrap_or(serde_json::Value::Null);
            return Ok(serde_json::from_value(data)?);
        }
    }

    /// Map a `status == false` envelope to a typed error. The 2FA dance is
    /// signalled this way rather than via HTTP status.
    fn map_rejection(envelope: &Envelope) -> ApiError {
        let message = envelope.message.clone().unwrap_or_default();
        let code = envelope.code.clone().unwrap_or_default();
        let haystack = format!("{code} {message}").to_lowercase();

        if haystack.contains("enter_2fa") {
            ApiError::NeedTwoFactor
        } else if haystack.contains("wrong_2fa") {
            ApiError::WrongTwoFactor
        } else if haystack.contains("already exists") {
            ApiError::Conflict { message }
        } else {
            ApiError::Rejected { message }
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
        authenticated: bool,
    ) -> Result<T, ApiError> {
        self.request(Method::POST, path, Some(body), authenticated)
            .await
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    pub async fn auth_info(&self, email: &str) -> Result<AuthInfo, ApiError> {
        self.post("/v3/auth/info", json!({ "email": email }), false)
            .await
    }

    pub async fn login(
        &self,
        email: &str,
        derived_password: &str,
        auth_version: u32,
        two_factor_code: &str,
    ) -> Result<LoginData, ApiError> {
        self.post(
            "/v3/login",
            json!({
                "email": email.to_lowercase(),
                "password": derived_password,
                "authVersion": auth_version,
                "twoFactorCode": two_factor_code,
            }),
            false,
        )
        .await
    }

    pub async fn base_folder(&self) -> Result<BaseFolder, ApiError> {
        self.request(Method::GET, "/v3/user/baseFolder", None, true)
            .await
    }

    // ========================================================================
    // Folders
    // ========================================================================

    pub async fn dir_content(
        &self,
        uuid: &str,
        folders_only: bool,
    ) -> Result<DirContent, ApiError> {
        self.post(
            "/v3/dir/content",
            json!({ "uuid": uuid, "foldersOnly": folders_only }),
            true,
        )
        .await
    }

    pub async fn dir_create(
        &self,
        uuid: &str,
        name_encrypted: &str,
        name_hashed: &str,
        parent: &str,
    ) -> Result<(), ApiError> {
        self.post(
            "/v3/dir/create",
            json!({
                "uuid": uuid,
                "name": name_encrypted,
                "nameHashed": name_hashed,
                "parent": parent,
            }),
            true,
        )
        .await
    }

    pub async fn dir_move(&self, uuid: &str, to: &str) -> Result<(), ApiError> {
        self.post("/v3/dir/move", json!({ "uuid": uuid, "to": to }), true)
            .await
    }

    pub async fn dir_rename(
        &self,
        uuid: &str,
        name_encrypted: &str,
        name_hashed: &str,
    ) -> Result<(), ApiError> {
        self.post(
            "/v3/dir/rename",
            json!({ "uuid": uuid, "name": name_encrypted, "nameHashed": name_hashed }),
            true,
        )
        .await
    }

    pub async fn dir_trash(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/dir/trash", json!({ "uuid": uuid }), true)
            .await
    }

    pub async fn dir_restore(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/dir/restore", json!({ "uuid": uuid }), true)
            .await
    }

    pub async fn dir_delete_permanent(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/dir/delete/permanent", json!({ "uuid": uuid }), true)
            .await
    }

    /// Bulk folder tree used for recursive downloads.
    pub async fn dir_download(&self, uuid: &str) -> Result<DirTree, ApiError> {
        self.post("/v3/dir/download", json!({ "uuid": uuid }), true)
            .await
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub async fn file_info(&self, uuid: &str) -> Result<RawFile, ApiError> {
        self.post("/v3/file", json!({ "uuid": uuid }), true).await
    }

    pub async fn file_exists(
        &self,
        parent: &str,
        name_hashed: &str,
    ) -> Result<FileExists, ApiError> {
        self.post(
            "/v3/file/exists",
            json!({ "parent": parent, "nameHashed": name_hashed }),
            true,
        )
        .await
    }

    pub async fn file_move(&self, uuid: &str, to: &str) -> Result<(), ApiError> {
        self.post("/v3/file/move", json!({ "uuid": uuid, "to": to }), true)
            .await
    }

    pub async fn file_rename(
        &self,
        uuid: &str,
        name_encrypted: &str,
        metadata_encrypted: &str,
        name_hashed: &str,
    ) -> Result<(), ApiError> {
        self.post(
            "/v3/file/rename",
            json!({
                "uuid": uuid,
                "name": name_encrypted,
                "metadata": metadata_encrypted,
                "nameHashed": name_hashed,
            }),
            true,
        )
        .await
    }

    pub async fn file_trash(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/file/trash", json!({ "uuid": uuid }), true)
            .await
    }

    pub async fn file_restore(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/file/restore", json!({ "uuid": uuid }), true)
            .await
    }

    pub async fn file_delete_permanent(&self, uuid: &str) -> Result<(), ApiError> {
        self.post("/v3/file/delete/permanent", json!({ "uuid": uuid }), true)
            .await
    }

    // ========================================================================
    // Upload finalization
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn upload_empty(
        &self,
        uuid: &str,
        name_encrypted: &str,
        name_hashed: &str,
        size_encrypted: &str,
        parent: &str,
        mime_encrypted: &str,
        metadata_encrypted: &str,
    ) -> Result<(), ApiError> {
        self.post(
            "/v3/upload/empty",
            json!({
                "uuid": uuid,
                "name": name_encrypted,
                "nameHashed": name_hashed,
                "size": size_encrypted,
                "parent": parent,
                "mime": mime_encrypted,
                "metadata": metadata_encrypted,
                "version": 2,
            }),
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn upload_done(
        &self,
        uuid: &str,
        name_encrypted: &str,
        name_hashed: &str,
        size_encrypted: &str,
        chunks: u64,
        mime_encrypted: &str,
        metadata_encrypted: &str,
        upload_key: &str,
        rm: &str,
    ) -> Result<(), ApiError> {
        self.post(
            "/v3/upload/done",
            json!({
                "uuid": uuid,
                "name": name_encrypted,
                "nameHashed": name_hashed,
                "size": size_encrypted,
                "chunks": chunks,
                "mime": mime_encrypted,
                "rm": rm,
                "metadata": metadata_encrypted,
                "version": 2,
                "uploadKey": upload_key,
            }),
            true,
        )
        .await
    }

    // ========================================================================
    // Raw chunk transfer
    // ========================================================================

    /// PUT one encrypted chunk to the ingest host.
    ///
    /// `hash` is the lowercase-hex SHA-512 of the encrypted body; the server
    /// uses it for its own integrity check.
    pub async fn upload_chunk(
        &self,
        uuid: &str,
        index: u64,
        parent: &str,
        upload_key: &str,
        hash: &str,
        body: Vec<u8>,
    ) -> Result<(), ApiError> {
        let key = self.api_key().ok_or(ApiError::NotAuthenticated)?;
        let url = format!(
            "{}/v3/upload?uuid={uuid}&index={index}&parent={parent}&uploadKey={upload_key}&hash={hash}",
            self.endpoints.ingest
        );

        let mut attempt = 0;
        loop {
            debug!(uuid, index, attempt, "uploading chunk");
            let result = self
                .http
                .post(&url)
                .bearer_auth(&key)
                .body(body.clone())
                .send()
                .await;

            let retriable = match &result {
                Ok(resp) => resp.status().is_server_error(),
                Err(_) => true,
            };
            if retriable && attempt + 1 < self.retry.attempts {
                let delay = self.retry.delay_after(attempt);
                warn!(uuid, index, ?delay, "chunk upload failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let resp = result?;
            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            if status.is_server_error() {
                return Err(ApiError::Server {
                    status: status.as_u16(),
                });
            }
            let message = resp.text().await.unwrap_or_default();
            return Err(ApiError::Rejected {
                message: format!("chunk upload failed: HTTP {status}: {message}"),
            });
        }
    }

    /// GET one encrypted chunk from the egest host.
    pub async fn download_chunk(
        &self,
        region: &str,
        bucket: &str,
        uuid: &str,
        index: u64,
    ) -> Result<Bytes, ApiError> {
        let url = format!("{}/{region}/{bucket}/{uuid}/{index}", self.endpoints.egest);

        let mut attempt = 0;
        loop {
            trace!(uuid, index, attempt, "downloading chunk");
            let result = self.http.get(&url).send().await;

            let retriable = match &result {
                Ok(resp) => resp.status().is_server_error(),
                Err(_) => true,
            };
            if retriable && attempt + 1 < self.retry.attempts {
                let delay = self.retry.delay_after(attempt);
                warn!(uuid, index, ?delay, "chunk download failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            let resp = result?;
            let status = resp.status();
            if status.is_server_error() {
                return Err(ApiError::Server {
                    status: status.as_u16(),
                });
            }
            if !status.is_success() {
                return Err(ApiError::Rejected {
                    message: format!("chunk download failed: HTTP {status}"),
                });
            }
            return Ok(resp.bytes().await?);
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("endpoints", &self.endpoints)
            .field("retry", &self.retry)
            .field("authenticated", &self.has_api_key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay_after(0), Duration::from_secs(1));
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
        assert_eq!(retry.delay_after(5), Duration::from_secs(8));
    }

    #[test]
    fn rejection_mapping() {
        let envelope = Envelope {
            status: false,
            message: Some("Please enter your Two Factor Authentication code.".into()),
            code: Some("enter_2fa".into()),
            data: None,
        };
        assert!(matches!(
            ApiClient::map_rejection(&envelope),
            ApiError::NeedTwoFactor
        ));

        let envelope = Envelope {
            status: false,
            message: Some("Invalid Two Factor Authentication code.".into()),
            code: Some("wrong_2fa".into()),
            data: None,
        };
        assert!(matches!(
            ApiClient::map_rejection(&envelope),
            ApiError::WrongTwoFactor
        ));

        let envelope = Envelope {
            status: false,
            message: Some("Folder already exists.".into()),
            code: None,
            data: None,
        };
        assert!(matches!(
            ApiClient::map_rejection(&envelope),
            ApiError::Conflict { .. }
        ));

        let envelope = Envelope {
            status: false,
            message: Some("quota exceeded".into()),
            code: None,
            data: None,
        };
        assert!(matches!(
            ApiClient::map_rejection(&envelope),
            ApiError::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn unauthenticated_client_refuses_authenticated_calls() {
        let client = ApiClient::new(Endpoints::default(), RetryPolicy::default());
        let err = client.base_folder().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
    }

    #[test]
    fn transient_classification() {
        assert!(ApiError::Server { status: 503 }.is_transient());
        assert!(!ApiError::NotAuthenticated.is_transient());
        assert!(!ApiError::Rejected {
            message: String::new()
        }
        .is_transient());
    }
}
