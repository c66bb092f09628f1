//! CLI subcommands.

pub mod config;
pub mod cp;
pub mod delete_path;
pub mod download;
pub mod download_path;
pub mod find;
pub mod list_trash;
pub mod login;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod rename;
pub mod resolve;
pub mod restore;
pub mod search;
pub mod trash;
pub mod tree;
pub mod upload;
pub mod verify;
pub mod webdav;

use std::sync::Arc;

use anyhow::{Context, Result};
use filen_core::api::{ApiClient, Endpoints, RetryPolicy};
use filen_core::auth::{self, Credentials};
use filen_core::batch::ConflictPolicy;
use filen_core::drive::DriveClient;
use filen_core::state::StateStore;

/// Everything an authenticated command needs.
pub struct Session {
    pub store: StateStore,
    pub drive: Arc<DriveClient>,
    pub credentials: Credentials,
}

/// Open the state store and build an unauthenticated wire client.
pub fn open_store_and_api() -> Result<(StateStore, Arc<ApiClient>)> {
    let store = StateStore::open().context("could not open ~/.filen-cli")?;
    let api = Arc::new(ApiClient::new(Endpoints::default(), RetryPolicy::default()));
    Ok((store, api))
}

/// Load the stored session or fail with a login hint.
pub fn connect() -> Result<Session> {
    let (store, api) = open_store_and_api()?;
    let credentials =
        auth::load_session(&api, &store).context("not logged in - run \"filen login\" first")?;
    let drive = Arc::new(DriveClient::new(api, &credentials));
    Ok(Session {
        store,
        drive,
        credentials,
    })
}

/// Resolve the effective conflict policy: `--force` means overwrite.
pub fn conflict_policy(on_conflict: &str, force: bool) -> Result<ConflictPolicy> {
    if force {
        return Ok(ConflictPolicy::Overwrite);
    }
    on_conflict.parse().map_err(anyhow::Error::msg)
}
