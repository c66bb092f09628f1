//! Show configuration, paths and session info.

use anyhow::Result;
use filen_core::api::{EGEST_URL, GATEWAY_URL, INGEST_URL};
use filen_core::auth;
use tracing::instrument;

use super::open_store_and_api;

#[instrument(level = "info", name = "cmd::config", skip_all)]
pub fn execute() -> Result<()> {
    let (store, _api) = open_store_and_api()?;

    println!("Configuration");
    println!("  Data dir:     {}", store.base_dir().display());
    println!("  Credentials:  {}", store.credentials_path().display());
    println!("  Batch states: {}", store.batch_state_dir().display());
    println!();
    println!("API endpoints");
    println!("  Gateway: {GATEWAY_URL}");
    println!("  Ingest:  {INGEST_URL}");
    println!("  Egest:   {EGEST_URL}");
    println!();

    match auth::whoami(&store) {
        Some(me) => {
            println!("Session");
            println!("  User: {}", me.email);
            if let Ok(Some(credentials)) = store.read_credentials() {
                println!("  Last login: {}", credentials.last_logged_in_at);
            }
        }
        None => println!("Session: not logged in"),
    }
    Ok(())
}
