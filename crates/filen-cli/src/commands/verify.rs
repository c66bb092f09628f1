//! Verify an upload against the server-stored plaintext digest.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::drive::{DriveError, Node};
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Remote file path or UUID
    pub remote: String,

    /// Local file to compare against
    pub local: String,
}

#[instrument(level = "info", name = "cmd::verify", skip_all, fields(remote = %args.remote))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let uuid = match session.drive.resolve_path(&args.remote).await {
        Ok(Node::File(file)) => file.uuid,
        Ok(Node::Folder(_)) => bail!("\"{}\" is a folder", args.remote),
        Err(DriveError::NotFound { .. })
            if uuid::Uuid::parse_str(args.remote.trim()).is_ok() =>
        {
            args.remote.trim().to_string()
        }
        Err(e) => return Err(e.into()),
    };

    println!("Hashing local file and fetching server digest...");
    let matches = session
        .drive
        .verify_upload(&uuid, std::path::Path::new(&args.local))
        .await?;

    if matches {
        println!("OK - SHA-512 digests match");
        Ok(())
    } else {
        bail!("MISMATCH - local file differs from the uploaded content");
    }
}
