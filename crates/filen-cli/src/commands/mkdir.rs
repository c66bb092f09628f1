//! Create folders, parents included.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Folder path to create
    pub path: String,
}

#[instrument(level = "info", name = "cmd::mkdir", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let folder = session.drive.create_folder_recursive(&args.path).await?;
    println!("Created /{}", filen_core::drive::canonical_path(&args.path));
    tracing::debug!(uuid = %folder.uuid, "leaf folder");
    Ok(())
}
