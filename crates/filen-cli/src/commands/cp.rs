//! Copy files (download-then-reupload; there is no server-side copy).

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::drive::{base_name, parent_path, DriveError, Node};
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Source file path
    pub source: String,

    /// Destination folder or file path
    pub dest: String,
}

#[instrument(level = "info", name = "cmd::cp", skip_all)]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let node = session.drive.resolve_path(&args.source).await?;
    let Node::File(file) = node else {
        bail!("folder copy is not supported");
    };

    let (dest_folder, new_name) = match session.drive.resolve_path(&args.dest).await {
        Ok(Node::Folder(folder)) => (folder, None),
        Ok(Node::File(_)) => bail!("destination \"{}\" already exists", args.dest),
        Err(DriveError::NotFound { .. }) => {
            let parent = session
                .drive
                .resolve_folder(&parent_path(&args.dest))
                .await?;
            (parent, Some(base_name(&args.dest)))
        }
        Err(e) => return Err(e.into()),
    };

    println!("Copying {} (download + re-upload)...", file.name);
    let receipt = session
        .drive
        .copy_file(&file, &dest_folder.uuid, new_name.as_deref())
        .await?;

    println!("Copied to {} ({} bytes)", args.dest, receipt.size);
    Ok(())
}
