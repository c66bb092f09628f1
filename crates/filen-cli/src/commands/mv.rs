//! Move files and folders.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::drive::{base_name, parent_path, DriveError, Node};
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Source path(s), destination last
    #[arg(required = true, num_args = 2..)]
    pub paths: Vec<String>,
}

#[instrument(level = "info", name = "cmd::mv", skip_all)]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let (dest, sources) = args.paths.split_last().expect("clap enforces 2+ args");

    // Destination folder, or a rename-move when it does not exist and there
    // is exactly one source.
    let dest_node = session.drive.resolve_path(dest).await;
    match dest_node {
        Ok(Node::Folder(folder)) => {
            for source in sources {
                let node = session.drive.resolve_path(source).await?;
                session.drive.move_node(&node, &folder.uuid).await?;
                println!("Moved {source} -> {dest}");
            }
            Ok(())
        }
        Err(DriveError::NotFound { .. }) if sources.len() == 1 => {
            let node = session.drive.resolve_path(&sources[0]).await?;
            let new_parent = session.drive.resolve_folder(&parent_path(dest)).await?;

            if node.parent() != Some(new_parent.uuid.as_str()) {
                session.drive.move_node(&node, &new_parent.uuid).await?;
            }
            let new_name = base_name(dest);
            if !new_name.is_empty() && new_name != node.name() {
                session.drive.rename_node(&node, &new_name).await?;
            }
            println!("Moved {} -> {dest}", sources[0]);
            Ok(())
        }
        Ok(Node::File(_)) => bail!("destination \"{dest}\" is an existing file"),
        Err(e) => Err(e.into()),
    }
}
