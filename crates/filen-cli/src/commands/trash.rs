//! Move items to the trash.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::drive::Node;
use tracing::instrument;

use crate::prompt;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Item path
    pub path: String,

    /// Allow trashing folders
    #[arg(short, long)]
    pub recursive: bool,
}

#[instrument(level = "info", name = "cmd::trash", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args, force: bool) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;

    if matches!(node, Node::Folder(_)) && !args.recursive && !force {
        bail!(
            "\"{}\" is a folder - pass -r to trash it with its contents",
            args.path
        );
    }

    if !force {
        let question = format!("Move {} \"{}\" to trash?", node.kind_str(), node.name());
        if !prompt::confirm(&question)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    session.drive.trash_node(&node).await?;
    println!("Trashed {} \"{}\"", node.kind_str(), node.name());
    Ok(())
}
