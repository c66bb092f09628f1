//! Permanently delete an item. Irreversible.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use crate::prompt;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Item path
    pub path: String,
}

#[instrument(level = "info", name = "cmd::delete_path", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args, force: bool) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;

    if !force {
        let question = format!(
            "PERMANENTLY delete {} \"{}\"? This cannot be undone.",
            node.kind_str(),
            node.name()
        );
        if !prompt::confirm(&question)? {
            println!("Aborted.");
            return Ok(());
        }
    }

    session.drive.delete_node_permanent(&node).await?;
    println!("Permanently deleted {} \"{}\"", node.kind_str(), node.name());
    Ok(())
}
