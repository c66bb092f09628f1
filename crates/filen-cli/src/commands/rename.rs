//! Rename a file or folder in place.

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Item path
    pub path: String,

    /// New name
    pub new_name: String,
}

#[instrument(level = "info", name = "cmd::rename", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;
    session.drive.rename_node(&node, &args.new_name).await?;
    println!("Renamed {} -> {}", node.name(), args.new_name);
    Ok(())
}
