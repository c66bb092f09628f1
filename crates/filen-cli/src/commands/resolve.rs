//! Debug helper: show what a path resolves to.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::drive::Node;
use tracing::instrument;

use crate::output::{format_date, format_size};

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Path to resolve
    pub path: String,
}

#[instrument(level = "info", name = "cmd::resolve", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;

    println!("Type:   {}", node.kind_str());
    println!("Name:   {}", node.name());
    println!("UUID:   {}", node.uuid());
    if let Some(parent) = node.parent() {
        println!("Parent: {parent}");
    }
    if let Node::File(file) = &node {
        println!("Size:   {}", format_size(file.size));
        println!("Chunks: {}", file.chunks);
        println!("Region: {}", file.region);
        println!("Bucket: {}", file.bucket);
        println!("MIME:   {}", file.mime);
        println!("Mtime:  {}", format_date(file.last_modified));
    }
    Ok(())
}
