//! Batch download of a remote path (recursive for folders).

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::batch::{self, DownloadOptions, FileFilter, OperationKind};
use filen_core::drive::Node;
use tracing::instrument;

use super::{conflict_policy, download, Session};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Remote path to download
    pub path: String,

    /// Local destination directory
    #[arg(short, long)]
    pub target: Option<String>,

    /// Recurse into folders
    #[arg(short, long)]
    pub recursive: bool,

    /// Preserve remote modification times
    #[arg(short, long)]
    pub preserve_timestamps: bool,

    /// Conflict action
    #[arg(long, value_parser = ["skip", "overwrite", "newer"], default_value = "skip")]
    pub on_conflict: String,

    /// Include file pattern (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Exclude file pattern (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[instrument(level = "info", name = "cmd::download_path", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args, force: bool) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;

    // A single file takes the plain download path, filters included.
    if let Node::File(file) = &node {
        let filter = FileFilter::new(&args.include, &args.exclude)?;
        if !filter.matches(&file.name) {
            println!("Filtered out: {}", file.name);
            return Ok(());
        }
        let single = download::Args {
            path: args.path.clone(),
            output: args.target.clone(),
            on_conflict: args.on_conflict.clone(),
            preserve_timestamps: args.preserve_timestamps,
        };
        return download::execute(session, &single, force).await;
    }

    if !args.recursive {
        bail!("\"{}\" is a folder - pass -r to download recursively", args.path);
    }

    let sources = vec![args.path.clone()];
    let local_target = args.target.clone().unwrap_or_default();
    let batch_id = batch::batch_id(OperationKind::Download, &sources, &local_target);
    println!("Batch: {batch_id}");

    let options = DownloadOptions {
        remote_path: args.path.clone(),
        local_destination: args.target.clone(),
        conflict: conflict_policy(&args.on_conflict, force)?,
        preserve_timestamps: args.preserve_timestamps,
        filter: FileFilter::new(&args.include, &args.exclude)?,
    };

    let summary =
        batch::run_download(&session.drive, &session.store, &batch_id, &options).await?;

    println!(
        "Downloaded {} | previously done {} | skipped {} | errors {}",
        summary.completed, summary.previously_completed, summary.skipped, summary.errors
    );

    if !summary.is_clean() {
        bail!(
            "download completed with {} errors - rerun the same command to resume",
            summary.errors
        );
    }
    Ok(())
}
