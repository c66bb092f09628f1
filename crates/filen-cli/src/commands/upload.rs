//! Batch upload with durable resume.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::batch::{self, FileFilter, OperationKind, UploadOptions};
use tracing::instrument;

use super::{conflict_policy, Session};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Source files/folders (glob patterns allowed)
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Remote target folder
    #[arg(short, long, default_value = "/")]
    pub target: String,

    /// Recurse into directories
    #[arg(short, long)]
    pub recursive: bool,

    /// Preserve local modification times
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

#[instrument(level = "info", name = "cmd::upload", skip_all, fields(target = %args.target))]
pub async fn execute(session: &Session, args: &Args, force: bool) -> Result<()> {
    let mut sources = args.sources.clone();
    let mut target = args.target.clone();

    // "upload a.txt b.txt /dest" convenience: when no -t was given and the
    // trailing argument is a remote-looking path (or does not exist
    // locally), treat it as the target.
    if target == "/" && sources.len() > 1 {
        let candidate = sources.last().cloned().unwrap_or_default();
        if candidate.starts_with('/') || !std::path::Path::new(&candidate).exists() {
            target = candidate;
            sources.pop();
            eprintln!("Inferring target: {target}");
        }
    }

    let batch_id = batch::batch_id(OperationKind::Upload, &sources, &target);
    println!("Batch: {batch_id}");
    println!("Target: {target}");

    let options = UploadOptions {
        sources,
        target,
        recursive: args.recursive,
        conflict: conflict_policy(&args.on_conflict, force)?,
        preserve_timestamps: args.preserve_timestamps,
        filter: FileFilter::new(&args.include, &args.exclude)?,
    };

    let summary =
        batch::run_upload(&session.drive, &session.store, &batch_id, &options).await?;

    println!(
        "Uploaded {} | previously done {} | skipped {} | errors {}",
        summary.completed, summary.previously_completed, summary.skipped, summary.errors
    );

    if !summary.is_clean() {
        bail!(
            "upload completed with {} errors - rerun the same command to resume",
            summary.errors
        );
    }
    Ok(())
}
