//! Single-file download by path or UUID.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use filen_core::batch::ConflictPolicy;
use filen_core::drive::{base_name, DriveError, FileNode, Node};
use filen_core::transfer::apply_timestamp;
use tracing::{instrument, warn};

use crate::output::format_size;

use super::{conflict_policy, Session};

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Remote file path or UUID
    pub path: String,

    /// Local output path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Conflict action when the local file exists
    #[arg(long, value_parser = ["skip", "overwrite", "newer"], default_value = "skip")]
    pub on_conflict: String,

    /// Preserve the remote modification time
    #[arg(short, long)]
    pub preserve_timestamps: bool,
}

/// Resolve the argument as a path first, falling back to a UUID lookup for
/// anything shaped like one.
async fn resolve_file(session: &Session, arg: &str) -> Result<FileNode> {
    match session.drive.resolve_path(arg).await {
        Ok(Node::File(file)) => return Ok(file),
        Ok(Node::Folder(_)) => {
            bail!("\"{arg}\" is a folder - use download-path -r for folders")
        }
        Err(DriveError::NotFound { .. }) if uuid::Uuid::parse_str(arg.trim()).is_ok() => {}
        Err(e) => return Err(e.into()),
    }
    Ok(session.drive.file_node(arg.trim()).await?)
}

#[instrument(level = "info", name = "cmd::download", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args, force: bool) -> Result<()> {
    let file = resolve_file(session, &args.path).await?;

    let local: PathBuf = match &args.output {
        Some(output) => {
            let path = PathBuf::from(output);
            if path.is_dir() {
                path.join(&file.name)
            } else {
                path
            }
        }
        None => PathBuf::from(base_name(&args.path)),
    };

    if local.exists() {
        match conflict_policy(&args.on_conflict, force)? {
            ConflictPolicy::Overwrite => {}
            ConflictPolicy::Skip => {
                println!("Skipping {} (exists)", local.display());
                return Ok(());
            }
            ConflictPolicy::Newer => {
                let local_ms = local
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0);
                if file.last_modified <= local_ms {
                    println!("Skipping {} (local is newer)", local.display());
                    return Ok(());
                }
            }
        }
    }

    println!("Downloading {} ({})", file.name, format_size(file.size));
    session
        .drive
        .download_to_path(&file, &local, &mut |_, _| {})
        .await?;

    if args.preserve_timestamps {
        if let Err(e) = apply_timestamp(&local, file.last_modified) {
            warn!(path = %local.display(), error = %e, "could not set timestamp");
        }
    }

    println!("Saved to {}", local.display());
    Ok(())
}
