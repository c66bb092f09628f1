//! Show a folder tree.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::drive::{DriveClient, Node};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::instrument;

use crate::output::format_size;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Starting path
    #[arg(default_value = "/")]
    pub path: String,

    /// Maximum depth
    #[arg(short = 'l', long, default_value_t = 3)]
    pub depth: u32,
}

#[instrument(level = "info", name = "cmd::tree", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let node = session.drive.resolve_path(&args.path).await?;
    match node {
        Node::File(file) => {
            println!("{} ({})", file.name, format_size(file.size));
            Ok(())
        }
        Node::Folder(folder) => {
            println!("{}/", if folder.name.is_empty() { "/" } else { &folder.name });
            print_tree(&session.drive, folder.uuid, String::new(), args.depth).await
        }
    }
}

/// Recursive printer. Boxed because async recursion needs a nameable future.
fn print_tree(
    drive: &DriveClient,
    folder_uuid: String,
    prefix: String,
    depth_left: u32,
) -> BoxFuture<'_, Result<()>> {
    async move {
        if depth_left == 0 {
            return Ok(());
        }

        let folders = drive.list_folders(&folder_uuid).await?;
        let files = drive.list_files(&folder_uuid).await?;
        let total = folders.len() + files.len();

        for (i, child) in folders.iter().enumerate() {
            let is_last = i + 1 == total;
            let connector = if is_last { "└── " } else { "├── " };
            println!("{prefix}{connector}{}/", child.name);

            let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
            print_tree(drive, child.uuid.clone(), child_prefix, depth_left - 1).await?;
        }

        for (i, child) in files.iter().enumerate() {
            let is_last = folders.len() + i + 1 == total;
            let connector = if is_last { "└── " } else { "├── " };
            println!(
                "{prefix}{connector}{} ({})",
                child.name,
                format_size(child.size)
            );
        }

        Ok(())
    }
    .boxed()
}
