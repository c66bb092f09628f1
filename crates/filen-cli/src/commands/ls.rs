//! List folder contents.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::batch::FileFilter;
use filen_core::drive::Node;
use tracing::instrument;

use crate::output::{create_table, format_date, format_size, format_uuid};

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Folder path
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub detailed: bool,

    /// Show full UUIDs
    #[arg(long)]
    pub uuids: bool,

    /// Include file pattern (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Exclude file pattern (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[instrument(level = "info", name = "cmd::ls", skip_all, fields(path = %args.path))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let filter = FileFilter::new(&args.include, &args.exclude)?;
    let node = session.drive.resolve_path(&args.path).await?;

    let folder = match node {
        Node::File(file) => {
            // ls on a file prints that file.
            println!("{}  {}", format_size(file.size), file.name);
            return Ok(());
        }
        Node::Folder(folder) => folder,
    };

    let folders = session.drive.list_folders(&folder.uuid).await?;
    let files = session.drive.list_files(&folder.uuid).await?;

    if args.detailed {
        let mut table = create_table();
        table.set_header(vec!["Type", "Size", "Modified", "UUID", "Name"]);
        for child in folders.iter() {
            table.add_row(vec![
                "d".to_string(),
                "-".to_string(),
                format_date(child.timestamp),
                format_uuid(&child.uuid, args.uuids),
                format!("{}/", child.name),
            ]);
        }
        for child in files.iter().filter(|f| filter.matches(&f.name)) {
            table.add_row(vec![
                "-".to_string(),
                format_size(child.size),
                format_date(child.last_modified),
                format_uuid(&child.uuid, args.uuids),
                child.name.clone(),
            ]);
        }
        println!("{table}");
    } else {
        for child in folders.iter() {
            println!("{}/", child.name);
        }
        for child in files.iter().filter(|f| filter.matches(&f.name)) {
            println!("{}", child.name);
        }
    }

    Ok(())
}
