//! Show trash contents.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::batch::FileFilter;
use tracing::instrument;

use crate::output::{create_table, format_date, format_size, format_uuid};

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
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

#[instrument(level = "info", name = "cmd::list_trash", skip_all)]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    let filter = FileFilter::new(&args.include, &args.exclude)?;
    let nodes = session.drive.trash_content().await?;

    let visible: Vec<_> = nodes
        .iter()
        .filter(|n| filter.matches(n.name()))
        .collect();

    if visible.is_empty() {
        println!("Trash is empty.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Type", "Size", "Modified", "UUID", "Name"]);
    for node in visible {
        table.add_row(vec![
            node.kind_str().to_string(),
            if node.is_folder() {
                "-".to_string()
            } else {
                format_size(node.size())
            },
            format_date(node.last_modified()),
            format_uuid(node.uuid(), args.uuids),
            node.name().to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
