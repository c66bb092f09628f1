//! Whole-drive filename search.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::batch::FileFilter;
use tracing::instrument;

use crate::output::format_uuid;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Substring to search for
    pub query: String,

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

#[instrument(level = "info", name = "cmd::search", skip_all, fields(query = %args.query))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    println!("Searching for \"*{}*\"...", args.query);

    // One tree walk beats hundreds of per-folder calls on large accounts;
    // the listing cache keeps revisits cheap.
    let pattern = format!("*{}*", args.query);
    let results = session.drive.find_files("/", &pattern, -1).await?;

    let filter = FileFilter::new(&args.include, &args.exclude)?;
    let matches: Vec<_> = results
        .iter()
        .filter(|(_, file)| filter.matches(&file.name))
        .collect();

    if matches.is_empty() {
        println!("No matches found.");
        return Ok(());
    }

    println!("Found {} matches:", matches.len());
    for (path, file) in matches {
        if args.uuids {
            println!("  {path} ({})", format_uuid(&file.uuid, true));
        } else {
            println!("  {path}");
        }
    }
    Ok(())
}
