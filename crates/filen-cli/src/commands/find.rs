//! Recursive file find under a path.

use anyhow::Result;
use clap::Args as ClapArgs;
use filen_core::batch::FileFilter;
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct Args {
    /// Starting path
    pub path: String,

    /// File pattern (e.g. "*.pdf")
    pub pattern: String,

    /// Limit depth (-1 for unbounded)
    #[arg(long, default_value_t = -1)]
    pub maxdepth: i32,

    /// Include file pattern (repeatable)
    #[arg(long)]
    pub include: Vec<String>,

    /// Exclude file pattern (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,
}

#[instrument(level = "info", name = "cmd::find", skip_all, fields(path = %args.path, pattern = %args.pattern))]
pub async fn execute(session: &Session, args: &Args) -> Result<()> {
    println!("Finding \"{}\" in \"{}\"...", args.pattern, args.path);

    let results = session
        .drive
        .find_files(&args.path, &args.pattern, args.maxdepth)
        .await?;

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
    for (path, _) in matches {
        println!("  {path}");
    }
    Ok(())
}
