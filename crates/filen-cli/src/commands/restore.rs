//! Restore items from the trash, by UUID or by name.

use anyhow::{bail, Result};
use clap::Args as ClapArgs;
use tracing::instrument;

use super::Session;

#[derive(ClapArgs, Clone)]
pub struct UuidArgs {
    /// Item UUID
    pub uuid: String,
}

#[derive(ClapArgs, Clone)]
pub struct PathArgs {
    /// Item name as shown by list-trash
    pub name: String,
}

#[instrument(level = "info", name = "cmd::restore_uuid", skip_all, fields(uuid = %args.uuid))]
pub async fn by_uuid(session: &Session, args: &UuidArgs) -> Result<()> {
    // The restore endpoint differs per kind, so find the entry first.
    let trash = session.drive.trash_content().await?;
    let Some(node) = trash.iter().find(|n| n.uuid() == args.uuid) else {
        bail!("item {} not found in trash", args.uuid);
    };

    session
        .drive
        .restore_node(node.is_folder(), node.uuid())
        .await?;
    println!("Restored {} \"{}\"", node.kind_str(), node.name());
    Ok(())
}

#[instrument(level = "info", name = "cmd::restore_path", skip_all, fields(name = %args.name))]
pub async fn by_name(session: &Session, args: &PathArgs) -> Result<()> {
    let trash = session.drive.trash_content().await?;
    let matches: Vec<_> = trash.iter().filter(|n| n.name() == args.name).collect();

    match matches.as_slice() {
        [] => bail!("no item named \"{}\" in trash", args.name),
        [node] => {
            session
                .drive
                .restore_node(node.is_folder(), node.uuid())
                .await?;
            println!("Restored {} \"{}\"", node.kind_str(), node.name());
            Ok(())
        }
        several => {
            eprintln!("Multiple items named \"{}\" in trash:", args.name);
            for node in several {
                eprintln!("  {} {}", node.uuid(), node.kind_str());
            }
            bail!("use restore-uuid to pick one");
        }
    }
}
