#![deny(unsafe_code)]

mod commands;
mod daemon;
mod exit_code;
mod output;
mod prompt;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filen_core::api::ApiError;
use filen_core::auth::AuthError;
use filen_core::drive::DriveError;

use commands::{
    config, cp, delete_path, download, download_path, find, list_trash, login, ls, mkdir, mv,
    rename, resolve, restore, search, trash, tree, upload, verify, webdav,
};

/// Command-line client for the Filen encrypted drive
#[derive(Parser)]
#[command(name = "filen")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Login and look around
    filen login
    filen ls /

    # Upload a folder, resumable
    filen upload ~/photos -t /backup/photos -r

    # Download a folder tree
    filen download-path /backup/photos -r -t ./photos

    # Serve the drive over WebDAV in the background
    filen webdav-start --background
")]
struct Cli {
    /// Enable debug traces
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Skip confirmation prompts; conflicts are overwritten
    #[arg(short, long, global = true)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    // ============ Session ============
    /// Login to your account
    Login(login::Args),
    /// Logout and clear credentials
    Logout,
    /// Show the current user
    Whoami,

    // ============ Namespace ============
    /// List folder contents
    Ls(ls::Args),
    /// Create folder(s), parents included
    Mkdir(mkdir::Args),
    /// Upload files (batched, resumable)
    Upload(upload::Args),
    /// Download a single file by path or UUID
    Download(download::Args),
    /// Download a remote path (recursive for folders, resumable)
    DownloadPath(download_path::Args),
    /// Move files or folders
    Mv(mv::Args),
    /// Copy a file (download + re-upload)
    Cp(cp::Args),
    /// Rename an item in place
    Rename(rename::Args),
    /// Move an item to the trash
    Trash(trash::Args),
    /// Permanently delete an item
    DeletePath(delete_path::Args),
    /// Verify an upload against the server digest
    Verify(verify::Args),

    // ============ Trash ============
    /// Show trash contents
    ListTrash(list_trash::Args),
    /// Restore a trashed item by UUID
    RestoreUuid(restore::UuidArgs),
    /// Restore a trashed item by name
    RestorePath(restore::PathArgs),

    // ============ Inspection ============
    /// Show what a path resolves to
    Resolve(resolve::Args),
    /// Search the whole drive by filename
    Search(search::Args),
    /// Find files under a path by pattern
    Find(find::Args),
    /// Show a folder tree
    Tree(tree::Args),

    // ============ WebDAV ============
    /// Serve the drive over WebDAV in the foreground
    Mount(webdav::PortArgs),
    /// Start the WebDAV server (use --background to detach)
    WebdavStart(webdav::StartArgs),
    /// Stop the background WebDAV server
    WebdavStop(webdav::PortArgs),
    /// Show background WebDAV server status
    WebdavStatus(webdav::PortArgs),
    /// Probe the WebDAV server with a PROPFIND
    WebdavTest(webdav::PortArgs),
    /// Print per-OS mount instructions
    WebdavMount(webdav::PortArgs),
    /// Show the WebDAV server configuration
    WebdavConfig(webdav::PortArgs),

    // ============ Misc ============
    /// Show configuration, paths and session
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::from(exit_code::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(categorize_error(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let force = cli.force;

    match cli.command {
        // Commands that work without a stored session.
        Commands::Login(args) => login::login(&args).await,
        Commands::Logout => login::logout(),
        Commands::Whoami => login::whoami(),
        Commands::Config => config::execute(),

        Commands::Mount(args) => webdav::mount(&args).await,
        Commands::WebdavStart(args) => webdav::start(&args).await,
        Commands::WebdavStop(args) => webdav::stop(&args).await,
        Commands::WebdavStatus(args) => webdav::status(&args).await,
        Commands::WebdavTest(args) => webdav::test(&args).await,
        Commands::WebdavMount(args) => webdav::mount_instructions(&args),
        Commands::WebdavConfig(args) => webdav::show_config(&args),

        // Everything else needs the stored session.
        command => {
            let session = commands::connect()?;
            match command {
                Commands::Ls(args) => ls::execute(&session, &args).await,
                Commands::Mkdir(args) => mkdir::execute(&session, &args).await,
                Commands::Upload(args) => upload::execute(&session, &args, force).await,
                Commands::Download(args) => download::execute(&session, &args, force).await,
                Commands::DownloadPath(args) => {
                    download_path::execute(&session, &args, force).await
                }
                Commands::Mv(args) => mv::execute(&session, &args).await,
                Commands::Cp(args) => cp::execute(&session, &args).await,
                Commands::Rename(args) => rename::execute(&session, &args).await,
                Commands::Trash(args) => trash::execute(&session, &args, force).await,
                Commands::DeletePath(args) => delete_path::execute(&session, &args, force).await,
                Commands::Verify(args) => verify::execute(&session, &args).await,
                Commands::ListTrash(args) => list_trash::execute(&session, &args).await,
                Commands::RestoreUuid(args) => restore::by_uuid(&session, &args).await,
                Commands::RestorePath(args) => restore::by_name(&session, &args).await,
                Commands::Resolve(args) => resolve::execute(&session, &args).await,
                Commands::Search(args) => search::execute(&session, &args).await,
                Commands::Find(args) => find::execute(&session, &args).await,
                Commands::Tree(args) => tree::execute(&session, &args).await,
                _ => unreachable!("sessionless commands handled above"),
            }
        }
    }
}

/// Set up tracing based on the verbose flag. Quiet by default; `-v` shows
/// debug traces including the underlying error chain context.
fn setup_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_writer(io::stderr)
        .init();
}

/// Map an error chain to an exit code by downcasting the typed errors.
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(auth_err) = cause.downcast_ref::<AuthError>() {
            if matches!(auth_err, AuthError::MissingCredentials) {
                return exit_code::AUTH_FAILED;
            }
        }
        if let Some(api_err) = cause.downcast_ref::<ApiError>() {
            return match api_err {
                ApiError::NotAuthenticated
                | ApiError::NeedTwoFactor
                | ApiError::WrongTwoFactor => exit_code::AUTH_FAILED,
                ApiError::Network(_) | ApiError::Server { .. } => exit_code::NETWORK_ERROR,
                _ => exit_code::GENERAL_ERROR,
            };
        }
        if let Some(drive_err) = cause.downcast_ref::<DriveError>() {
            if matches!(drive_err, DriveError::NotFound { .. }) {
                return exit_code::NOT_FOUND;
            }
        }
    }

    let message = format!("{e:#}").to_lowercase();
    if message.contains("completed with") && message.contains("errors") {
        exit_code::PARTIAL_FAILURE
    } else {
        exit_code::GENERAL_ERROR
    }
}
