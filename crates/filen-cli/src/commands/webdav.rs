//! WebDAV server commands: foreground mount, background lifecycle,
//! status/test helpers and mount instructions.

use anyhow::{bail, Context, Result};
use clap::Args as ClapArgs;
use filen_webdav::{FilenDavFs, ServerConfig, WebDavServer};
use tracing::{info, instrument, warn};

use crate::daemon;

use super::{connect, open_store_and_api};

#[derive(ClapArgs, Clone)]
pub struct StartArgs {
    /// Port to listen on (defaults to the saved configuration)
    #[arg(long)]
    pub port: Option<u16>,

    /// Run detached in the background
    #[arg(long)]
    pub background: bool,

    /// Internal: this process is the detached server child
    #[arg(long, hide = true)]
    pub daemon: bool,
}

#[derive(ClapArgs, Clone)]
pub struct PortArgs {
    /// Server port
    #[arg(long)]
    pub port: Option<u16>,
}

fn effective_port(store: &filen_core::state::StateStore, flag: Option<u16>) -> u16 {
    flag.unwrap_or_else(|| store.read_webdav_config().port)
}

/// Run the server in the foreground until interrupted.
async fn serve_foreground(port: u16) -> Result<()> {
    let session = connect()?;
    let config = session.store.read_webdav_config();

    let server_config = ServerConfig {
        port,
        bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
        username: config.username.clone(),
        password: config.password.clone(),
    };

    let fs = FilenDavFs::new(session.drive.clone());
    let server = WebDavServer::start(fs, server_config)
        .await
        .context("failed to start WebDAV server")?;

    println!("WebDAV server running at {}", server.url());
    println!("  Account: {}", session.credentials.email);
    println!("  User: {}", config.username);
    println!("  Pass: {}", config.password);
    println!("Press Ctrl+C to stop.");

    wait_for_shutdown().await;
    println!("Stopping...");
    server.stop().await;
    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// `mount`: foreground server, same as `webdav-start` without flags.
#[instrument(level = "info", name = "cmd::mount", skip_all)]
pub async fn mount(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let port = effective_port(&store, args.port);
    println!("Mounting drive via WebDAV on port {port}...");
    serve_foreground(port).await
}

#[instrument(level = "info", name = "cmd::webdav_start", skip_all)]
pub async fn start(args: &StartArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let port = effective_port(&store, args.port);

    // Child process: just serve. The parent owns the PID file.
    if args.daemon {
        info!(port, "daemon child starting");
        return serve_foreground(port).await;
    }

    // Refuse a second instance.
    if let Some(existing) = store.read_webdav_pid() {
        if daemon::is_process_running(existing) {
            bail!(
                "WebDAV server is already running (PID {existing}) - run \"filen webdav-stop\" first"
            );
        }
        warn!(pid = existing, "clearing stale PID file");
        let _ = store.clear_webdav_pid();
    }

    if !args.background {
        return serve_foreground(port).await;
    }

    println!("Starting WebDAV server in the background...");
    let pid = daemon::spawn_webdav_daemon(port)?;

    // Give the child a moment, then make sure it survived startup.
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    if !daemon::is_process_running(pid) {
        let _ = store.clear_webdav_pid();
        bail!("background server exited during startup - run with --verbose in the foreground to see why");
    }

    store.save_webdav_pid(pid)?;
    let config = store.read_webdav_config();

    println!("WebDAV server started (PID {pid})");
    println!("  URL:  http://localhost:{port}/");
    println!("  User: {}", config.username);
    println!("  Pass: {}", config.password);
    println!("Use \"filen webdav-test\" to verify, \"filen webdav-stop\" to stop.");
    Ok(())
}

#[instrument(level = "info", name = "cmd::webdav_stop", skip_all)]
pub async fn stop(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    println!("Stopping WebDAV server...");

    let mut stopped = false;
    if let Some(pid) = store.read_webdav_pid() {
        if daemon::is_process_running(pid) && daemon::kill_process(pid) {
            println!("Server process (PID {pid}) terminated.");
            stopped = true;
        }
        let _ = store.clear_webdav_pid();
    }

    // Sweep orphans still holding the port.
    let port = effective_port(&store, args.port);
    if daemon::kill_process_by_port(port) {
        println!("Cleaned up orphan process on port {port}.");
        stopped = true;
    }

    if !stopped {
        println!("No running server found (no PID file, nothing on port {port}).");
    }
    Ok(())
}

#[instrument(level = "info", name = "cmd::webdav_status", skip_all)]
pub async fn status(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let port = effective_port(&store, args.port);

    let Some(pid) = store.read_webdav_pid() else {
        bail!("WebDAV server is not running (no PID file). Start with \"filen webdav-start --background\"");
    };

    if !daemon::is_process_running(pid) {
        bail!("PID file exists but process {pid} is gone - run \"filen webdav-stop\" to clean up");
    }

    let config = store.read_webdav_config();
    println!("WebDAV server is running.");
    println!("  PID:  {pid}");
    println!("  URL:  http://localhost:{port}/");
    println!("  User: {}", config.username);
    println!("  Pass: {}", config.password);

    // The process being alive does not prove it is serving; probe it too.
    let url = format!("http://localhost:{port}/");
    let probe = daemon::probe_webdav(&url, &config.username, &config.password).await;
    if probe.success {
        println!("  Probe: OK ({})", probe.message);
    } else {
        println!("  Probe: FAILED ({})", probe.message);
    }
    Ok(())
}

#[instrument(level = "info", name = "cmd::webdav_test", skip_all)]
pub async fn test(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let port = effective_port(&store, args.port);
    let config = store.read_webdav_config();
    let url = format!("http://localhost:{port}/");

    println!("Testing WebDAV connection at {url} ...");
    let probe = daemon::probe_webdav(&url, &config.username, &config.password).await;

    if probe.success {
        println!("OK: {}", probe.message);
        Ok(())
    } else {
        bail!("{}", probe.message);
    }
}

#[instrument(level = "info", name = "cmd::webdav_mount", skip_all)]
pub fn mount_instructions(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let port = effective_port(&store, args.port);
    let config = store.read_webdav_config();
    let url = format!("http://localhost:{port}/");

    println!("Mount instructions");
    println!("  Server URL: {url}");
    println!("  Username:   {}", config.username);
    println!("  Password:   {}", config.password);
    println!();
    println!("macOS: Finder > Go > Connect to Server (Cmd+K), enter the URL.");
    println!("Windows: Explorer > Map network drive, enter the URL and tick");
    println!("  \"Connect using different credentials\".");
    println!("Linux (davfs2):");
    println!("  sudo mount -t davfs {url} /mnt/filen");
    Ok(())
}

#[instrument(level = "info", name = "cmd::webdav_config", skip_all)]
pub fn show_config(args: &PortArgs) -> Result<()> {
    let (store, _api) = open_store_and_api()?;
    let config = store.read_webdav_config();
    let port = args.port.unwrap_or(config.port);

    println!("WebDAV server configuration");
    println!("  Host:     localhost");
    println!("  Port:     {port}");
    println!("  User:     {}", config.username);
    println!("  Pass:     {}", config.password);
    println!("  Protocol: {}", config.protocol);
    println!("  PID file: {}", store.webdav_pid_path().display());
    Ok(())
}
