//! Background-process lifecycle for the WebDAV server.
//!
//! `webdav-start --background` spawns a detached child that re-enters this
//! binary with the internal `--daemon` flag, verifies it came up, and
//! records its PID. Stopping signals the PID (TERM, then KILL after a grace
//! period) and sweeps any orphan still bound to the port.

use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Spawn a command as a daemon using `setsid()`.
///
/// The child becomes a session leader with no controlling terminal and all
/// standard streams on /dev/null. Returns the child's PID without waiting.
#[cfg(unix)]
#[allow(unsafe_code)]
pub fn spawn_as_daemon(command: &mut Command) -> std::io::Result<u32> {
    use std::os::unix::process::CommandExt;

    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());

    // setsid() creates a new session and process group; the child must not
    // already be a group leader, which a freshly forked child never is.
    // SAFETY: the pre_exec hook runs in the forked child before exec and
    // only calls the async-signal-safe setsid().
    unsafe {
        command.pre_exec(|| match nix::unistd::setsid() {
            Ok(_) => Ok(()),
            Err(e) => Err(std::io::Error::from_raw_os_error(e as i32)),
        });
    }

    let child = command.spawn()?;
    Ok(child.id())
}

#[cfg(not(unix))]
pub fn spawn_as_daemon(command: &mut Command) -> std::io::Result<u32> {
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::null());
    let child = command.spawn()?;
    Ok(child.id())
}

/// Whether a process with this PID is alive.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0: existence probe only.
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_process_running(pid: u32) -> bool {
    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {pid}")])
        .output();
    match output {
        Ok(out) => String::from_utf8_lossy(&out.stdout).contains(&pid.to_string()),
        Err(_) => false,
    }
}

/// Terminate a process: SIGTERM first, SIGKILL if it lingers past the grace
/// period.
#[cfg(unix)]
pub fn kill_process(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);
    if kill(target, Signal::SIGTERM).is_err() {
        return false;
    }

    std::thread::sleep(KILL_GRACE);
    if is_process_running(pid) {
        debug!(pid, "process survived SIGTERM, escalating");
        let _ = kill(target, Signal::SIGKILL);
    }
    true
}

#[cfg(not(unix))]
pub fn kill_process(pid: u32) -> bool {
    Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Find and terminate any process bound to the port. Cleans up orphans that
/// outlived their PID file.
#[cfg(unix)]
pub fn kill_process_by_port(port: u16) -> bool {
    let output = match Command::new("lsof")
        .args(["-t", "-i", &format!(":{port}")])
        .output()
    {
        Ok(output) => output,
        Err(e) => {
            debug!(error = %e, "lsof not available");
            return false;
        }
    };

    let mut killed_any = false;
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if let Ok(pid) = line.trim().parse::<u32>() {
            warn!(pid, port, "terminating orphan process on port");
            if kill_process(pid) {
                killed_any = true;
            }
        }
    }
    killed_any
}

#[cfg(not(unix))]
pub fn kill_process_by_port(_port: u16) -> bool {
    false
}

/// Result of probing a WebDAV endpoint.
pub struct ProbeResult {
    pub success: bool,
    pub message: String,
}

/// Probe a WebDAV server with an authenticated depth-0 PROPFIND.
///
/// A healthy server answers 207 Multi-Status with an XML body.
pub async fn probe_webdav(url: &str, username: &str, password: &str) -> ProbeResult {
    const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
    <D:prop>
        <D:resourcetype/>
    </D:prop>
</D:propfind>"#;

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            return ProbeResult {
                success: false,
                message: format!("could not build HTTP client: {e}"),
            }
        }
    };

    let method = reqwest::Method::from_bytes(b"PROPFIND").expect("valid method token");
    let result = client
        .request(method, url)
        .basic_auth(username, Some(password))
        .header("Depth", "0")
        .header("Content-Type", "application/xml")
        .body(PROPFIND_BODY)
        .send()
        .await;

    match result {
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            if status.as_u16() == 207 && body.contains("<?xml") {
                ProbeResult {
                    success: true,
                    message: "connection successful (207 Multi-Status)".to_string(),
                }
            } else {
                ProbeResult {
                    success: false,
                    message: format!("server answered HTTP {status}"),
                }
            }
        }
        Err(e) if e.is_timeout() => ProbeResult {
            success: false,
            message: "connection timed out - is the server running?".to_string(),
        },
        Err(e) if e.is_connect() => ProbeResult {
            success: false,
            message: "connection refused - server is not running or unreachable".to_string(),
        },
        Err(e) => ProbeResult {
            success: false,
            message: format!("connection test failed: {e}"),
        },
    }
}

/// Re-invoke this binary detached with the internal daemon flag.
pub fn spawn_webdav_daemon(port: u16) -> Result<u32> {
    let exe = std::env::current_exe().context("could not locate own executable")?;
    let mut command = Command::new(exe);
    command
        .arg("webdav-start")
        .arg("--daemon")
        .arg("--port")
        .arg(port.to_string());
    let pid = spawn_as_daemon(&mut command).context("failed to spawn background server")?;
    Ok(pid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn absent_process_is_not_running() {
        // PID near the typical pid_max; extremely unlikely to exist in CI.
        assert!(!is_process_running(4_194_000));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_as_daemon_detaches() {
        let mut cmd = Command::new("true");
        let pid = spawn_as_daemon(&mut cmd).unwrap();
        assert!(pid > 0);
        std::thread::sleep(Duration::from_millis(100));
    }
}
