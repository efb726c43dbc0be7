//! Headless Chromium driven over the Chrome DevTools Protocol.
//!
//! One [`ChromeLauncher::launch`] spawns one browser with a throwaway profile
//! directory and connects to its DevTools websocket. Views get their own
//! browser context (separate cookies, storage and cache) inside that process.

pub mod connection;
pub mod page;
pub mod protocol;

use log::{debug, error, info, warn};
use serde_json::json;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, Command};
use tokio::time::timeout;

pub use connection::CdpConnection;
pub use page::ChromePage;

use super::driver::{BrowserLauncher, BrowserProcess};
use crate::configuration::types::BrowserConfig;
use crate::error_handling::types::{BrowserError, LaunchError};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Flags every capture browser runs with, before any configured extras.
const BASE_ARGS: &[&str] = &[
    "--headless=new",
    "--remote-debugging-port=0",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-dev-shm-usage",
    "--disable-background-networking",
    "--hide-scrollbars",
    "--mute-audio",
    "--use-angle=swiftshader",
    "--enable-unsafe-swiftshader",
];

pub struct ChromeLauncher {
    config: BrowserConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }

    fn command(&self, profile: &TempDir) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(BASE_ARGS)
            .arg(format!("--user-data-dir={}", profile.path().display()))
            .args(&self.config.args)
            .arg("about:blank")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Process = ChromeProcess;

    async fn launch(&self) -> Result<ChromeProcess, LaunchError> {
        let profile = tempfile::Builder::new()
            .prefix("viewcap-profile-")
            .tempdir()
            .map_err(LaunchError::SpawnFailed)?;

        let mut cmd = self.command(&profile);
        debug!("Spawning browser with command: {:?}", cmd);
        let mut child = cmd.spawn().map_err(|e| {
            error!("Failed to spawn {}: {}", self.config.executable, e);
            if e.kind() == std::io::ErrorKind::NotFound {
                LaunchError::ExecutableNotFound(self.config.executable.clone())
            } else {
                LaunchError::SpawnFailed(e)
            }
        })?;
        let pid = child.id().unwrap_or_default();

        let Some(stderr) = child.stderr.take() else {
            let _ = child.kill().await;
            return Err(LaunchError::DevToolsEndpointMissing);
        };
        let mut lines = BufReader::new(stderr).lines();

        let launch_timeout = Duration::from_secs(self.config.launch_timeout_secs);
        let ws_url = match timeout(launch_timeout, read_devtools_url(&mut lines, pid)).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                let _ = child.kill().await;
                return Err(LaunchError::DevToolsEndpointMissing);
            }
            Err(_) => {
                warn!("Browser {} did not announce DevTools within {:?}", pid, launch_timeout);
                let _ = child.kill().await;
                return Err(LaunchError::Timeout);
            }
        };

        // Keep draining stderr so the browser never blocks on a full pipe.
        tokio::spawn(async move {
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[chromium:{}][stderr] {}", pid, line);
            }
            debug!("stderr monitoring ended for browser {}", pid);
        });

        let connection = match CdpConnection::connect(&ws_url).await {
            Ok(connection) => connection,
            Err(e) => {
                let _ = child.kill().await;
                return Err(e);
            }
        };

        info!("Browser {} up, DevTools at {}", pid, ws_url);
        Ok(ChromeProcess {
            pid,
            child,
            connection: Arc::new(connection),
            profile: Some(profile),
        })
    }
}

async fn read_devtools_url(lines: &mut Lines<BufReader<ChildStderr>>, pid: u32) -> Option<String> {
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(url) = protocol::parse_devtools_line(&line) {
            return Some(url);
        }
        debug!("[chromium:{}][stderr] {}", pid, line);
    }
    None
}

/// A running Chromium plus its DevTools connection and profile directory.
pub struct ChromeProcess {
    pid: u32,
    child: Child,
    connection: Arc<CdpConnection>,
    profile: Option<TempDir>,
}

impl BrowserProcess for ChromeProcess {
    type Context = ChromePage;

    async fn open_context(&self) -> Result<ChromePage, BrowserError> {
        if self.connection.is_closed() {
            return Err(BrowserError::ConnectionClosed);
        }
        ChromePage::open(Arc::clone(&self.connection)).await
    }

    async fn terminate(mut self) -> Result<(), BrowserError> {
        // The browser drops the socket while handling this, so no reply is expected.
        let _ = timeout(
            SHUTDOWN_GRACE,
            self.connection.call("Browser.close", json!({}), None),
        )
        .await;

        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Browser {} exited with {}", self.pid, status),
            Ok(Err(e)) => warn!("Failed to wait for browser {}: {}", self.pid, e),
            Err(_) => {
                warn!("Browser {} ignored Browser.close, killing it", self.pid);
                self.child.kill().await?;
            }
        }

        if let Some(profile) = self.profile.take() {
            let path = profile.path().to_path_buf();
            profile.close().map_err(|e| {
                warn!("Failed to remove profile {}: {}", path.display(), e);
                BrowserError::Io(e)
            })?;
            debug!("Removed profile {}", path.display());
        }
        Ok(())
    }
}
