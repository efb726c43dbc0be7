use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::driver::{BrowserLauncher, BrowserProcess};
use crate::error_handling::types::{BrowserError, LaunchError};

/// Lifetime scope of one browser process used by one capture request.
///
/// The session hands out browsing contexts while it is open and terminates the
/// process on [`close`](CaptureSession::close). Closing is idempotent. A session
/// dropped while still open logs a warning; the process itself is still reaped
/// by the driver (the CDP driver spawns it with `kill_on_drop`).
pub struct CaptureSession<P: BrowserProcess> {
    id: String,
    process: Option<P>,
    created_at: DateTime<Utc>,
    deadline: Instant,
}

impl<P: BrowserProcess> CaptureSession<P> {
    /// Launches a browser process through `launcher` and bounds the session to `lifetime`.
    pub async fn open<L>(launcher: &L, lifetime: Duration) -> Result<Self, LaunchError>
    where
        L: BrowserLauncher<Process = P>,
    {
        let id = format!("viewcap-{}", Uuid::new_v4());
        debug!("[{}] Launching browser process", id);

        let process = launcher.launch().await?;
        let session = Self {
            id,
            process: Some(process),
            created_at: Utc::now(),
            deadline: Instant::now() + lifetime,
        };

        info!(
            "[{}] Capture session opened (expires at {})",
            session.id,
            session.expires_at().to_rfc3339()
        );
        Ok(session)
    }

    /// Opens an isolated browsing context in the live process.
    pub async fn new_context(&self) -> Result<P::Context, BrowserError> {
        match self.process {
            Some(ref process) => {
                let context = process.open_context().await?;
                debug!("[{}] Browsing context opened", self.id);
                Ok(context)
            }
            None => {
                warn!("[{}] Context requested after session close", self.id);
                Err(BrowserError::ContextClosed)
            }
        }
    }

    /// Terminates the browser process. A second call is a no-op.
    pub async fn close(&mut self) -> Result<(), BrowserError> {
        let Some(process) = self.process.take() else {
            debug!("[{}] Capture session already closed", self.id);
            return Ok(());
        };

        let lived = Utc::now() - self.created_at;
        let result = process.terminate().await;
        match result {
            Ok(()) => info!(
                "[{}] Capture session closed after {} ms",
                self.id,
                lived.num_milliseconds()
            ),
            Err(ref e) => warn!("[{}] Browser termination reported an error: {}", self.id, e),
        }
        result
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Monotonic instant after which view tasks are cut short.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let remaining = chrono::Duration::from_std(remaining).unwrap_or(chrono::Duration::MAX);
        Utc::now().checked_add_signed(remaining).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_closed(&self) -> bool {
        self.process.is_none()
    }
}

impl<P: BrowserProcess> Drop for CaptureSession<P> {
    fn drop(&mut self) {
        if self.process.is_some() {
            warn!(
                "[{}] Capture session dropped without close; relying on process reaping",
                self.id
            );
        }
    }
}
