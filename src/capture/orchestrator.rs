use futures_util::FutureExt;
use log::{error, info, warn};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use uuid::Uuid;

use super::types::{CaptureRequest, CaptureResult, OverallStatus, ViewCaptureResult, ViewName};
use super::view_task::ViewCaptureTask;
use crate::browser::driver::{BrowserLauncher, BrowserProcess};
use crate::browser::session::CaptureSession;
use crate::configuration::types::CaptureSettings;
use crate::error_handling::types::OrchestratorError;

/// Runs one capture request end to end.
///
/// Each call opens its own [`CaptureSession`], captures the front and back views
/// concurrently in two isolated contexts of that session, waits for both, and
/// closes the session before returning. Per-view problems are folded into the
/// [`CaptureResult`]; only a failed launch (or a panic inside capture, caught
/// after teardown) is returned as an error.
pub struct CaptureOrchestrator<L: BrowserLauncher> {
    launcher: L,
    settings: CaptureSettings,
}

impl<L: BrowserLauncher> CaptureOrchestrator<L> {
    pub fn new(launcher: L, settings: CaptureSettings) -> Self {
        Self { launcher, settings }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureResult, OrchestratorError> {
        let request_id = Uuid::new_v4();
        info!(
            "[{}] Capture requested for customization {}",
            request_id,
            request.customization_id()
        );

        let mut session = CaptureSession::open(&self.launcher, self.settings.session_timeout)
            .await
            .map_err(|e| {
                error!("[{}] Unable to open a capture session: {}", request_id, e);
                OrchestratorError::Launch(e)
            })?;

        let views = self.capture_views(&session, &request).await;

        if let Err(e) = session.close().await {
            warn!("[{}] Session teardown error: {}", request_id, e);
        }

        let (front, back) = views.map_err(|message| {
            error!("[{}] Capture aborted by a panic: {}", request_id, message);
            OrchestratorError::Internal(message)
        })?;

        let result = CaptureResult::new(request_id, request.customization_id(), front, back);
        match result.overall_status() {
            OverallStatus::Complete => info!("[{}] Capture complete", request_id),
            status => warn!("[{}] Capture finished with {:?}", request_id, status),
        }
        Ok(result)
    }

    /// Captures both views; a panic in either is reported once both have finished.
    async fn capture_views<P: BrowserProcess>(
        &self,
        session: &CaptureSession<P>,
        request: &CaptureRequest,
    ) -> Result<(ViewCaptureResult, ViewCaptureResult), String> {
        let task = |view| {
            let task = ViewCaptureTask::new(
                view,
                request.customization_id(),
                request.camera_settings(),
                &self.settings,
            );
            AssertUnwindSafe(task.run(session)).catch_unwind()
        };

        // Joined, not raced: a failing view never cancels its sibling.
        let (front, back) = tokio::join!(task(ViewName::Front), task(ViewName::Back));

        match (front, back) {
            (Ok(front), Ok(back)) => Ok((front, back)),
            (Err(panic), _) | (_, Err(panic)) => Err(panic_message(panic.as_ref())),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
