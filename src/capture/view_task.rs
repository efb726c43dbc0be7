//! Capture of a single named view inside a live session.
//!
//! The task opens its own browsing context, loads `{base}/{customization}/{view}`,
//! injects the camera settings, waits for the drawable surface and exports it as
//! PNG. Every problem ends up as a [`ViewCaptureResult::Failure`]; nothing here
//! can fail the sibling view or the session.

use futures_util::FutureExt;
use image::ImageFormat;
use log::{debug, info, warn};
use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tokio::time::{timeout, timeout_at, Instant};

use super::types::{CameraSettings, CaptureErrorKind, ViewCaptureResult, ViewName};
use crate::browser::driver::{BrowserProcess, BrowsingContext, SurfaceExport};
use crate::browser::session::CaptureSession;
use crate::configuration::types::CaptureSettings;

/// Upper bound for tearing a context down, so a wedged page cannot hold up the join.
const CONTEXT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the render target address of one view.
pub fn render_target_url(base_url: &str, customization_id: &str, view: ViewName) -> String {
    format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        customization_id,
        view
    )
}

struct ViewFailure {
    kind: CaptureErrorKind,
    message: String,
}

impl ViewFailure {
    fn new(kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One view capture, borrowing the read-only inputs shared with its sibling.
pub struct ViewCaptureTask<'a> {
    view: ViewName,
    customization_id: &'a str,
    camera: &'a CameraSettings,
    settings: &'a CaptureSettings,
}

impl<'a> ViewCaptureTask<'a> {
    pub fn new(
        view: ViewName,
        customization_id: &'a str,
        camera: &'a CameraSettings,
        settings: &'a CaptureSettings,
    ) -> Self {
        Self {
            view,
            customization_id,
            camera,
            settings,
        }
    }

    /// Runs the capture against `session`, always producing exactly one result.
    pub async fn run<P: BrowserProcess>(self, session: &CaptureSession<P>) -> ViewCaptureResult {
        let tag = format!("{}:{}", session.id(), self.view);

        let mut context = match session.new_context().await {
            Ok(context) => context,
            Err(e) => {
                warn!("[{}] Could not open browsing context: {}", tag, e);
                return ViewCaptureResult::failure(
                    self.view,
                    CaptureErrorKind::ContextError,
                    e.to_string(),
                );
            }
        };

        let driven = AssertUnwindSafe(timeout_at(
            session.deadline(),
            self.drive(&mut context, &tag),
        ))
        .catch_unwind()
        .await;

        match timeout(CONTEXT_CLOSE_TIMEOUT, context.close()).await {
            Ok(Ok(())) => debug!("[{}] Browsing context closed", tag),
            Ok(Err(e)) => warn!("[{}] Browsing context close failed: {}", tag, e),
            Err(_) => warn!("[{}] Browsing context close timed out", tag),
        }

        // The context is gone; let the orchestrator see the panic.
        let outcome = match driven {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ViewFailure::new(
                CaptureErrorKind::Timeout,
                "capture session deadline exceeded",
            )),
            Err(panic) => {
                warn!("[{}] Capture panicked, context released", tag);
                panic::resume_unwind(panic)
            }
        };

        match outcome {
            Ok(image_bytes) => {
                info!("[{}] Captured {} byte(s) of PNG", tag, image_bytes.len());
                ViewCaptureResult::png(self.view, image_bytes)
            }
            Err(failure) => {
                warn!(
                    "[{}] Capture failed ({}): {}",
                    tag, failure.kind, failure.message
                );
                ViewCaptureResult::failure(self.view, failure.kind, failure.message)
            }
        }
    }

    async fn drive<C: BrowsingContext>(
        &self,
        context: &mut C,
        tag: &str,
    ) -> Result<Vec<u8>, ViewFailure> {
        context
            .set_viewport(&self.settings.viewport)
            .await
            .map_err(|e| ViewFailure::new(CaptureErrorKind::ContextError, e.to_string()))?;

        let url = render_target_url(
            &self.settings.render_target_base_url,
            self.customization_id,
            self.view,
        );
        debug!("[{}] Navigating to {}", tag, url);
        match timeout(self.settings.page_load_timeout, context.navigate(&url)).await {
            Ok(Ok(())) => debug!("[{}] Page loaded", tag),
            Ok(Err(e)) => {
                return Err(ViewFailure::new(
                    CaptureErrorKind::NavigationError,
                    e.to_string(),
                ))
            }
            Err(_) => {
                return Err(ViewFailure::new(
                    CaptureErrorKind::Timeout,
                    format!(
                        "page load exceeded {} s",
                        self.settings.page_load_timeout.as_secs()
                    ),
                ))
            }
        }

        context
            .apply_settings(self.camera)
            .await
            .map_err(|e| ViewFailure::new(CaptureErrorKind::ContextError, e.to_string()))?;

        let bytes = self.await_surface(context, tag).await?;
        check_png(&bytes)?;
        Ok(bytes)
    }

    /// Polls the page until its surface can be exported or the surface budget runs out.
    async fn await_surface<C: BrowsingContext>(
        &self,
        context: &mut C,
        tag: &str,
    ) -> Result<Vec<u8>, ViewFailure> {
        let give_up_at = Instant::now() + self.settings.surface_timeout;
        loop {
            let export = context
                .export_surface()
                .await
                .map_err(|e| ViewFailure::new(CaptureErrorKind::EncodingError, e.to_string()))?;
            match export {
                SurfaceExport::Encoded(bytes) => return Ok(bytes),
                SurfaceExport::Failed(e) => {
                    return Err(ViewFailure::new(CaptureErrorKind::EncodingError, e))
                }
                SurfaceExport::Missing => {
                    if Instant::now() >= give_up_at {
                        return Err(ViewFailure::new(
                            CaptureErrorKind::NoSurface,
                            "page loaded without a drawable surface",
                        ));
                    }
                    log::trace!("[{}] Surface not ready, polling again", tag);
                    tokio::time::sleep(self.settings.surface_poll_interval).await;
                }
            }
        }
    }
}

fn check_png(bytes: &[u8]) -> Result<(), ViewFailure> {
    let reader = image::ImageReader::with_format(Cursor::new(bytes), ImageFormat::Png);
    reader
        .into_dimensions()
        .map(|(width, height)| debug!("Exported surface is {}x{}", width, height))
        .map_err(|e| {
            ViewFailure::new(
                CaptureErrorKind::EncodingError,
                format!("surface export is not a valid PNG: {}", e),
            )
        })
}
