//! Seams between the capture pipeline and a concrete headless browser.
//!
//! The orchestrator only talks to these traits. [`ChromeLauncher`](super::cdp::ChromeLauncher)
//! implements them over the Chrome DevTools Protocol; tests use an in-process fake.
//! Everything crossing the boundary is a serializable value: settings go in as
//! JSON, the frame comes back as encoded bytes.

use std::future::Future;

use crate::capture::types::CameraSettings;
use crate::configuration::types::ViewportConfig;
use crate::error_handling::types::{BrowserError, LaunchError};

/// What the page returned when asked for its drawable surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceExport {
    /// No drawable surface element in the page (yet)
    Missing,
    /// PNG-encoded raster content
    Encoded(Vec<u8>),
    /// The surface exists but the page failed to encode it
    Failed(String),
}

/// Starts one browser process per call.
pub trait BrowserLauncher: Send + Sync + 'static {
    type Process: BrowserProcess;

    fn launch(&self) -> impl Future<Output = Result<Self::Process, LaunchError>> + Send;
}

/// A running browser process able to host isolated browsing contexts.
pub trait BrowserProcess: Send + Sync + 'static {
    type Context: BrowsingContext;

    /// Opens a new isolated context. Safe to call concurrently.
    fn open_context(&self) -> impl Future<Output = Result<Self::Context, BrowserError>> + Send;

    /// Terminates the process and everything it hosts.
    fn terminate(self) -> impl Future<Output = Result<(), BrowserError>> + Send;
}

/// One page-like context, exclusively owned by a single view task.
pub trait BrowsingContext: Send + 'static {
    fn set_viewport(
        &mut self,
        viewport: &ViewportConfig,
    ) -> impl Future<Output = Result<(), BrowserError>> + Send;

    /// Resolves once the page is loaded and the network is idle.
    fn navigate(&mut self, url: &str) -> impl Future<Output = Result<(), BrowserError>> + Send;

    /// Hands the camera settings to the page runtime.
    fn apply_settings(
        &mut self,
        settings: &CameraSettings,
    ) -> impl Future<Output = Result<(), BrowserError>> + Send;

    fn export_surface(&mut self) -> impl Future<Output = Result<SurfaceExport, BrowserError>> + Send;

    fn close(self) -> impl Future<Output = Result<(), BrowserError>> + Send;
}
