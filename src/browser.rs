//! Headless browser access.
//!
//! - `driver`: traits the capture pipeline is written against.
//! - `session`: one browser process scoped to one capture request.
//! - `cdp`: the Chromium implementation over the DevTools Protocol.

pub mod cdp;
pub mod driver;
#[cfg(test)]
pub mod fake;
pub mod session;

pub use cdp::ChromeLauncher;
pub use driver::{BrowserLauncher, BrowserProcess, BrowsingContext, SurfaceExport};
pub use session::CaptureSession;
