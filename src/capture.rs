//! Capture orchestration pipeline.
//!
//! - `types`: requests, per-view outcomes and the aggregated result.
//! - `view_task`: capture of one named view in its own browsing context.
//! - `orchestrator`: session lifecycle and the concurrent front/back capture.

pub mod orchestrator;
#[cfg(test)]
pub mod tests;
pub mod types;
pub mod view_task;

pub use orchestrator::CaptureOrchestrator;
pub use types::{
    CameraSettings, CaptureErrorKind, CaptureRequest, CaptureResult, OverallStatus, Vector3,
    ViewCaptureResult, ViewName,
};
