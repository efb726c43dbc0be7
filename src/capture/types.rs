//! Data model of a capture request and its outcome.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error_handling::types::RequestError;

/// Customization ids become a URL path segment and part of a storage key.
const CUSTOMIZATION_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{1,128}$";

pub const PNG_ENCODING: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

impl From<Vector3> for [f64; 3] {
    fn from(v: Vector3) -> Self {
        [v.x, v.y, v.z]
    }
}

/// Camera placement handed to the render target before the frame is read.
///
/// Serialized in camelCase, which is the shape the page reads from
/// `window.captureSettings`. Only presence is checked, not plausibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSettings {
    #[serde(alias = "field_of_view")]
    pub field_of_view: f64,
    #[serde(alias = "near_plane")]
    pub near_plane: f64,
    #[serde(alias = "far_plane")]
    pub far_plane: f64,
    pub position: Vector3,
    pub target: Vector3,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            field_of_view: 60.0,
            near_plane: 0.01,
            far_plane: 100.0,
            position: Vector3::ZERO,
            target: Vector3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewName {
    Front,
    Back,
}

impl ViewName {
    pub const ALL: [ViewName; 2] = [ViewName::Front, ViewName::Back];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewName::Front => "front",
            ViewName::Back => "back",
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated request, consumed once by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    customization_id: String,
    camera_settings: CameraSettings,
}

impl CaptureRequest {
    pub fn new(
        customization_id: impl Into<String>,
        camera_settings: CameraSettings,
    ) -> Result<Self, RequestError> {
        let customization_id = customization_id.into();
        if customization_id.is_empty() {
            return Err(RequestError::MissingCustomizationId);
        }
        if !customization_id_pattern().is_match(&customization_id) {
            return Err(RequestError::InvalidCustomizationId(customization_id));
        }
        Ok(Self {
            customization_id,
            camera_settings,
        })
    }

    pub fn customization_id(&self) -> &str {
        &self.customization_id
    }

    pub fn camera_settings(&self) -> &CameraSettings {
        &self.camera_settings
    }
}

fn customization_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(CUSTOMIZATION_ID_PATTERN).expect("customization id pattern is a valid regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureErrorKind {
    /// No browsing context could be opened or prepared in the live session
    ContextError,
    /// Navigation, load or the session deadline exceeded its budget
    Timeout,
    /// The render target could not be loaded at all
    NavigationError,
    /// The page loaded but never presented a drawable surface
    NoSurface,
    /// A surface was present but its raster export failed
    EncodingError,
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureErrorKind::ContextError => "ContextError",
            CaptureErrorKind::Timeout => "Timeout",
            CaptureErrorKind::NavigationError => "NavigationError",
            CaptureErrorKind::NoSurface => "NoSurface",
            CaptureErrorKind::EncodingError => "EncodingError",
        };
        f.write_str(s)
    }
}

/// Outcome of one view capture. Built once by the view task and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCaptureResult {
    Success {
        view: ViewName,
        image_bytes: Vec<u8>,
        encoding: &'static str,
    },
    Failure {
        view: ViewName,
        error_kind: CaptureErrorKind,
        message: String,
    },
}

impl ViewCaptureResult {
    pub fn png(view: ViewName, image_bytes: Vec<u8>) -> Self {
        ViewCaptureResult::Success {
            view,
            image_bytes,
            encoding: PNG_ENCODING,
        }
    }

    pub fn failure(view: ViewName, error_kind: CaptureErrorKind, message: impl Into<String>) -> Self {
        ViewCaptureResult::Failure {
            view,
            error_kind,
            message: message.into(),
        }
    }

    pub fn view(&self) -> ViewName {
        match self {
            ViewCaptureResult::Success { view, .. } | ViewCaptureResult::Failure { view, .. } => {
                *view
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ViewCaptureResult::Success { .. })
    }

    pub fn image_bytes(&self) -> Option<&[u8]> {
        match self {
            ViewCaptureResult::Success { image_bytes, .. } => Some(image_bytes),
            ViewCaptureResult::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<CaptureErrorKind> {
        match self {
            ViewCaptureResult::Success { .. } => None,
            ViewCaptureResult::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallStatus {
    Complete,
    PartialFailure,
    TotalFailure,
}

impl OverallStatus {
    pub fn from_views(front: &ViewCaptureResult, back: &ViewCaptureResult) -> Self {
        match (front.is_success(), back.is_success()) {
            (true, true) => OverallStatus::Complete,
            (false, false) => OverallStatus::TotalFailure,
            _ => OverallStatus::PartialFailure,
        }
    }
}

/// Aggregate of both views for one request. The status is derived, never set.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    request_id: Uuid,
    customization_id: String,
    front: ViewCaptureResult,
    back: ViewCaptureResult,
    overall_status: OverallStatus,
}

impl CaptureResult {
    pub fn new(
        request_id: Uuid,
        customization_id: impl Into<String>,
        front: ViewCaptureResult,
        back: ViewCaptureResult,
    ) -> Self {
        let overall_status = OverallStatus::from_views(&front, &back);
        Self {
            request_id,
            customization_id: customization_id.into(),
            front,
            back,
            overall_status,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn customization_id(&self) -> &str {
        &self.customization_id
    }

    pub fn front(&self) -> &ViewCaptureResult {
        &self.front
    }

    pub fn back(&self) -> &ViewCaptureResult {
        &self.back
    }

    pub fn view(&self, view: ViewName) -> &ViewCaptureResult {
        match view {
            ViewName::Front => &self.front,
            ViewName::Back => &self.back,
        }
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Hands both view outcomes over, front first.
    pub fn into_views(self) -> [ViewCaptureResult; 2] {
        [self.front, self.back]
    }
}
