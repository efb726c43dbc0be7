use serde::{Deserialize, Serialize};

use crate::capture::types::{CameraSettings, CaptureRequest};
use crate::error_handling::types::RequestError;
use crate::storage::types::PersistedViews;

/// Body of `POST /api/capture`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    #[serde(default)]
    pub customization_id: Option<String>,
    /// Overrides the configured camera for this request only
    #[serde(default)]
    pub camera_settings: Option<CameraSettings>,
}

impl CaptureBody {
    pub fn into_request(self, default_camera: &CameraSettings) -> Result<CaptureRequest, RequestError> {
        let customization_id = self
            .customization_id
            .ok_or(RequestError::MissingCustomizationId)?;
        let camera = self
            .camera_settings
            .unwrap_or_else(|| default_camera.clone());
        CaptureRequest::new(customization_id, camera)
    }
}

/// Per-view URLs; a failed or unstored view is an explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrls {
    pub front: Option<String>,
    pub back: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageUrls>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureResponse {
    pub fn captured(views: PersistedViews) -> Self {
        Self {
            success: true,
            images: Some(ImageUrls {
                front: views.front,
                back: views.back,
            }),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            images: None,
            error: Some(error.into()),
        }
    }
}
