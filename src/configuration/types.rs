use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::types::CameraSettings;

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0"),
            port: 3001,
        }
    }
}

/// Where the rendered page lives and how long the capture waits for it.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct RenderTargetConfig {
    /// Views are loaded from `{base_url}/{customization_id}/{front|back}`
    pub base_url: String,
    pub page_load_timeout_secs: u64,
    pub surface_timeout_secs: u64,
    pub surface_poll_interval_ms: u64,
}

impl Default for RenderTargetConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:5173/capture"),
            page_load_timeout_secs: 120,
            surface_timeout_secs: 10,
            surface_poll_interval_ms: 250,
        }
    }
}

/// Fixed page geometry applied to every browsing context so that captured
/// pixel dimensions do not depend on the host.
#[derive(Debug, PartialEq, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl ViewportConfig {
    /// Size in device pixels of a surface filling the viewport.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width as f64 * self.device_scale_factor).round() as u32,
            (self.height as f64 * self.device_scale_factor).round() as u32,
        )
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 2.0,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub executable: String,
    /// Extra command line flags, e.g. `--no-sandbox` inside containers
    pub args: Vec<String>,
    pub launch_timeout_secs: u64,
    pub session_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: String::from("chromium"),
            args: Vec::new(),
            launch_timeout_secs: 30,
            session_timeout_secs: 180,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    pub public_base_url: String,
    /// `0` disables the post-persistence cleanup sweep
    pub retention_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("captures"),
            public_base_url: String::from("http://localhost:3001"),
            retention_secs: 0,
        }
    }
}

/// Everything a capture needs besides the request itself, resolved from
/// [`Config`](super::config::Config) once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    pub render_target_base_url: String,
    pub viewport: ViewportConfig,
    pub page_load_timeout: Duration,
    pub surface_timeout: Duration,
    pub surface_poll_interval: Duration,
    pub session_timeout: Duration,
    pub default_camera: CameraSettings,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let render_target = RenderTargetConfig::default();
        let browser = BrowserConfig::default();
        Self {
            render_target_base_url: render_target.base_url,
            viewport: ViewportConfig::default(),
            page_load_timeout: Duration::from_secs(render_target.page_load_timeout_secs),
            surface_timeout: Duration::from_secs(render_target.surface_timeout_secs),
            surface_poll_interval: Duration::from_millis(render_target.surface_poll_interval_ms),
            session_timeout: Duration::from_secs(browser.session_timeout_secs),
            default_camera: CameraSettings::default(),
        }
    }
}
