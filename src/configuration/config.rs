use super::types::*;
use crate::capture::types::CameraSettings;
use crate::error_handling::types::ConfigError;
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// The configuration is read from a TOML file where every section is optional and
/// falls back to its defaults (port 3001, 1920x1080 at 2x). Command-line and
/// environment overrides are applied afterwards through [`ConfigOverrides`].
///
/// # Examples
///
/// ```
/// use viewcap::configuration::config::Config;
///
/// let config = Config::from_toml_str("[server]\nport = 8080\n").unwrap();
/// assert_eq!(config.server.port, 8080);
/// assert_eq!(config.viewport.width, 1920);
/// ```
///
/// # Fields Overview
///
/// - `server`: address and port of the HTTP endpoint
/// - `render_target`: base URL of the page rendering the model, plus load and surface timeouts
/// - `viewport`: fixed resolution and device scale factor used for every view
/// - `camera`: camera settings injected when a request does not carry its own
/// - `browser`: headless browser executable, extra flags, launch and session lifetimes
/// - `storage`: local artifact directory, public URL prefix and retention
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub render_target: RenderTargetConfig,
    pub viewport: ViewportConfig,
    pub camera: CameraSettings,
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
}

/// Values coming from the command line or the environment, applied on top of the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    /// Root URL of the client application; `/capture` is appended to form the render target base
    pub client_url: Option<String>,
    pub storage_dir: Option<PathBuf>,
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            debug!("Overriding server port with {}", port);
            self.server.port = port;
        }
        if let Some(ref url) = overrides.client_url {
            self.render_target.base_url = format!("{}/capture", url.trim_end_matches('/'));
            debug!(
                "Overriding render target base URL with {}",
                self.render_target.base_url
            );
        }
        if let Some(ref dir) = overrides.storage_dir {
            debug!("Overriding storage directory with {}", dir.display());
            self.storage.directory = dir.clone();
        }
    }

    /// Checks the values that would otherwise only fail at capture time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.render_target.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "render target base URL must be http(s): {}",
                base
            )));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ConfigError::Invalid(
                "viewport dimensions must be non-zero".to_string(),
            ));
        }
        if !(self.viewport.device_scale_factor > 0.0) {
            return Err(ConfigError::Invalid(
                "device scale factor must be positive".to_string(),
            ));
        }
        if self.render_target.page_load_timeout_secs == 0
            || self.render_target.surface_timeout_secs == 0
            || self.render_target.surface_poll_interval_ms == 0
            || self.browser.launch_timeout_secs == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".to_string()));
        }
        if self.browser.session_timeout_secs < self.render_target.page_load_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "session timeout ({}s) is shorter than the page load timeout ({}s)",
                self.browser.session_timeout_secs, self.render_target.page_load_timeout_secs
            )));
        }
        if self.browser.executable.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "browser executable must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            render_target_base_url: self.render_target.base_url.trim_end_matches('/').to_string(),
            viewport: self.viewport,
            page_load_timeout: Duration::from_secs(self.render_target.page_load_timeout_secs),
            surface_timeout: Duration::from_secs(self.render_target.surface_timeout_secs),
            surface_poll_interval: Duration::from_millis(
                self.render_target.surface_poll_interval_ms,
            ),
            session_timeout: Duration::from_secs(self.browser.session_timeout_secs),
            default_camera: self.camera.clone(),
        }
    }
}
