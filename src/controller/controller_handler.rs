use log::{error, info};
use std::sync::Arc;
use std::time::Duration;

use crate::browser::cdp::ChromeLauncher;
use crate::capture::orchestrator::CaptureOrchestrator;
use crate::configuration::config::Config;
use crate::error_handling::types::ControllerError;
use crate::storage::file_storage::FileArtifactStore;
use crate::web_interface::routes::CaptureEndpoint;
use crate::web_interface::web_server::WebServer;

/// Owns the configured service: browser launcher, artifact store and HTTP front.
pub struct Controller {
    config: Config,
    web_server: WebServer<ChromeLauncher>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate().map_err(|e| {
            error!("Rejected configuration: {}", e);
            ControllerError::ConfigurationError(e)
        })?;

        let store = FileArtifactStore::new(
            &config.storage.directory,
            &config.storage.public_base_url,
        )
        .map_err(ControllerError::StorageError)?;
        info!(
            "Captures stored in {}, served at {}",
            store.base_path().display(),
            store.url_for("{key}")
        );

        let launcher = ChromeLauncher::new(config.browser.clone());
        let orchestrator = CaptureOrchestrator::new(launcher, config.capture_settings());
        let endpoint = CaptureEndpoint::new(
            orchestrator,
            Arc::new(store),
            Duration::from_secs(config.storage.retention_secs),
        );

        Ok(Self {
            web_server: WebServer::new(endpoint),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&self) -> Result<(), ControllerError> {
        info!(
            "Rendering views from {} with {} ({}x{} @{}x)",
            self.config.render_target.base_url,
            self.config.browser.executable,
            self.config.viewport.width,
            self.config.viewport.height,
            self.config.viewport.device_scale_factor
        );
        self.web_server
            .start(&self.config.server.bind_address, self.config.server.port)
            .await
            .map_err(ControllerError::WebError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_with_valid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.directory = dir.path().join("captures");

        let controller = Controller::new(config).unwrap();
        assert!(dir.path().join("captures").is_dir());
        assert_eq!(controller.config().server.port, 3001);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.directory = dir.path().to_path_buf();
        config.viewport.width = 0;

        let result = Controller::new(config);
        assert!(matches!(result, Err(ControllerError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_bind_address() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.directory = dir.path().to_path_buf();
        config.server.bind_address = "not-an-address".to_string();

        let controller = Controller::new(config).unwrap();
        let result = controller.run().await;
        assert!(matches!(result, Err(ControllerError::WebError(_))));
    }
}
