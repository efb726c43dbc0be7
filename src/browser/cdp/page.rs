use log::{debug, warn};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use super::connection::{CdpConnection, CdpEvent};
use super::protocol::{self, ExportStatus, EXPORT_CHUNK_CHARS};
use crate::browser::driver::{BrowsingContext, SurfaceExport};
use crate::capture::types::CameraSettings;
use crate::configuration::types::ViewportConfig;
use crate::error_handling::types::BrowserError;

/// A page target living in its own browser context, reached through a flattened session.
pub struct ChromePage {
    connection: Arc<CdpConnection>,
    browser_context_id: String,
    target_id: String,
    session_id: String,
}

impl ChromePage {
    /// Creates an isolated browser context with a single blank page and attaches to it.
    pub(super) async fn open(connection: Arc<CdpConnection>) -> Result<Self, BrowserError> {
        let created = connection
            .call("Target.createBrowserContext", json!({}), None)
            .await?;
        let browser_context_id = string_field(&created, "browserContextId")?;

        let attached = Self::attach_blank_target(&connection, &browser_context_id).await;
        let (target_id, session_id) = match attached {
            Ok(ids) => ids,
            Err(e) => {
                let _ = connection
                    .call(
                        "Target.disposeBrowserContext",
                        json!({ "browserContextId": browser_context_id }),
                        None,
                    )
                    .await;
                return Err(e);
            }
        };

        let page = Self {
            connection,
            browser_context_id,
            target_id,
            session_id,
        };
        page.call("Page.enable", json!({})).await?;
        page.call("Page.setLifecycleEventsEnabled", json!({ "enabled": true }))
            .await?;
        debug!(
            "Page {} ready in context {}",
            page.target_id, page.browser_context_id
        );
        Ok(page)
    }

    async fn attach_blank_target(
        connection: &CdpConnection,
        browser_context_id: &str,
    ) -> Result<(String, String), BrowserError> {
        let target = connection
            .call(
                "Target.createTarget",
                json!({ "url": "about:blank", "browserContextId": browser_context_id }),
                None,
            )
            .await?;
        let target_id = string_field(&target, "targetId")?;
        let attached = connection
            .call(
                "Target.attachToTarget",
                json!({ "targetId": target_id, "flatten": true }),
                None,
            )
            .await?;
        Ok((target_id, string_field(&attached, "sessionId")?))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, BrowserError> {
        self.connection
            .call(method, params, Some(&self.session_id))
            .await
    }

    /// Evaluates `expression` in the page and returns its JSON value.
    async fn evaluate(&self, expression: &str) -> Result<Value, BrowserError> {
        let response = self
            .call(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(BrowserError::Evaluation(protocol::describe_exception(
                details,
            )));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn wait_for_load(
        &self,
        events: &mut Receiver<CdpEvent>,
        loader_id: &str,
    ) -> Result<(), BrowserError> {
        let mut loaded = false;
        let mut network_idle = false;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[{}] Missed {} DevTools event(s)", self.target_id, skipped);
                    continue;
                }
                Err(RecvError::Closed) => return Err(BrowserError::ConnectionClosed),
            };
            if event.session_id.as_deref() != Some(self.session_id.as_str()) {
                continue;
            }

            match event.method.as_str() {
                "Page.lifecycleEvent" if event.params["loaderId"] == loader_id => {
                    match event.params["name"].as_str() {
                        Some("load") => loaded = true,
                        Some("networkIdle") => network_idle = true,
                        _ => {}
                    }
                }
                "Inspector.targetCrashed" => {
                    return Err(BrowserError::Navigation("page crashed".to_string()))
                }
                _ => {}
            }
            if loaded && network_idle {
                return Ok(());
            }
        }
    }
}

impl BrowsingContext for ChromePage {
    async fn set_viewport(&mut self, viewport: &ViewportConfig) -> Result<(), BrowserError> {
        self.call(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": viewport.device_scale_factor,
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let mut events = self.connection.subscribe();
        let navigation = self.call("Page.navigate", json!({ "url": url })).await?;

        if let Some(error) = navigation
            .get("errorText")
            .and_then(Value::as_str)
            .filter(|e| !e.is_empty())
        {
            return Err(BrowserError::Navigation(format!("{} ({})", error, url)));
        }

        // Same-document navigations carry no loader and fire no lifecycle events.
        match navigation.get("loaderId").and_then(Value::as_str) {
            Some(loader_id) => self.wait_for_load(&mut events, loader_id).await,
            None => Ok(()),
        }
    }

    async fn apply_settings(&mut self, settings: &CameraSettings) -> Result<(), BrowserError> {
        let payload = serde_json::to_string(settings)
            .map_err(|e| BrowserError::Evaluation(e.to_string()))?;
        self.evaluate(&protocol::inject_settings_script(&payload))
            .await?;
        Ok(())
    }

    async fn export_surface(&mut self) -> Result<SurfaceExport, BrowserError> {
        let status = self.evaluate(protocol::EXPORT_SURFACE_SCRIPT).await?;
        let status: ExportStatus = serde_json::from_value(status)
            .map_err(|e| BrowserError::Evaluation(format!("unexpected export status: {}", e)))?;

        let length = match status {
            ExportStatus::Missing => return Ok(SurfaceExport::Missing),
            ExportStatus::Failed { error } => return Ok(SurfaceExport::Failed(error)),
            ExportStatus::Ready { length } => length,
        };

        let mut data_url = String::with_capacity(length);
        for offset in (0..length).step_by(EXPORT_CHUNK_CHARS) {
            let chunk = self
                .evaluate(&protocol::read_chunk_script(offset, EXPORT_CHUNK_CHARS))
                .await?;
            match chunk.as_str() {
                Some(chunk) => data_url.push_str(chunk),
                None => {
                    return Err(BrowserError::Evaluation(
                        "surface export chunk was not a string".to_string(),
                    ))
                }
            }
        }
        if let Err(e) = self.evaluate(protocol::RELEASE_EXPORT_SCRIPT).await {
            debug!("[{}] Could not release export buffer: {}", self.target_id, e);
        }

        match protocol::decode_png_data_url(&data_url) {
            Ok(bytes) => Ok(SurfaceExport::Encoded(bytes)),
            Err(e) => Ok(SurfaceExport::Failed(e)),
        }
    }

    async fn close(self) -> Result<(), BrowserError> {
        let closed = self
            .connection
            .call(
                "Target.closeTarget",
                json!({ "targetId": self.target_id }),
                None,
            )
            .await;
        let disposed = self
            .connection
            .call(
                "Target.disposeBrowserContext",
                json!({ "browserContextId": self.browser_context_id }),
                None,
            )
            .await;
        closed.and(disposed).map(|_| ())
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, BrowserError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| BrowserError::Protocol(format!("response is missing {}", field)))
}
