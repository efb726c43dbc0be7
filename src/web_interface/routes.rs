use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::{reply, Filter, Rejection, Reply};

use super::types::{CaptureBody, CaptureResponse};
use crate::browser::driver::BrowserLauncher;
use crate::capture::orchestrator::CaptureOrchestrator;
use crate::error_handling::types::StorageError;
use crate::storage::file_storage::PUBLIC_PREFIX;
use crate::storage::handoff::{persist_capture, run_cleanup};
use crate::storage::storage_trait::ArtifactStore;
use crate::storage::types::CleanupOutcome;

/// Capture bodies are a short id plus an optional camera.
pub const MAX_BODY_BYTES: u64 = 64 * 1024;

/// State behind `POST /api/capture`: capture, persist, clean up.
pub struct CaptureEndpoint<L: BrowserLauncher> {
    orchestrator: CaptureOrchestrator<L>,
    store: Arc<dyn ArtifactStore>,
    retention: Duration,
}

impl<L: BrowserLauncher> CaptureEndpoint<L> {
    pub fn new(
        orchestrator: CaptureOrchestrator<L>,
        store: Arc<dyn ArtifactStore>,
        retention: Duration,
    ) -> Self {
        Self {
            orchestrator,
            store,
            retention,
        }
    }

    pub fn store(&self) -> Arc<dyn ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// Runs one request to completion and returns the status plus body to send.
    ///
    /// Any capture the orchestrator returns, partial or not, is a 200 with
    /// `null` for each view without a stored image. Only an orchestrator error
    /// is a 500.
    pub async fn handle(&self, body: CaptureBody) -> (StatusCode, CaptureResponse) {
        let default_camera = &self.orchestrator.settings().default_camera;
        let request = match body.into_request(default_camera) {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejected capture request: {}", e);
                return (StatusCode::BAD_REQUEST, CaptureResponse::failed(e.to_string()));
            }
        };

        let result = match self.orchestrator.capture(request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Capture failed: {}", e);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    CaptureResponse::failed("Capture failed"),
                );
            }
        };

        let request_id = result.request_id();
        let persisted = persist_capture(&self.store, result).await;

        match run_cleanup(&self.store, self.retention).await {
            CleanupOutcome::Skipped => {}
            CleanupOutcome::Removed(n) => {
                info!("[{}] Cleanup removed {} old artifact(s)", request_id, n)
            }
            CleanupOutcome::Failed(e) => warn!("[{}] Cleanup failed: {}", request_id, e),
        }

        (StatusCode::OK, CaptureResponse::captured(persisted))
    }
}

fn json_reply(status: StatusCode, body: &CaptureResponse) -> reply::Response {
    reply::with_status(reply::json(body), status).into_response()
}

/// GET /
pub fn liveness_route() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .map(|| "viewcap capture service is running")
}

/// POST /api/capture
pub fn capture_route<L: BrowserLauncher>(
    endpoint: Arc<CaptureEndpoint<L>>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path!("api" / "capture")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and_then(move |body: CaptureBody| {
            let endpoint = endpoint.clone();
            async move {
                // Detached so a client hanging up cannot cut the capture short.
                let handled = tokio::spawn(async move { endpoint.handle(body).await }).await;
                let res = match handled {
                    Ok((status, response)) => json_reply(status, &response),
                    Err(e) => {
                        error!("Capture task did not finish: {}", e);
                        json_reply(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            &CaptureResponse::failed("Capture failed"),
                        )
                    }
                };
                Ok::<_, Rejection>(res)
            }
        })
}

/// GET /captures/:key
pub fn captures_route(
    store: Arc<dyn ArtifactStore>,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    warp::path(PUBLIC_PREFIX)
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(warp::get())
        .and_then(move |key: String| {
            let store = store.clone();
            async move {
                let lookup = key.clone();
                let loaded = tokio::task::spawn_blocking(move || store.load(&lookup)).await;
                let res = match loaded {
                    Ok(Ok(bytes)) => {
                        let mime = mime_guess::from_path(&key).first_or_octet_stream();
                        reply::with_header(bytes, "Content-Type", mime.to_string()).into_response()
                    }
                    Ok(Err(StorageError::InvalidKey(_))) => {
                        StatusCode::BAD_REQUEST.into_response()
                    }
                    Ok(Err(_)) => StatusCode::NOT_FOUND.into_response(),
                    Err(e) => {
                        error!("Artifact read task failed: {}", e);
                        StatusCode::INTERNAL_SERVER_ERROR.into_response()
                    }
                };
                Ok::<_, Rejection>(res)
            }
        })
}

/// Turns an unparseable capture body into the endpoint's JSON error shape.
pub async fn handle_rejection(err: Rejection) -> Result<reply::Response, Rejection> {
    if let Some(e) = err.find::<BodyDeserializeError>() {
        warn!("Malformed capture body: {}", e);
        return Ok(json_reply(
            StatusCode::BAD_REQUEST,
            &CaptureResponse::failed(format!("Invalid request body: {}", e)),
        ));
    }
    Err(err)
}
