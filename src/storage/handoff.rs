//! Hand-off of a finished capture to the artifact store.
//!
//! Successful views are stored under `{customization_id}_{view}.png`; failed
//! views never reach the store. A store failure only blanks the URL of the view
//! it happened to.

use chrono::Utc;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::capture::types::{CaptureResult, ViewCaptureResult, ViewName};
use crate::storage::storage_trait::ArtifactStore;
use crate::storage::types::{CleanupOutcome, PersistedViews};

pub fn artifact_key(customization_id: &str, view: ViewName) -> String {
    format!("{}_{}.png", customization_id, view)
}

/// Stores every successful view of `result`, both views concurrently.
pub async fn persist_capture(store: &Arc<dyn ArtifactStore>, result: CaptureResult) -> PersistedViews {
    let request_id = result.request_id();
    let customization_id = result.customization_id().to_string();
    let [front, back] = result.into_views();

    let (front_url, back_url) = tokio::join!(
        persist_view(store, request_id, &customization_id, front),
        persist_view(store, request_id, &customization_id, back)
    );

    let mut persisted = PersistedViews::default();
    for (view, url) in ViewName::ALL.into_iter().zip([front_url, back_url]) {
        if let Some(url) = url {
            persisted.set(view, url);
        }
    }
    persisted
}

async fn persist_view(
    store: &Arc<dyn ArtifactStore>,
    request_id: Uuid,
    customization_id: &str,
    outcome: ViewCaptureResult,
) -> Option<String> {
    let (view, image_bytes, encoding) = match outcome {
        ViewCaptureResult::Success {
            view,
            image_bytes,
            encoding,
        } => (view, image_bytes, encoding),
        ViewCaptureResult::Failure { view, .. } => {
            debug!("[{}] Nothing to store for failed {} view", request_id, view);
            return None;
        }
    };

    let key = artifact_key(customization_id, view);
    let store = Arc::clone(store);
    let task_key = key.clone();
    let saved =
        tokio::task::spawn_blocking(move || store.save(&image_bytes, &task_key, encoding)).await;

    match saved {
        Ok(Ok(artifact)) => {
            info!("[{}] Stored {} at {}", request_id, artifact.key, artifact.url);
            Some(artifact.url)
        }
        Ok(Err(e)) => {
            error!("[{}] Failed to store {}: {}", request_id, key, e);
            None
        }
        Err(e) => {
            error!("[{}] Store task for {} did not finish: {}", request_id, key, e);
            None
        }
    }
}

/// Post-persistence cleanup: drops artifacts older than `retention`.
///
/// A zero retention disables the step. Failures are reported, never raised.
pub async fn run_cleanup(store: &Arc<dyn ArtifactStore>, retention: Duration) -> CleanupOutcome {
    if retention.is_zero() {
        return CleanupOutcome::Skipped;
    }
    let cutoff = match chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| Utc::now().checked_sub_signed(retention))
    {
        Some(cutoff) => cutoff,
        None => {
            let message = format!("retention of {:?} is out of range", retention);
            warn!("Cleanup skipped: {}", message);
            return CleanupOutcome::Failed(message);
        }
    };

    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.purge_older_than(cutoff)).await {
        Ok(Ok(removed)) => {
            debug!("Cleanup removed {} artifact(s)", removed);
            CleanupOutcome::Removed(removed)
        }
        Ok(Err(e)) => {
            warn!("Cleanup failed: {}", e);
            CleanupOutcome::Failed(e.to_string())
        }
        Err(e) => {
            warn!("Cleanup task did not finish: {}", e);
            CleanupOutcome::Failed(e.to_string())
        }
    }
}
