//! Storage subsystem
//!
//! Persists captured views and turns them into URLs the caller can hand out.
//!
//! Components:
//! - `storage_trait`: the `ArtifactStore` trait every backend implements.
//! - `types`: shared data types used by storage backends.
//! - `file_storage`: filesystem-backed store served by the web interface.
//! - `handoff`: persistence of a `CaptureResult` and the retention cleanup step.

pub mod file_storage;
pub mod handoff;
pub mod storage_trait;
pub mod types;

pub use file_storage::FileArtifactStore;
pub use storage_trait::ArtifactStore;
pub use types::{CleanupOutcome, PersistedViews, StoredArtifact};
