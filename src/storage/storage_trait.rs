//! Artifact Store Trait
//!
//! This module defines the `ArtifactStore` trait, the interface between the
//! capture endpoint and wherever captured images end up (local disk here, an
//! object store in other deployments).
//!
//! Implementors of this trait are responsible for:
//! - Persisting raw bytes under a logical key
//! - Returning a URL third parties can fetch the bytes from
//! - Reading an artifact back by key
//! - Removing artifacts past their retention

use crate::error_handling::types::StorageError;
use crate::storage::types::StoredArtifact;
use chrono::{DateTime, Utc};

pub trait ArtifactStore: Send + Sync {
    /// Persists `bytes` under `key` and returns where they can be fetched.
    ///
    /// Saving the same key twice overwrites the first artifact and returns a URL
    /// for the same logical artifact.
    fn save(&self, bytes: &[u8], key: &str, content_type: &str)
        -> Result<StoredArtifact, StorageError>;

    /// Reads back the bytes stored under `key`.
    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Removes artifacts last written before `cutoff`, returning how many went away.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;
}
