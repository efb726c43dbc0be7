use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use tempfile::NamedTempFile;

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::ArtifactStore;
use crate::storage::types::StoredArtifact;

/// Route prefix under which the web interface serves the store directory.
pub const PUBLIC_PREFIX: &str = "captures";

/// Stores artifacts as flat files in one directory.
pub struct FileArtifactStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(base_path: P, public_base_url: &str) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create artifact dir {}: {}", base_path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("FileArtifactStore initialized at {}", base_path.display());

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, PUBLIC_PREFIX, key)
    }

    fn check_key(key: &str) -> Result<(), StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains("..")
            && !key.contains(['/', '\\']);
        if valid {
            Ok(())
        } else {
            warn!("Rejected artifact key {:?}", key);
            Err(StorageError::InvalidKey(key.to_string()))
        }
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save(
        &self,
        bytes: &[u8],
        key: &str,
        content_type: &str,
    ) -> Result<StoredArtifact, StorageError> {
        Self::check_key(key)?;
        let path = self.base_path.join(key);

        // Write next to the target and rename, so readers never see a partial file.
        let mut tmp = NamedTempFile::new_in(&self.base_path).map_err(|e| {
            error!("Create temp file in {} failed: {}", self.base_path.display(), e);
            StorageError::WriteFailed
        })?;
        tmp.write_all(bytes).map_err(|e| {
            error!("Write failed {}: {}", tmp.path().display(), e);
            StorageError::WriteFailed
        })?;
        tmp.persist(&path).map_err(|e| {
            error!("Persist failed {}: {}", path.display(), e.error);
            StorageError::WriteFailed
        })?;

        debug!(
            "Wrote {} byte(s) of {} to {}",
            bytes.len(),
            content_type,
            path.display()
        );
        Ok(StoredArtifact {
            key: key.to_string(),
            url: self.url_for(key),
        })
    }

    fn load(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Self::check_key(key)?;
        let path = self.base_path.join(key);
        let bytes = fs::read(&path).map_err(|e| {
            debug!("Read failed {}: {}", path.display(), e);
            StorageError::ReadFailed
        })?;
        debug!("Read {} byte(s) from {}", bytes.len(), path.display());
        Ok(bytes)
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            error!("Failed to read artifact dir {}: {}", self.base_path.display(), e);
            StorageError::ReadFailed
        })?;

        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed
            })?;
            let path = entry.path();
            let name = entry.file_name();
            // Skip in-flight temp files and anything that is not an artifact.
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let Ok(modified) = meta.modified() else { continue };
            if DateTime::<Utc>::from(modified) < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
                }
            }
        }
        info!(
            "Removed {} artifact(s) older than {}",
            removed,
            cutoff.to_rfc3339()
        );
        Ok(removed)
    }
}
