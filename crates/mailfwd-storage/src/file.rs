//! Local filesystem blob store

use async_trait::async_trait;
use mailfwd_common::config::StorageConfig;
use mailfwd_common::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::blob::{etag, BlobStore, StoredObject};

/// Objects stored as files below a base directory
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage instance from config
    pub fn new(config: &StorageConfig) -> Result<Self> {
        Self::from_path(&config.path)
    }

    /// Create a new local storage instance from a path
    pub fn from_path(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .map_err(|e| Error::Storage(format!("Failed to create storage directory: {}", e)))?;

        info!(path = %path.display(), "Initialized local blob storage");

        Ok(Self {
            base_path: path.to_path_buf(),
        })
    }

    /// Get full path for a key, with path traversal protection
    fn full_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.ends_with('/') {
            return Err(Error::Storage(format!("Invalid object key: {:?}", key)));
        }

        if key.split(&['/', '\\'][..]).any(|segment| segment == "..") {
            return Err(Error::Storage(
                "Path traversal detected: '..' is not allowed".to_string(),
            ));
        }

        if key.starts_with('/') || key.starts_with('\\') {
            return Err(Error::Storage(
                "Absolute paths are not allowed".to_string(),
            ));
        }

        let full = self.base_path.join(key);

        let canonical_base = self
            .base_path
            .canonicalize()
            .map_err(|e| Error::Storage(format!("Failed to canonicalize base path: {}", e)))?;

        // New files have no canonical path yet, check the parent instead
        let canonical_full = if full.exists() {
            full.canonicalize()
                .map_err(|e| Error::Storage(format!("Failed to canonicalize path: {}", e)))?
        } else if let Some(parent) = full.parent().filter(|p| p.exists()) {
            let canonical_parent = parent.canonicalize().map_err(|e| {
                Error::Storage(format!("Failed to canonicalize parent path: {}", e))
            })?;
            match full.file_name() {
                Some(filename) => canonical_parent.join(filename),
                None => return Err(Error::Storage("Invalid file path".to_string())),
            }
        } else {
            canonical_base.join(key)
        };

        if !canonical_full.starts_with(&canonical_base) {
            return Err(Error::Storage(
                "Path traversal detected: resolved path is outside storage directory".to_string(),
            ));
        }

        Ok(full)
    }

    async fn ensure_parent_exists(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("Failed to create directory: {}", e)))?;
        }
        Ok(())
    }
}

fn io_error(key: &str, action: &str, err: std::io::Error) -> Error {
    if err.kind() == ErrorKind::NotFound {
        Error::NotFound(key.to_string())
    } else {
        Error::Storage(format!("Failed to {} {}: {}", action, key, err))
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn get(&self, key: &str) -> Result<StoredObject> {
        let full_path = self.full_path(key)?;

        let data = fs::read(&full_path)
            .await
            .map_err(|e| io_error(key, "read", e))?;
        let size = data.len() as u64;

        debug!(key = %key, size = size, "Read object");

        Ok(StoredObject { data, size })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<String> {
        let full_path = self.full_path(key)?;
        self.ensure_parent_exists(&full_path).await?;

        fs::write(&full_path, data)
            .await
            .map_err(|e| io_error(key, "write", e))?;

        debug!(key = %key, size = data.len(), "Stored object");

        Ok(etag(data))
    }

    async fn copy(&self, source: &str, target: &str) -> Result<String> {
        let object = self.get(source).await?;
        self.put(target, &object.data).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let full_path = self.full_path(key)?;

        fs::remove_file(&full_path)
            .await
            .map_err(|e| io_error(key, "delete", e))?;

        debug!(key = %key, "Deleted object");

        Ok(())
    }

    /// Atomic rename where the filesystem allows it, copy and delete otherwise
    async fn move_object(&self, source: &str, target: &str) -> Result<()> {
        let source_path = self.full_path(source)?;
        let target_path = self.full_path(target)?;
        self.ensure_parent_exists(&target_path).await?;

        match fs::rename(&source_path, &target_path).await {
            Ok(()) => {
                debug!(source = %source, target = %target, "Renamed object");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound(source.to_string())),
            Err(e) => {
                warn!(
                    source = %source,
                    target = %target,
                    error = %e,
                    "Rename failed, falling back to copy and delete"
                );
                self.copy(source, target).await?;
                self.delete(source).await
            }
        }
    }
}
