//! Blob store abstraction

use async_trait::async_trait;
use mailfwd_common::config::StorageConfig;
use mailfwd_common::{Error, Result};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::file::LocalStorage;
use crate::memory::MemoryStorage;

/// Object fetched from a blob store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    /// Size reported by the backend
    pub size: u64,
}

/// Blob store trait
///
/// Keys are opaque strings; backends map them onto their own namespace.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch an object, `Error::NotFound` if the key does not exist
    async fn get(&self, key: &str) -> Result<StoredObject>;

    /// Store an object and return its identifier
    async fn put(&self, key: &str, data: &[u8]) -> Result<String>;

    /// Copy an object and return the identifier of the copy
    async fn copy(&self, source: &str, target: &str) -> Result<String>;

    /// Delete an object
    async fn delete(&self, key: &str) -> Result<()>;

    /// Move an object: copy to `target`, then delete `source`
    ///
    /// Not atomic. A failure between the two steps leaves the object at
    /// both keys.
    async fn move_object(&self, source: &str, target: &str) -> Result<()> {
        self.copy(source, target).await?;
        self.delete(source).await?;
        debug!(source = %source, target = %target, "Moved object");
        Ok(())
    }
}

/// Content identifier (hex SHA-256)
pub fn etag(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Create a blob store from configuration
pub fn create_storage(config: &StorageConfig) -> Result<Box<dyn BlobStore>> {
    match config.backend.as_str() {
        "fs" => Ok(Box::new(LocalStorage::new(config)?)),
        "memory" => Ok(Box::new(MemoryStorage::new())),
        "s3" => Err(Error::Config(
            "S3 storage is provided by the hosting runtime, not by this build".to_string(),
        )),
        other => Err(Error::Config(format!(
            "Unsupported storage backend: {}",
            other
        ))),
    }
}
