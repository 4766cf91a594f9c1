//! In-memory blob store

use async_trait::async_trait;
use mailfwd_common::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::blob::{etag, BlobStore, StoredObject};

/// Objects kept in a process-local map
///
/// Moves use the copy-then-delete baseline of [`BlobStore::move_object`].
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a key exists
    pub async fn contains(&self, key: &str) -> bool {
        self.objects.read().await.contains_key(key)
    }

    /// All keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn get(&self, key: &str) -> Result<StoredObject> {
        let objects = self.objects.read().await;
        let data = objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        let size = data.len() as u64;
        Ok(StoredObject { data, size })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<String> {
        self.objects
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        debug!(key = %key, size = data.len(), "Stored object in memory");
        Ok(etag(data))
    }

    async fn copy(&self, source: &str, target: &str) -> Result<String> {
        let mut objects = self.objects.write().await;
        let data = objects
            .get(source)
            .cloned()
            .ok_or_else(|| Error::NotFound(source.to_string()))?;
        let id = etag(&data);
        objects.insert(target.to_string(), data);
        Ok(id)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}
