//! In-process object store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::StreamExt;
use tokio::sync::RwLock;

use super::{ObjectStore, PayloadStream, StorageKey, StoreError, StoredObject};

/// Keeps every object in a shared map. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &StorageKey, mut body: PayloadStream) -> Result<StoredObject, StoreError> {
        let mut buffer = Vec::new();
        while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk.map_err(StoreError::Body)?);
        }

        let size = buffer.len() as u64;
        let mut objects = self.objects.write().await;
        if objects.contains_key(key.as_str()) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }
        objects.insert(key.to_string(), Bytes::from(buffer));

        Ok(StoredObject {
            key: key.to_string(),
            size: Some(size),
        })
    }
}
