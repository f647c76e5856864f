//! Object storage for ingested notification payloads.
//!
//! The receiver only ever writes: each accepted POST becomes one object
//! named by a fresh [`StorageKey`]. Backends:
//! - `filesystem`: one file per object under a root directory
//! - `http`: `PUT <base>/<key>` against a blob endpoint
//! - `memory`: in-process map, for local runs and tests

pub mod fs;
pub mod http;
pub mod key;
pub mod memory;

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use futures::Stream;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, StorageBackend};

pub use fs::FsStore;
pub use http::HttpStore;
pub use key::StorageKey;
pub use memory::MemoryStore;

/// Request body handed to a store, chunk by chunk.
pub type PayloadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Confirmation returned by a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Bytes written, when the backend can tell.
    pub size: Option<u64>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),

    #[error("request body stream failed: {0}")]
    Body(io::Error),

    #[error("invalid object url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("storage backend rejected write with status {status}")]
    Rejected { status: u16 },

    #[error("object already exists: {0}")]
    AlreadyExists(String),
}

/// Write-only blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, consuming the stream.
    async fn put(&self, key: &StorageKey, body: PayloadStream) -> Result<StoredObject, StoreError>;
}

/// Wrap an in-memory payload as a single-chunk stream.
pub fn payload_from_bytes(bytes: Bytes) -> PayloadStream {
    Box::pin(futures::stream::once(async move { Ok::<_, io::Error>(bytes) }))
}

/// Build the object store selected by the configuration.
pub async fn from_config(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.storage_backend {
        StorageBackend::Filesystem => {
            let store = FsStore::open(&config.storage_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to open storage directory {}",
                        config.storage_dir.display()
                    )
                })?;
            info!(root = %config.storage_dir.display(), "filesystem_store_ready");
            Arc::new(store)
        }
        StorageBackend::Http => {
            let url = config
                .storage_url
                .as_deref()
                .context("STORAGE_URL is required for the http storage backend")?;
            let store = HttpStore::new(
                url,
                config.storage_token.clone(),
                Duration::from_millis(config.storage_timeout_ms),
            )
            .context("Failed to create http store")?;
            info!(
                base_url = %url,
                token_configured = config.storage_token.is_some(),
                "http_store_ready"
            );
            Arc::new(store)
        }
        StorageBackend::Memory => {
            info!("memory_store_ready");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_payload_from_bytes_yields_one_chunk() {
        let mut stream = payload_from_bytes(Bytes::from_static(b"<feed/>"));
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"<feed/>");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_from_config_http_requires_url() {
        let config = Config {
            storage_backend: StorageBackend::Http,
            storage_url: None,
            ..Config::default()
        };
        assert!(from_config(&config).await.is_err());
    }

    #[tokio::test]
    async fn test_from_config_filesystem_creates_root() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("notifications");
        let config = Config {
            storage_backend: StorageBackend::Filesystem,
            storage_dir: root.clone(),
            ..Config::default()
        };

        from_config(&config).await.unwrap();
        assert!(root.is_dir());
    }
}
