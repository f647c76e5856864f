//! Filesystem object store.
//!
//! Objects are streamed into `<root>/<key>.partial` and hard-linked into
//! place once fully written and synced, so a reader never sees a truncated
//! payload under its final name. The link fails if the final name exists,
//! so an object is never overwritten.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{ObjectStore, PayloadStream, StorageKey, StoreError, StoredObject};

#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

/// Removes the partial file when dropped, including when the write future
/// is cancelled mid-stream.
struct PartialFile {
    path: PathBuf,
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "fs_partial_cleanup_failed"
                );
            }
        }
    }
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(FsStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn partial_path_for(&self, key: &StorageKey) -> PathBuf {
        self.root.join(format!("{}.partial", key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, key: &StorageKey, mut body: PayloadStream) -> Result<StoredObject, StoreError> {
        let final_path = self.path_for(key);
        let partial_path = self.partial_path_for(key);

        let file: File = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial_path)
            .await?;
        // Only armed once create_new succeeded, so a colliding writer's
        // partial is never removed.
        let partial = PartialFile { path: partial_path };
        // Rebound after the guard so the handle is closed before the unlink.
        let mut file = file;

        let mut size = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(StoreError::Body)?;
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        match fs::hard_link(&partial.path, &final_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }
        drop(partial);

        debug!(path = %final_path.display(), size = size, "fs_object_written");

        Ok(StoredObject {
            key: key.to_string(),
            size: Some(size),
        })
    }
}
