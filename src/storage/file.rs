//! JSON file table engine
//!
//! A [`MemoryTable`] whose contents are written to a JSON snapshot after every
//! committed batch. The snapshot is written to a temporary file and renamed
//! over the previous one, so a crash leaves either the old or the new state.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::engine::{Item, QueryOutput, QueryRequest, TableEngine, WriteRequest};
use super::memory::MemoryTable;
use crate::error::{Error, Result};
use crate::keys::RecordKey;

/// File backed table engine
#[derive(Debug)]
pub struct FileTable {
    path: PathBuf,
    inner: MemoryTable,
    write_lock: Mutex<()>,
}

impl FileTable {
    /// Open a snapshot file, starting empty when it does not exist
    pub async fn open<P: AsRef<Path>>(
        path: P,
        max_batch_size: usize,
        page_size: usize,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = MemoryTable::with_limits(max_batch_size, page_size);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let items: Vec<Item> = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Storage(format!("Failed to parse table file {}: {}", path.display(), e))
                })?;
                info!(path = %path.display(), items = items.len(), "Loaded table snapshot");
                inner.load(items);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No table snapshot found, starting fresh");
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "Failed to read table file {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        Ok(Self {
            path,
            inner,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<()> {
        let items = self.inner.snapshot();
        let bytes = serde_json::to_vec_pretty(&items)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::Storage(format!("Failed to create table dir: {}", e)))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write table snapshot: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to replace table snapshot: {}", e)))?;

        debug!(path = %self.path.display(), items = items.len(), bytes = bytes.len(), "Persisted table");
        Ok(())
    }
}

#[async_trait]
impl TableEngine for FileTable {
    fn max_batch_size(&self) -> usize {
        self.inner.max_batch_size()
    }

    async fn get_item(&self, key: &RecordKey) -> Result<Option<Item>> {
        self.inner.get_item(key).await
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.inner.batch_write(requests).await?;
        self.persist().await
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryOutput> {
        self.inner.query(request).await
    }
}
