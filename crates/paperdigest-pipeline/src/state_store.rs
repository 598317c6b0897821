//! Durable per-run state of the institution stage (`downloaded.json`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use paperdigest_common::Result;
use paperdigest_ingestion::models::DownloadedPaper;
use tokio::sync::Mutex;
use tracing::debug;

use crate::checkpoint::write_json_atomic;

/// Keyed store of downloaded-paper rows.
#[async_trait]
pub trait PaperStateStore: Send + Sync {
    /// Current rows, in insertion order.
    async fn load(&self) -> Result<Vec<DownloadedPaper>>;

    /// Replace the row with the same identifier (or append) and persist.
    async fn upsert(&self, paper: &DownloadedPaper) -> Result<()>;

    /// Persist the current rows.
    async fn flush(&self) -> Result<()>;
}

/// JSON file store. Every upsert rewrites the whole file atomically while
/// holding the lock, so concurrent upserts never interleave.
pub struct JsonFileStore {
    path: PathBuf,
    rows: Mutex<Vec<DownloadedPaper>>,
}

impl JsonFileStore {
    /// Create the store with `rows` and write it out immediately.
    pub async fn create(path: impl Into<PathBuf>, rows: Vec<DownloadedPaper>) -> Result<Self> {
        let store = Self { path: path.into(), rows: Mutex::new(rows) };
        store.flush().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PaperStateStore for JsonFileStore {
    async fn load(&self) -> Result<Vec<DownloadedPaper>> {
        Ok(self.rows.lock().await.clone())
    }

    async fn upsert(&self, paper: &DownloadedPaper) -> Result<()> {
        let mut rows = self.rows.lock().await;
        match rows.iter_mut().find(|r| r.id() == paper.id()) {
            Some(row) => *row = paper.clone(),
            None => rows.push(paper.clone()),
        }
        write_json_atomic(&self.path, &*rows).await?;
        debug!(arxiv_id = %paper.id(), status = paper.institution_status.as_str(), "State row persisted");
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let rows = self.rows.lock().await;
        write_json_atomic(&self.path, &*rows).await
    }
}
