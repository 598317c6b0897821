//! Per-run checkpoint directory.
//!
//! A checkpoint file, once written, is the only source of truth for its stage:
//! [`CheckpointDir::load_or_run`] never re-executes a stage whose file exists.
//! Writes go to a sibling `.tmp` file first and are renamed into place.

use std::future::Future;
use std::path::{Path, PathBuf};

use paperdigest_common::{DigestError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

pub const PAPERS: &str = "papers.json";
pub const PAPERS_FILTER: &str = "papers_filter.json";
pub const DOWNLOADED: &str = "downloaded.json";
pub const FILTER_INSTITUTION: &str = "filter_institution.json";
pub const NOTES: &str = "notes.json";
pub const NOTES_DIGEST: &str = "notes.txt";
pub const PAPERS_DIR: &str = "papers";
pub const INSTITUTION_DIR: &str = "institution";

#[derive(Debug, Clone)]
pub struct CheckpointDir {
    root: PathBuf,
}

impl CheckpointDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DigestError::checkpoint(&self.root, e))
    }

    pub async fn exists(&self, name: &str) -> bool {
        tokio::fs::try_exists(self.path(name)).await.unwrap_or(false)
    }

    /// `Ok(None)` when the checkpoint has not been written yet.
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DigestError::checkpoint(path, e)),
        };
        let value = serde_json::from_slice(&bytes).map_err(|e| DigestError::CorruptCheckpoint {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Checkpoint loaded");
        Ok(Some(value))
    }

    pub async fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        write_json_atomic(&self.path(name), value).await
    }

    /// Load `name` if present, otherwise run `stage` and persist its output.
    pub async fn load_or_run<T, F, Fut>(&self, name: &str, stage: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(existing) = self.load(name).await? {
            info!(checkpoint = name, "Checkpoint found, skipping stage");
            return Ok(existing);
        }
        let value = stage().await?;
        self.save(name, &value).await?;
        info!(checkpoint = name, "Checkpoint written");
        Ok(value)
    }
}

/// Serialise `value` as pretty JSON and atomically replace `path`.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).await
}

/// Atomically replace `path` with `bytes`. IO failures name the path.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| DigestError::checkpoint(path, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| DigestError::checkpoint(path, e))
}
