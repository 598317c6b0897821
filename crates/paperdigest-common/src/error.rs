use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Checkpoint {path} could not be persisted: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint {path} is unreadable: {reason}")]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("Security error: {0}")]
    SecurityError(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DigestError {
    /// Wrap an IO failure that happened while writing the checkpoint at `path`.
    pub fn checkpoint(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DigestError::Checkpoint { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
