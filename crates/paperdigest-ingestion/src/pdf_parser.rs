//! PDF text extraction.
//!
//! The pipeline only needs two views of a paper: the first page (author
//! byline for institution resolution) and the whole text (note writing).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lopdf::Document as PdfDoc;
use paperdigest_common::DigestError;
use tracing::debug;

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Text of every page, in page order.
    async fn page_texts(&self, path: &Path) -> anyhow::Result<Vec<String>>;

    async fn first_page(&self, path: &Path) -> anyhow::Result<String> {
        Ok(self.page_texts(path).await?.into_iter().next().unwrap_or_default())
    }

    /// Page texts joined with newlines.
    async fn full_text(&self, path: &Path) -> anyhow::Result<String> {
        Ok(self.page_texts(path).await?.join("\n"))
    }
}

/// `lopdf`-based extraction, run on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextExtractor for LopdfExtractor {
    async fn page_texts(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let path: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || extract_pages(&path)).await??;
        Ok(pages)
    }
}

/// Synchronous extraction; pages that fail to decode yield an empty string.
pub fn extract_pages(path: &Path) -> Result<Vec<String>, DigestError> {
    let doc = PdfDoc::load(path)
        .map_err(|e| DigestError::Pdf(format!("{}: {}", path.display(), e)))?;

    let mut pages = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                debug!(path = %path.display(), page = page_num, error = %e, "Page text unreadable");
                pages.push(String::new());
            }
        }
    }
    Ok(pages)
}

/// Whitespace-delimited word count, used as a token estimate.
pub fn approx_token_count(text: &str) -> usize {
    text.split_whitespace().count()
}
