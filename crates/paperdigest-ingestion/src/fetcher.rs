//! Sequential PDF downloads with file-level resume.
//!
//! A file already present at the target path is never fetched again, whatever
//! the JSON checkpoints say. Bodies are streamed to `<name>.part` and renamed
//! into place, so the final path only ever holds a complete download.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use paperdigest_common::sandbox::SandboxClient;
use reqwest::header::CONTENT_TYPE;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::models::{ClassifiedPaper, DownloadStatus, DownloadedPaper};
use crate::naming::pdf_file_name;

/// Transfers one URL to a local file.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Write the body of `url` to `dest`; returns the number of bytes written.
    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64>;
}

/// Streaming HTTP downloader behind the sandbox allowlist.
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: SandboxClient,
}

impl HttpDownloader {
    pub fn new(client: SandboxClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        let resp = self.client.get(url)?.send().await?.error_for_status()?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let part = part_path(dest);
        let mut file = tokio::fs::File::create(&part).await?;
        let mut stream = resp.bytes_stream();
        let mut written: u64 = 0;

        let result: anyhow::Result<()> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                if written == 0 && is_html_response(content_type.as_deref(), &chunk) {
                    anyhow::bail!("got HTML instead of PDF (content-type={:?})", content_type);
                }
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
        if written == 0 {
            let _ = tokio::fs::remove_file(&part).await;
            anyhow::bail!("empty response body");
        }

        tokio::fs::rename(&part, dest).await?;
        Ok(written)
    }
}

pub struct PdfFetcher {
    downloader: Arc<dyn Downloader>,
    target_dir: PathBuf,
}

impl PdfFetcher {
    pub fn new(downloader: Arc<dyn Downloader>, target_dir: impl Into<PathBuf>) -> Self {
        Self { downloader, target_dir: target_dir.into() }
    }

    pub fn target_path(&self, paper: &ClassifiedPaper) -> PathBuf {
        self.target_dir.join(pdf_file_name(
            &paper.paper.arxiv_id,
            paper.tag.as_str(),
            &paper.paper.title,
        ))
    }

    /// Download every paper in order. A failed download is recorded on the
    /// returned row and never aborts the batch.
    #[instrument(skip_all, fields(total = papers.len()))]
    pub async fn fetch_all(&self, papers: &[ClassifiedPaper]) -> anyhow::Result<Vec<DownloadedPaper>> {
        tokio::fs::create_dir_all(&self.target_dir).await?;

        let total = papers.len();
        let mut out = Vec::with_capacity(total);
        for (i, paper) in papers.iter().enumerate() {
            let path = self.target_path(paper);
            let id = &paper.paper.arxiv_id;

            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                debug!(arxiv_id = %id, path = %path.display(), "Already downloaded, skipping");
                out.push(DownloadedPaper::downloaded(paper.clone(), path));
                continue;
            }

            info!(arxiv_id = %id, "downloading ({}/{})", i + 1, total);
            match self.downloader.download(&paper.paper.pdf_url, &path).await {
                Ok(bytes) => {
                    debug!(arxiv_id = %id, bytes, "Download complete");
                    out.push(DownloadedPaper::downloaded(paper.clone(), path));
                }
                Err(e) => {
                    warn!(arxiv_id = %id, url = %paper.paper.pdf_url, error = %e, "Download failed");
                    out.push(DownloadedPaper::failed(paper.clone(), path, e.to_string()));
                }
            }
        }

        let failed = out.iter().filter(|p| p.download_status == DownloadStatus::Failed).count();
        info!(downloaded = total - failed, failed, "Fetch stage complete");
        Ok(out)
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Some mirrors answer with an HTML landing page and a 200 status.
pub fn is_html_response(content_type: Option<&str>, body: &[u8]) -> bool {
    content_type
        .map(|value| value.to_lowercase().contains("text/html"))
        .unwrap_or(false)
        || body
            .iter()
            .skip_while(|byte| byte.is_ascii_whitespace())
            .take(5)
            .map(|byte| byte.to_ascii_lowercase())
            .eq(b"<html".iter().copied())
}
