//! In-memory collaborators for driving paperdigest without a network,
//! a model endpoint or real PDFs.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use paperdigest_ingestion::fetcher::Downloader;
use paperdigest_ingestion::models::PaperRecord;
use paperdigest_ingestion::pdf_parser::TextExtractor;
use paperdigest_ingestion::render::{ImageFormat, PageRenderer};
use paperdigest_ingestion::sources::{PaperSearch, SearchQuery};
use paperdigest_llm::{LlmBackend, LlmError, LlmRequest, LlmResponse, ModelHandle};

// ── Model ─────────────────────────────────────────────────────────────────────

type Responder = dyn Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync;

/// LLM backend answering from a closure over the request.
pub struct ScriptedLlm {
    respond: Box<Responder>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(respond: impl Fn(&LlmRequest) -> Result<String, LlmError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { respond: Box::new(respond), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn handle(self: &Arc<Self>) -> ModelHandle {
        ModelHandle::new(self.clone(), "scripted-model")
    }
}

/// Text of the last (user) message.
pub fn user_text(req: &LlmRequest) -> &str {
    req.messages.last().map(|m| m.content.as_str()).unwrap_or("")
}

#[async_trait]
impl LlmBackend for ScriptedLlm {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = (self.respond)(&req)?;
        Ok(LlmResponse {
            content,
            model: req.model.unwrap_or_else(|| "scripted-model".to_string()),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }

    fn model_id(&self) -> &str {
        "scripted-model"
    }

    fn is_local(&self) -> bool {
        true
    }
}

// ── Text extraction ───────────────────────────────────────────────────────────

/// Returns the same page texts for every file that exists.
pub struct CannedText(pub Vec<String>);

#[async_trait]
impl TextExtractor for CannedText {
    async fn page_texts(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        if !path.exists() {
            anyhow::bail!("{} does not exist", path.display());
        }
        Ok(self.0.clone())
    }
}

/// Page texts keyed by arXiv id, matched on the `{id}【` file name prefix.
pub struct FixtureText {
    pages: HashMap<String, Vec<String>>,
}

impl FixtureText {
    pub fn new(pages: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self { pages: pages.into_iter().collect() }
    }
}

#[async_trait]
impl TextExtractor for FixtureText {
    async fn page_texts(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        if !path.exists() {
            anyhow::bail!("{} does not exist", path.display());
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        self.pages
            .iter()
            .find(|(id, _)| name.starts_with(&format!("{id}【")))
            .map(|(_, pages)| pages.clone())
            .ok_or_else(|| anyhow::anyhow!("no fixture for {}", name))
    }
}

// ── Search, download, render ──────────────────────────────────────────────────

pub struct FixedSearch {
    papers: Vec<PaperRecord>,
    pub calls: AtomicUsize,
}

impl FixedSearch {
    pub fn new(papers: Vec<PaperRecord>) -> Self {
        Self { papers, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl PaperSearch for FixedSearch {
    async fn search(&self, _query: &SearchQuery) -> anyhow::Result<Vec<PaperRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.papers.clone())
    }
}

/// Writes a tiny fake PDF; URLs in `broken` fail.
pub struct FakeDownloader {
    broken: HashSet<String>,
    pub calls: AtomicUsize,
}

impl FakeDownloader {
    pub fn new<S: AsRef<str>>(broken: &[S]) -> Self {
        Self {
            broken: broken.iter().map(|u| u.as_ref().to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &str, dest: &Path) -> anyhow::Result<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken.contains(url) {
            anyhow::bail!("HTTP status server error (503 Service Unavailable) for url ({})", url);
        }
        let body = format!("%PDF-1.4 {}", url);
        tokio::fs::write(dest, body.as_bytes()).await?;
        Ok(body.len() as u64)
    }
}

/// "Renders" by writing the PDF's file name into the image path.
#[derive(Default)]
pub struct TouchRenderer {
    pub calls: AtomicUsize,
}

#[async_trait]
impl PageRenderer for TouchRenderer {
    async fn render_first_page(&self, pdf: &Path, output: &Path, _dpi: u32, _format: ImageFormat) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = pdf.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        tokio::fs::write(output, format!("PNG {}", name)).await?;
        Ok(())
    }
}
