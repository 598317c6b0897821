//! Scripted collaborators for driving the whole pipeline without a network.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use paperdigest_common::InstitutionTable;
use paperdigest_ingestion::models::PaperRecord;
use paperdigest_llm::{LlmError, ModelHandle};
use paperdigest_pipeline::pipeline::{Collaborators, StageModels};
use paperdigest_pipeline::{DigestPipeline, PipelineConfig};
use paperdigest_test_utils::{user_text, FakeDownloader, FixedSearch, FixtureText, ScriptedLlm, TouchRenderer};

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, 9).unwrap()
}

/// One paper of the scripted day.
pub struct Fixture {
    pub id: &'static str,
    pub title: &'static str,
    pub pages: Vec<String>,
}

impl Fixture {
    pub fn new(id: &'static str, title: &'static str, first_page: &str) -> Self {
        Self { id, title, pages: vec![first_page.to_string(), "Body of the paper.".to_string()] }
    }

    pub fn record(&self) -> PaperRecord {
        PaperRecord {
            arxiv_id: self.id.to_string(),
            title: self.title.to_string(),
            authors: vec!["A. Author".to_string()],
            categories: vec!["cs.CL".to_string()],
            published_date: day(),
            pdf_url: format!("https://arxiv.org/pdf/{}", self.id),
            summary: format!("Abstract of {}", self.title),
        }
    }
}

/// The first-page section of an institution prompt.
pub fn first_page_of(prompt: &str) -> &str {
    let start = prompt.find("First page:\n").map(|i| i + "First page:\n".len()).unwrap_or(0);
    let end = prompt.find("\n\nTracked institutions").unwrap_or(prompt.len());
    &prompt[start..end.max(start)]
}

pub const NOTE_BODY: &str = "Note title: Scripted\n\n🛎️Overview\n🔸Research question: what?\n\
                             🔸Main contribution: a scripted contribution.\n\n📝Key ideas\n🔸one";

/// Everything a test needs to inspect after a run.
pub struct Harness {
    pub output: tempfile::TempDir,
    pub search: Arc<FixedSearch>,
    pub downloader: Arc<FakeDownloader>,
    pub renderer: Arc<TouchRenderer>,
    pub filter: Arc<ScriptedLlm>,
    pub institution: Arc<ScriptedLlm>,
    pub note: Arc<ScriptedLlm>,
    /// While false, institution prompts whose first page says `FLAKY` fail.
    pub institution_healthy: Arc<AtomicBool>,
    fixtures_text: Arc<FixtureText>,
}

impl Harness {
    /// Papers whose title starts with "Soil" are irrelevant; first pages
    /// naming Tsinghua or OpenAI match, anything else does not.
    pub fn new(fixtures: Vec<Fixture>, broken_urls: &[&str]) -> Self {
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = healthy.clone();

        let filter = ScriptedLlm::new(|req| {
            if user_text(req).starts_with("Title: Soil") {
                Ok("irrelevant".to_string())
            } else {
                Ok("RAG".to_string())
            }
        });
        let institution = ScriptedLlm::new(move |req| {
            let page = first_page_of(user_text(req));
            if page.contains("FLAKY") && !flag.load(Ordering::SeqCst) {
                Err(LlmError::Unavailable("connection reset".to_string()))
            } else if page.contains("Tsinghua") {
                Ok("Tsinghua University".to_string())
            } else if page.contains("OpenAI") {
                Ok("OpenAI".to_string())
            } else {
                Ok("none".to_string())
            }
        });
        let note = ScriptedLlm::new(|_| Ok(NOTE_BODY.to_string()));

        Self {
            output: tempfile::tempdir().unwrap(),
            search: Arc::new(FixedSearch::new(fixtures.iter().map(Fixture::record).collect())),
            downloader: Arc::new(FakeDownloader::new(broken_urls)),
            renderer: Arc::new(TouchRenderer::default()),
            filter,
            institution,
            note,
            institution_healthy: healthy,
            fixtures_text: Arc::new(FixtureText::new(fixtures.into_iter().map(|f| (f.id.to_string(), f.pages)))),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig {
            output_dir: self.output.path().to_path_buf(),
            max_concurrent: 3,
            ..PipelineConfig::default()
        }
    }

    pub fn pipeline(&self, config: PipelineConfig) -> DigestPipeline {
        DigestPipeline::new(
            config,
            Collaborators {
                search: self.search.clone(),
                downloader: self.downloader.clone(),
                extractor: self.fixtures_text.clone(),
                renderer: self.renderer.clone(),
                institutions: Arc::new(InstitutionTable::builtin()),
                models: StageModels {
                    filter: ModelHandle::new(self.filter.clone(), "filter-model"),
                    institution: ModelHandle::new(self.institution.clone(), "institution-model"),
                    note: ModelHandle::new(self.note.clone(), "note-model"),
                },
            },
        )
    }

    pub fn run_dir(&self) -> std::path::PathBuf {
        self.config().run_dir(day())
    }

    /// Total external calls made so far.
    pub fn external_calls(&self) -> usize {
        self.search.calls.load(Ordering::SeqCst)
            + self.downloader.calls.load(Ordering::SeqCst)
            + self.filter.calls()
            + self.institution.calls()
            + self.note.calls()
    }
}

/// Relative path → bytes for every file under `root`.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeMap<String, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(root, root, &mut out);
    out
}

/// File names directly under `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}
