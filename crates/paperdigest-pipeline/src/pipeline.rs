//! Stage orchestration for one digest run.
//!
//! Every stage first looks for its checkpoint under the run directory and
//! skips itself when one exists. Re-running a finished day therefore makes no
//! external calls and leaves every file byte-identical.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use paperdigest_common::{DigestError, InstitutionTable, Result};
use paperdigest_ingestion::fetcher::{Downloader, PdfFetcher};
use paperdigest_ingestion::models::{
    ClassifiedPaper, DownloadStatus, DownloadedPaper, Note, PaperRecord, ResolvedPaper,
};
use paperdigest_ingestion::pdf_parser::TextExtractor;
use paperdigest_ingestion::render::PageRenderer;
use paperdigest_ingestion::sources::{discover, PaperSearch, SearchQuery};
use paperdigest_llm::ModelHandle;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::checkpoint::{
    write_atomic, CheckpointDir, DOWNLOADED, FILTER_INSTITUTION, INSTITUTION_DIR, NOTES, NOTES_DIGEST,
    PAPERS, PAPERS_DIR, PAPERS_FILTER,
};
use crate::classifier::{relevant_only, RelevanceClassifier};
use crate::grouping::{group, render_digest, write_buckets};
use crate::materials::{write_materials, RenderSettings};
use crate::notes::NoteWriter;
use crate::resolver::{InstitutionResolver, ResolveSummary};
use crate::state_store::{JsonFileStore, PaperStateStore};

// ── Run config ──────────────────────────────────────────────────────────────────

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which a `YYYY-MM-DD` directory is created per run.
    pub output_dir: PathBuf,
    pub categories: Vec<String>,
    pub max_results: usize,
    /// Upper bound on in-flight model calls per stage.
    pub max_concurrent: usize,
    pub render: RenderSettings,
    /// Write `filter_institution.json` even when some rows stayed pending.
    pub finalize_with_pending: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            categories: paperdigest_ingestion::sources::arxiv::DEFAULT_CATEGORIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            max_results: paperdigest_ingestion::sources::arxiv::DEFAULT_MAX_RESULTS,
            max_concurrent: 4,
            render: RenderSettings::default(),
            finalize_with_pending: false,
        }
    }
}

impl PipelineConfig {
    pub fn run_dir(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(date.format("%Y-%m-%d").to_string())
    }
}

// ── Collaborators ───────────────────────────────────────────────────────────────

/// Per-stage models.
#[derive(Clone)]
pub struct StageModels {
    pub filter: ModelHandle,
    pub institution: ModelHandle,
    pub note: ModelHandle,
}

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn PaperSearch>,
    pub downloader: Arc<dyn Downloader>,
    pub extractor: Arc<dyn TextExtractor>,
    pub renderer: Arc<dyn PageRenderer>,
    pub institutions: Arc<InstitutionTable>,
    pub models: StageModels,
}

// ── Result summary ──────────────────────────────────────────────────────────────

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub run_dir: PathBuf,
    pub found: usize,
    pub relevant: usize,
    pub downloaded: usize,
    pub download_failed: usize,
    pub kept: usize,
    pub removed: usize,
    pub still_pending: usize,
    pub notes: usize,
    /// `(bucket, notes)` in bucket order.
    pub buckets: Vec<(String, usize)>,
    pub images_rendered: usize,
    /// False when the run stopped after institution resolution because rows
    /// are still pending.
    pub completed: bool,
}

impl RunSummary {
    fn new(run_id: Uuid, run_dir: PathBuf) -> Self {
        Self {
            run_id,
            run_dir,
            found: 0,
            relevant: 0,
            downloaded: 0,
            download_failed: 0,
            kept: 0,
            removed: 0,
            still_pending: 0,
            notes: 0,
            buckets: Vec::new(),
            images_rendered: 0,
            completed: false,
        }
    }
}

// ── Pipeline orchestrator ───────────────────────────────────────────────────────

pub struct DigestPipeline {
    config: PipelineConfig,
    collab: Collaborators,
}

impl DigestPipeline {
    pub fn new(config: PipelineConfig, collab: Collaborators) -> Self {
        Self { config, collab }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run (or resume) the digest for `date`.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, date: NaiveDate) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));

        let checkpoints = CheckpointDir::new(self.config.run_dir(date));
        checkpoints.ensure().await?;
        info!(run_dir = %checkpoints.root().display(), "Starting digest run");

        let mut summary = RunSummary::new(run_id, checkpoints.root().to_path_buf());

        // ── Stage 1: discovery ───────────────────────────────────────────
        let papers: Vec<PaperRecord> = checkpoints
            .load_or_run(PAPERS, || async {
                let query = SearchQuery::for_day(self.config.categories.clone(), date, self.config.max_results);
                Ok::<_, DigestError>(discover(self.collab.search.as_ref(), &query).await)
            })
            .await?;
        summary.found = papers.len();
        info!(found = papers.len(), "Stage 1 complete: discovery");

        // ── Stage 2: relevance filter ────────────────────────────────────
        let relevant: Vec<ClassifiedPaper> = checkpoints
            .load_or_run(PAPERS_FILTER, || async {
                let classifier = RelevanceClassifier::new(self.collab.models.filter.clone(), self.config.max_concurrent);
                Ok::<_, DigestError>(relevant_only(classifier.classify_all(&papers).await))
            })
            .await?;
        summary.relevant = relevant.len();
        info!(relevant = relevant.len(), "Stage 2 complete: relevance filter");

        // ── Stage 3: fetch ───────────────────────────────────────────────
        let downloaded: Vec<DownloadedPaper> = checkpoints
            .load_or_run(DOWNLOADED, || async {
                let fetcher = PdfFetcher::new(self.collab.downloader.clone(), checkpoints.path(PAPERS_DIR));
                Ok::<_, DigestError>(fetcher.fetch_all(&relevant).await?)
            })
            .await?;
        summary.download_failed = downloaded
            .iter()
            .filter(|r| r.download_status == DownloadStatus::Failed)
            .count();
        summary.downloaded = downloaded.len() - summary.download_failed;
        info!(
            downloaded = summary.downloaded,
            failed = summary.download_failed,
            "Stage 3 complete: fetch"
        );

        // ── Stage 4: institution resolution ──────────────────────────────
        let resolved: Vec<ResolvedPaper> = match checkpoints.load(FILTER_INSTITUTION).await? {
            Some(resolved) => {
                info!(checkpoint = FILTER_INSTITUTION, "Checkpoint found, skipping stage");
                apply_counts(&mut summary, ResolveSummary::from_rows(&downloaded));
                resolved
            }
            None => {
                let store = JsonFileStore::create(checkpoints.path(DOWNLOADED), downloaded).await?;
                let resolver = InstitutionResolver::new(
                    self.collab.models.institution.clone(),
                    self.collab.extractor.clone(),
                    self.collab.institutions.clone(),
                    self.config.max_concurrent,
                );
                let counts = resolver.resolve_pending(&store).await?;
                apply_counts(&mut summary, counts);

                if counts.pending > 0 && !self.config.finalize_with_pending {
                    warn!(
                        pending = counts.pending,
                        "Rows still pending; stopping before notes. Re-run to retry them"
                    );
                    return Ok(summary);
                }

                let rows = store.load().await?;
                let resolved: Vec<ResolvedPaper> = rows.iter().filter_map(DownloadedPaper::resolved).collect();
                checkpoints.save(FILTER_INSTITUTION, &resolved).await?;
                info!(checkpoint = FILTER_INSTITUTION, kept = resolved.len(), "Checkpoint written");
                resolved
            }
        };
        info!(
            kept = summary.kept,
            removed = summary.removed,
            pending = summary.still_pending,
            "Stage 4 complete: institution resolution"
        );

        // ── Stage 5: notes ───────────────────────────────────────────────
        let notes: Vec<Note> = checkpoints
            .load_or_run(NOTES, || async {
                let writer = NoteWriter::new(
                    self.collab.models.note.clone(),
                    self.collab.extractor.clone(),
                    self.config.max_concurrent,
                );
                Ok::<_, DigestError>(writer.write_all(&resolved).await)
            })
            .await?;
        if !checkpoints.exists(NOTES_DIGEST).await {
            write_atomic(&checkpoints.path(NOTES_DIGEST), render_digest(&notes).as_bytes()).await?;
        }
        summary.notes = notes.len();
        info!(notes = notes.len(), "Stage 5 complete: notes");

        // ── Stage 6: grouping and materials ──────────────────────────────
        let institution_dir = checkpoints.path(INSTITUTION_DIR);
        let grouped = group(&notes);
        write_buckets(&institution_dir, &grouped).await?;
        summary.images_rendered =
            write_materials(&institution_dir, &grouped, self.collab.renderer.as_ref(), self.config.render).await?;
        summary.buckets = grouped
            .iter()
            .map(|g| (g.bucket.as_str().to_string(), g.notes.len()))
            .collect();
        info!(buckets = ?summary.buckets, "Stage 6 complete: grouping");

        summary.completed = true;
        Ok(summary)
    }
}

fn apply_counts(summary: &mut RunSummary, counts: ResolveSummary) {
    summary.kept = counts.kept;
    summary.removed = counts.removed;
    summary.still_pending = counts.pending;
}
