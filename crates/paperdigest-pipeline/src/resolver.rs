//! Institution resolution: the per-item state machine of `downloaded.json`.
//!
//! ```text
//! pending ──(model names a tracked institution)──▶ keep    (file renamed)
//!    │
//!    └─────(model answers the sentinel)──────────▶ remove  (file deleted)
//! ```
//!
//! Call failures, empty replies, unreadable PDFs and missing files leave the
//! row `pending` for the next invocation. Terminal rows are never revisited.
//! The concurrent part only extracts text and queries the model; file side
//! effects and persistence happen in the serialized completion loop, so the
//! state file and the disk agree after every item.

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use paperdigest_common::{InstitutionTable, Result};
use paperdigest_ingestion::models::{DownloadStatus, DownloadedPaper, InstitutionStatus};
use paperdigest_ingestion::naming::{sanitize_component, with_institution};
use paperdigest_ingestion::pdf_parser::TextExtractor;
use paperdigest_llm::verdict::INSTITUTION_SENTINEL;
use paperdigest_llm::{InstitutionVerdict, ModelHandle};
use tracing::{info, instrument, warn};

use crate::runner::run_bounded;
use crate::state_store::PaperStateStore;

const MAX_TOKENS: u32 = 100;
const TEMPERATURE: f32 = 0.5;

/// Separator used when joining several matched institutions.
pub const INSTITUTION_JOINER: &str = "、";

const SYSTEM_PROMPT: &str = "You are a professional assistant for extracting author affiliations from papers.";

fn user_prompt(first_page: &str, table_hint: &str) -> String {
    format!(
        "Decide from the first page of the paper below whether the first two author affiliations include an institution I track. \
         If they do, return the canonical names of all matching institutions separated by \"{joiner}\"; otherwise return \"{sentinel}\". \
         Return nothing else.\n\n\
         First page:\n{first_page}\n\n\
         Tracked institutions (canonical name: spellings used in papers):\n{table_hint}",
        joiner = INSTITUTION_JOINER,
        sentinel = INSTITUTION_SENTINEL,
    )
}

/// Outcome of the concurrent part for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The PDF is not on disk.
    MissingFile,
    /// Extraction or model call failed, or the reply was empty.
    Failed(String),
    NoMatch,
    Matched { raw: String, names: Vec<String> },
}

/// Counts over `downloaded.json` after a resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub kept: usize,
    pub removed: usize,
    pub pending: usize,
    /// Failed downloads, never eligible for resolution.
    pub not_downloaded: usize,
}

impl ResolveSummary {
    pub fn from_rows(rows: &[DownloadedPaper]) -> Self {
        let mut s = Self::default();
        for row in rows {
            if row.download_status == DownloadStatus::Failed {
                s.not_downloaded += 1;
                continue;
            }
            match row.institution_status {
                InstitutionStatus::Keep => s.kept += 1,
                InstitutionStatus::Remove => s.removed += 1,
                InstitutionStatus::Pending => s.pending += 1,
            }
        }
        s
    }
}

pub struct InstitutionResolver {
    model: ModelHandle,
    extractor: Arc<dyn TextExtractor>,
    table: Arc<InstitutionTable>,
    max_concurrent: usize,
}

impl InstitutionResolver {
    pub fn new(
        model: ModelHandle,
        extractor: Arc<dyn TextExtractor>,
        table: Arc<InstitutionTable>,
        max_concurrent: usize,
    ) -> Self {
        Self { model, extractor, table, max_concurrent }
    }

    /// Extract the first page and ask the model. No side effects.
    pub async fn lookup(&self, row: &DownloadedPaper) -> Lookup {
        if !tokio::fs::try_exists(&row.file_path).await.unwrap_or(false) {
            return Lookup::MissingFile;
        }
        let first_page = match self.extractor.first_page(&row.file_path).await {
            Ok(text) => text,
            Err(e) => return Lookup::Failed(format!("text extraction failed: {:#}", e)),
        };

        let prompt = user_prompt(&first_page, &self.table.prompt_hint());
        let reply = match self.model.complete(SYSTEM_PROMPT, &prompt, MAX_TOKENS, TEMPERATURE, None).await {
            Ok(reply) => reply,
            Err(e) => return Lookup::Failed(e.to_string()),
        };

        match InstitutionVerdict::parse_with(&reply, |name| self.table.lookup(name).is_some()) {
            None => Lookup::Failed("empty reply".to_string()),
            Some(InstitutionVerdict::NoMatch) => Lookup::NoMatch,
            Some(InstitutionVerdict::Matched(names)) => Lookup::Matched { raw: reply.trim().to_string(), names },
        }
    }

    /// Resolve every pending, downloaded row of `store`, persisting each
    /// resolved row as soon as it completes.
    #[instrument(skip_all)]
    pub async fn resolve_pending(&self, store: &dyn PaperStateStore) -> Result<ResolveSummary> {
        let rows = store.load().await?;
        let pending: Vec<DownloadedPaper> = rows
            .into_iter()
            .filter(|r| r.download_status == DownloadStatus::Downloaded && !r.institution_status.is_terminal())
            .collect();
        info!(pending = pending.len(), "Resolving institutions");

        let mut completions = Box::pin(run_bounded(
            pending.iter().collect(),
            self.max_concurrent,
            |row| async move { Ok::<_, anyhow::Error>(self.lookup(row).await) },
        ));

        while let Some(done) = completions.next().await {
            let progress = done.progress();
            let row = &pending[done.index];
            let lookup = done.result.unwrap_or_else(|failure| Lookup::Failed(failure.message));

            if let Some(updated) = self.apply(row, lookup).await {
                store.upsert(&updated).await?;
                info!(
                    arxiv_id = %updated.id(),
                    status = updated.institution_status.as_str(),
                    institution = updated.first_institution.as_deref().unwrap_or(""),
                    "{}", progress
                );
            } else {
                info!(arxiv_id = %row.id(), status = "pending", "{}", progress);
            }
        }

        let summary = ResolveSummary::from_rows(&store.load().await?);
        info!(
            kept = summary.kept,
            removed = summary.removed,
            pending = summary.pending,
            not_downloaded = summary.not_downloaded,
            "Institution stage complete"
        );
        Ok(summary)
    }

    /// Apply file side effects for one lookup. `None` leaves the row pending.
    async fn apply(&self, row: &DownloadedPaper, lookup: Lookup) -> Option<DownloadedPaper> {
        match lookup {
            Lookup::MissingFile => {
                warn!(arxiv_id = %row.id(), path = %row.file_path.display(), "PDF missing, leaving pending");
                None
            }
            Lookup::Failed(reason) => {
                warn!(arxiv_id = %row.id(), %reason, "Institution lookup failed, leaving pending");
                None
            }
            Lookup::NoMatch => {
                match tokio::fs::remove_file(&row.file_path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        // Keep the invariant: `remove` implies no file on disk.
                        warn!(arxiv_id = %row.id(), error = %e, "Could not delete PDF, leaving pending");
                        return None;
                    }
                }
                let mut updated = row.clone();
                updated.institution_status = InstitutionStatus::Remove;
                Some(updated)
            }
            Lookup::Matched { raw, names } => {
                let first = names.first().map(String::as_str).unwrap_or_default();
                let canonical = self
                    .table
                    .lookup(first)
                    .map(|e| e.canonical.clone())
                    .unwrap_or_else(|| first.to_string());
                let first_institution = sanitize_component(&canonical);
                let category = self.table.category_of(&canonical);

                let mut updated = row.clone();
                updated.file_path = self.rename(row, &first_institution).await;
                updated.institution = Some(raw);
                updated.first_institution = Some(first_institution);
                updated.institution_category = Some(category);
                updated.institution_status = InstitutionStatus::Keep;
                Some(updated)
            }
        }
    }

    /// Embed the institution into the file name; falls back to the old path.
    async fn rename(&self, row: &DownloadedPaper, institution: &str) -> PathBuf {
        let Some(file_name) = row.file_path.file_name().and_then(|n| n.to_str()) else {
            return row.file_path.clone();
        };
        let Some(new_name) = with_institution(file_name, institution) else {
            warn!(arxiv_id = %row.id(), file_name, "Unexpected file name, not renaming");
            return row.file_path.clone();
        };
        if new_name == file_name {
            return row.file_path.clone();
        }

        let new_path = row.file_path.with_file_name(new_name);
        match tokio::fs::rename(&row.file_path, &new_path).await {
            Ok(()) => new_path,
            Err(e) => {
                warn!(arxiv_id = %row.id(), error = %e, "Rename failed, keeping original name");
                row.file_path.clone()
            }
        }
    }
}
