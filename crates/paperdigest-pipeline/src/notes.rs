//! Note writing for kept papers.

use std::sync::Arc;

use futures_util::StreamExt;
use paperdigest_ingestion::models::{Note, NoteOutcome, ResolvedPaper};
use paperdigest_ingestion::pdf_parser::{approx_token_count, TextExtractor};
use paperdigest_llm::ModelHandle;
use tracing::{debug, info, instrument, warn};

use crate::runner::run_bounded;

/// Papers longer than this (in whitespace-delimited words) are not sent to the model.
pub const WORD_CEILING: usize = 129_000;

pub const TRUNCATED_NOTE: &str = "Paper is longer than 129000 words; context truncated.";

const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.5;

/// Marker of the contribution line the copy sheet quotes.
pub const CONTRIBUTION_MARKER: &str = "Main contribution:";

const SYSTEM_PROMPT: &str = "You are a paper note assistant. Read the paper and write a note strictly in the format below, \
without markdown, in at most 900 words. Format:\n\
Note title: (a short phrase stating what the paper contributes)\n\n\
🛎️Overview\n\
🔸Research question: (one question describing the problem the paper tries to solve)\n\
🔸Main contribution: (one sentence on what the paper contributes)\n\n\
📝Key ideas (one line per step of the method, each starting with 🔸)\n\n\
🔎Findings (one line per conclusion drawn from the experiments, each starting with 🔸)\n\n\
💡Opinion\n\
(summarise what is novel about the paper)";

fn with_header(paper: &ResolvedPaper, body: &str) -> String {
    format!("📖Title: {}\n🌐Source: arXiv, {}\n\n{}", paper.title(), paper.id(), body)
}

pub struct NoteWriter {
    model: ModelHandle,
    extractor: Arc<dyn TextExtractor>,
    max_concurrent: usize,
}

impl NoteWriter {
    pub fn new(model: ModelHandle, extractor: Arc<dyn TextExtractor>, max_concurrent: usize) -> Self {
        Self { model, extractor, max_concurrent }
    }

    /// Write the note for one paper. Never fails; problems end up in the note.
    pub async fn write(&self, paper: &ResolvedPaper) -> Note {
        let text = match self.extractor.full_text(&paper.file_path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(arxiv_id = %paper.id(), error = %e, "Full text unavailable");
                return Note {
                    paper: paper.clone(),
                    note: with_header(paper, &format!("Generation failed: {:#}", e)),
                    note_outcome: NoteOutcome::Failed,
                };
            }
        };

        let words = approx_token_count(&text);
        debug!(arxiv_id = %paper.id(), words, "Paper length");
        if words > WORD_CEILING {
            info!(arxiv_id = %paper.id(), words, "Paper over the length ceiling, skipping model call");
            return Note {
                paper: paper.clone(),
                note: TRUNCATED_NOTE.to_string(),
                note_outcome: NoteOutcome::Truncated,
            };
        }

        let user = format!("Paper content:\n{}", text);
        let extra = serde_json::json!({ "enable_thinking": false });
        let (body, outcome) = match self.model.complete(SYSTEM_PROMPT, &user, MAX_TOKENS, TEMPERATURE, Some(extra)).await {
            Ok(content) => (content, NoteOutcome::Generated),
            Err(e) => {
                warn!(arxiv_id = %paper.id(), error = %e, "Note call failed");
                (format!("Generation failed: {}", e), NoteOutcome::Failed)
            }
        };

        Note {
            paper: paper.clone(),
            note: with_header(paper, &body),
            note_outcome: outcome,
        }
    }

    /// Write notes for all papers, sorted by title.
    #[instrument(skip_all, fields(total = papers.len()))]
    pub async fn write_all(&self, papers: &[ResolvedPaper]) -> Vec<Note> {
        let mut notes = Vec::with_capacity(papers.len());
        let mut completions = Box::pin(run_bounded(
            papers.iter().collect(),
            self.max_concurrent,
            |paper| async move { Ok::<_, anyhow::Error>(self.write(paper).await) },
        ));

        while let Some(done) = completions.next().await {
            let progress = done.progress();
            let note = match done.result {
                Ok(note) => note,
                Err(failure) => {
                    let paper = &papers[done.index];
                    warn!(arxiv_id = %paper.id(), error = %failure, "Note task failed");
                    Note {
                        paper: paper.clone(),
                        note: with_header(paper, &format!("Generation failed: {}", failure)),
                        note_outcome: NoteOutcome::Failed,
                    }
                }
            };
            info!(arxiv_id = %note.paper.id(), outcome = ?note.note_outcome, "{} notes written", progress);
            notes.push(note);
        }

        sort_notes(&mut notes);
        let failed = notes.iter().filter(|n| n.note_outcome == NoteOutcome::Failed).count();
        let truncated = notes.iter().filter(|n| n.note_outcome == NoteOutcome::Truncated).count();
        info!(total = notes.len(), failed, truncated, "Note stage complete");
        notes
    }
}

/// Order by title, then id, so the checkpoint is independent of completion order.
pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        a.paper
            .title()
            .cmp(b.paper.title())
            .then_with(|| a.paper.id().cmp(b.paper.id()))
    });
}
