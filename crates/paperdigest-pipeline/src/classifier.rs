//! Relevance filter: tags each paper with a short topic label or `irrelevant`.
//!
//! Failures bias toward exclusion. A paper whose call fails is tagged
//! irrelevant with `success = false`.

use futures_util::StreamExt;
use paperdigest_ingestion::models::{ClassifiedPaper, PaperRecord, RelevanceTag};
use paperdigest_llm::verdict::RELEVANCE_SENTINEL;
use paperdigest_llm::{ModelHandle, RelevanceVerdict};
use tracing::{info, instrument, warn};

use crate::runner::run_bounded;

const MAX_TOKENS: u32 = 20;
const TEMPERATURE: f32 = 0.5;

const SYSTEM_PROMPT: &str = "You are a professional research-paper tagger.";

fn user_prompt(paper: &PaperRecord) -> String {
    format!(
        "Title: {title}\n\
         Abstract: {summary}\n\n\
         Using the title and abstract, decide whether this paper is about large language models and return one label:\n\
         1. LLM work covers pretraining corpora, training data, training algorithms, evaluation, safety, RAG, agents, open models and model architecture.\n\
         2. If the paper is unrelated, answer \"{sentinel}\". If it is related, answer with a short phrase naming its research topic, such as \"xx dataset\", \"xx benchmark\", \"model architecture\" or \"reinforcement learning\".\n\
         3. Return only the label.",
        title = paper.title,
        summary = paper.summary,
        sentinel = RELEVANCE_SENTINEL,
    )
}

pub struct RelevanceClassifier {
    model: ModelHandle,
    max_concurrent: usize,
}

impl RelevanceClassifier {
    pub fn new(model: ModelHandle, max_concurrent: usize) -> Self {
        Self { model, max_concurrent }
    }

    /// Classify one paper. Never fails.
    pub async fn classify(&self, paper: &PaperRecord) -> ClassifiedPaper {
        let reply = self
            .model
            .complete(SYSTEM_PROMPT, &user_prompt(paper), MAX_TOKENS, TEMPERATURE, None)
            .await;

        let (tag, success) = match reply {
            Ok(text) => match RelevanceVerdict::parse(&text) {
                RelevanceVerdict::Relevant(topic) => (RelevanceTag::Topic(topic), true),
                RelevanceVerdict::Irrelevant => (RelevanceTag::Irrelevant, true),
            },
            Err(e) => {
                warn!(arxiv_id = %paper.arxiv_id, error = %e, "Relevance call failed");
                (RelevanceTag::Irrelevant, false)
            }
        };

        ClassifiedPaper { paper: paper.clone(), tag, success }
    }

    /// Classify every paper; results come back in input order.
    #[instrument(skip_all, fields(total = papers.len()))]
    pub async fn classify_all(&self, papers: &[PaperRecord]) -> Vec<ClassifiedPaper> {
        let mut slots: Vec<Option<ClassifiedPaper>> = vec![None; papers.len()];

        let mut completions = Box::pin(run_bounded(
            papers.iter().collect(),
            self.max_concurrent,
            |paper| async move { Ok::<_, anyhow::Error>(self.classify(paper).await) },
        ));
        while let Some(done) = completions.next().await {
            let progress = done.progress();
            let classified = match done.result {
                Ok(c) => c,
                Err(failure) => {
                    let paper = &papers[done.index];
                    warn!(arxiv_id = %paper.arxiv_id, error = %failure, "Relevance task failed");
                    ClassifiedPaper { paper: paper.clone(), tag: RelevanceTag::Irrelevant, success: false }
                }
            };
            info!(arxiv_id = %classified.paper.arxiv_id, tag = %classified.tag, "{}", progress);
            slots[done.index] = Some(classified);
        }

        let results: Vec<ClassifiedPaper> = slots.into_iter().flatten().collect();
        let relevant = results.iter().filter(|c| c.tag.is_relevant()).count();
        let failed = results.iter().filter(|c| !c.success).count();
        info!(total = results.len(), relevant, irrelevant = results.len() - relevant, failed, "Relevance filter complete");
        results
    }
}

/// Keep papers whose tag is not the irrelevant sentinel.
pub fn relevant_only(classified: Vec<ClassifiedPaper>) -> Vec<ClassifiedPaper> {
    classified.into_iter().filter(|c| c.tag.is_relevant()).collect()
}
