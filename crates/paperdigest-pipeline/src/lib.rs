//! paperdigest-pipeline: the resumable daily digest pipeline.
//!
//! Stages run in a fixed order, each checkpointed under the run directory:
//!   1. Discovery            → `papers.json`
//!   2. Relevance filter     → `papers_filter.json`
//!   3. PDF fetch            → `downloaded.json`, `papers/`
//!   4. Institution resolve  → `downloaded.json` (per item), `filter_institution.json`
//!   5. Note writing         → `notes.json`, `notes.txt`
//!   6. Grouping / materials → `institution/`

pub mod checkpoint;
pub mod classifier;
pub mod grouping;
pub mod materials;
pub mod notes;
pub mod pipeline;
pub mod resolver;
pub mod runner;
pub mod state_store;

pub use pipeline::{DigestPipeline, PipelineConfig, RunSummary};
