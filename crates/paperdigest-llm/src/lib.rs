//! paperdigest-llm: Language-model backend abstraction.
//!
//! - `backend`: the `LlmBackend` trait and OpenAI-style HTTP backends
//! - `router`: per-stage model selection (`filter`, `institution`, `note`)
//! - `verdict`: strict parsing of free-text model replies into enums

pub mod backend;
pub mod router;
pub mod verdict;

pub use backend::{LlmBackend, LlmError, LlmRequest, LlmResponse, Message};
pub use router::{ModelHandle, Stage, StageRouter};
pub use verdict::{InstitutionVerdict, RelevanceVerdict};
