//! paperdigest-ingestion: everything that touches the outside world on behalf
//! of the pipeline:
//! - Paper discovery (arXiv Atom API)
//! - PDF download with file-level resume
//! - PDF text extraction
//! - First-page rendering for the digest materials

pub mod fetcher;
pub mod models;
pub mod naming;
pub mod pdf_parser;
pub mod render;
pub mod sources;
