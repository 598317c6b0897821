//! paperdigest-common: Shared error type, HTTP sandbox and institution table
//! used across all paperdigest crates.

pub mod error;
pub mod institution;
pub mod sandbox;

pub use error::{DigestError, Result};
pub use institution::{InstitutionCategory, InstitutionTable};
