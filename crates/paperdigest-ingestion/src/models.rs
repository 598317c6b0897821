//! Per-stage paper records.
//!
//! Each stage's record embeds the previous one with `#[serde(flatten)]`, so the
//! checkpoint JSON of a later stage is a superset of the earlier one.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use paperdigest_common::InstitutionCategory;

/// Serialised form of an irrelevant classification.
pub const IRRELEVANT_TAG: &str = "irrelevant";

/// A discovered paper. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Source-assigned identifier, e.g. `2512.08343v1`.
    #[serde(rename = "id")]
    pub arxiv_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    #[serde(rename = "published")]
    pub published_date: NaiveDate,
    pub pdf_url: String,
    pub summary: String,
}

/// Relevance label assigned by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelevanceTag {
    Topic(String),
    Irrelevant,
}

impl RelevanceTag {
    pub fn is_relevant(&self) -> bool {
        matches!(self, RelevanceTag::Topic(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RelevanceTag::Topic(t) => t,
            RelevanceTag::Irrelevant => IRRELEVANT_TAG,
        }
    }
}

impl From<String> for RelevanceTag {
    fn from(s: String) -> Self {
        if s == IRRELEVANT_TAG {
            RelevanceTag::Irrelevant
        } else {
            RelevanceTag::Topic(s)
        }
    }
}

impl From<RelevanceTag> for String {
    fn from(tag: RelevanceTag) -> Self {
        match tag {
            RelevanceTag::Topic(t) => t,
            RelevanceTag::Irrelevant => IRRELEVANT_TAG.to_string(),
        }
    }
}

impl std::fmt::Display for RelevanceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedPaper {
    #[serde(flatten)]
    pub paper: PaperRecord,
    pub tag: RelevanceTag,
    /// False when the model call failed and the tag is the fallback.
    pub success: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    #[default]
    Downloaded,
    Failed,
}

/// Resumability marker of the institution stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstitutionStatus {
    #[default]
    Pending,
    Keep,
    Remove,
}

impl InstitutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstitutionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstitutionStatus::Pending => "pending",
            InstitutionStatus::Keep => "keep",
            InstitutionStatus::Remove => "remove",
        }
    }
}

/// Row of `downloaded.json`; mutated in place by the institution stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadedPaper {
    #[serde(flatten)]
    pub paper: ClassifiedPaper,
    pub file_path: PathBuf,
    #[serde(default)]
    pub download_status: DownloadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_error: Option<String>,
    #[serde(default)]
    pub institution_status: InstitutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_category: Option<InstitutionCategory>,
}

impl DownloadedPaper {
    pub fn downloaded(paper: ClassifiedPaper, file_path: PathBuf) -> Self {
        Self {
            paper,
            file_path,
            download_status: DownloadStatus::Downloaded,
            download_error: None,
            institution_status: InstitutionStatus::Pending,
            institution: None,
            first_institution: None,
            institution_category: None,
        }
    }

    pub fn failed(paper: ClassifiedPaper, file_path: PathBuf, error: impl Into<String>) -> Self {
        Self {
            download_status: DownloadStatus::Failed,
            download_error: Some(error.into()),
            ..Self::downloaded(paper, file_path)
        }
    }

    pub fn id(&self) -> &str {
        &self.paper.paper.arxiv_id
    }

    /// Projection for `filter_institution.json`; `None` unless kept and fully resolved.
    pub fn resolved(&self) -> Option<ResolvedPaper> {
        if self.institution_status != InstitutionStatus::Keep {
            return None;
        }
        Some(ResolvedPaper {
            paper: self.paper.clone(),
            file_path: self.file_path.clone(),
            institution: self.institution.clone()?,
            first_institution: self.first_institution.clone()?,
            institution_category: self.institution_category?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPaper {
    #[serde(flatten)]
    pub paper: ClassifiedPaper,
    pub file_path: PathBuf,
    /// Raw model output, possibly several delimiter-separated names.
    pub institution: String,
    /// First listed institution, safe for use in file names.
    pub first_institution: String,
    pub institution_category: InstitutionCategory,
}

impl ResolvedPaper {
    pub fn id(&self) -> &str {
        &self.paper.paper.arxiv_id
    }

    pub fn title(&self) -> &str {
        &self.paper.paper.title
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteOutcome {
    Generated,
    /// Source text over the size ceiling; fixed note, no model call.
    Truncated,
    /// Model call failed; the note holds the error text.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(flatten)]
    pub paper: ResolvedPaper,
    pub note: String,
    pub note_outcome: NoteOutcome,
}
