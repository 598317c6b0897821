//! Partition notes into output buckets and write the per-bucket digests.

use std::path::{Path, PathBuf};

use paperdigest_common::{DigestError, InstitutionCategory, Result};
use paperdigest_ingestion::models::Note;
use tracing::info;

use crate::checkpoint::{write_atomic, write_json_atomic};

const SEPARATOR_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Foreign and domestic industry together.
    Industry,
    ForeignAcademia,
    DomesticAcademia,
    Other,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [
        Bucket::Industry,
        Bucket::ForeignAcademia,
        Bucket::DomesticAcademia,
        Bucket::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Industry => "industry",
            Bucket::ForeignAcademia => "foreign_academia",
            Bucket::DomesticAcademia => "domestic_academia",
            Bucket::Other => "other",
        }
    }

    pub fn of(category: InstitutionCategory) -> Self {
        match category {
            InstitutionCategory::ForeignIndustry | InstitutionCategory::DomesticIndustry => Bucket::Industry,
            InstitutionCategory::ForeignAcademia => Bucket::ForeignAcademia,
            InstitutionCategory::DomesticAcademia => Bucket::DomesticAcademia,
            InstitutionCategory::Other => Bucket::Other,
        }
    }
}

/// Notes of one bucket, in note order.
#[derive(Debug, Clone)]
pub struct BucketNotes {
    pub bucket: Bucket,
    pub notes: Vec<Note>,
}

impl BucketNotes {
    pub fn dir(&self, institution_dir: &Path) -> PathBuf {
        institution_dir.join(self.bucket.as_str())
    }
}

/// Split notes into the four buckets, always in [`Bucket::ALL`] order.
pub fn group(notes: &[Note]) -> Vec<BucketNotes> {
    Bucket::ALL
        .iter()
        .map(|&bucket| BucketNotes {
            bucket,
            notes: notes
                .iter()
                .filter(|n| Bucket::of(n.paper.institution_category) == bucket)
                .cloned()
                .collect(),
        })
        .collect()
}

/// Plain-text digest: separator, institution line, note.
pub fn render_digest(notes: &[Note]) -> String {
    let mut out = String::new();
    for note in notes {
        out.push_str(&"=".repeat(SEPARATOR_WIDTH));
        out.push_str("\n\n");
        out.push_str(&note.paper.institution);
        out.push_str("\n\n");
        out.push_str(&note.note);
        out.push_str("\n\n");
    }
    out
}

/// Write `{bucket}/{bucket}.json` and `{bucket}/{bucket}.txt` for every bucket.
pub async fn write_buckets(institution_dir: &Path, grouped: &[BucketNotes]) -> Result<()> {
    for group in grouped {
        let dir = group.dir(institution_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DigestError::checkpoint(&dir, e))?;

        let name = group.bucket.as_str();
        write_json_atomic(&dir.join(format!("{name}.json")), &group.notes).await?;
        write_atomic(&dir.join(format!("{name}.txt")), render_digest(&group.notes).as_bytes()).await?;
        info!(bucket = name, notes = group.notes.len(), "Bucket written");
    }
    Ok(())
}
