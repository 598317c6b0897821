//! Publishing materials per bucket: the `content.txt` copy sheet and the
//! first-page images, ordered the same way.

use std::path::Path;

use lazy_static::lazy_static;
use paperdigest_common::{DigestError, Result};
use paperdigest_ingestion::models::Note;
use paperdigest_ingestion::render::{ImageFormat, PageRenderer};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::checkpoint::write_atomic;
use crate::grouping::BucketNotes;

pub const CONTENT_SHEET: &str = "content.txt";

lazy_static! {
    static ref CONTRIBUTION: Regex =
        Regex::new(r"(?s)(?:Main contribution|主要贡献)\s*[:：]\s*(.*?)\s*(?:[🔸📝🔎💡]|$)").unwrap();
}

/// The "Main contribution" sentence of a note, or an empty string.
pub fn extract_contribution(note: &str) -> String {
    CONTRIBUTION
        .captures(note)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

pub fn copy_line(note: &Note) -> String {
    format!("🔸{}：{}", note.paper.id(), extract_contribution(&note.note))
}

/// Notes grouped by `first_institution`, groups in first-seen order.
pub fn by_institution(notes: &[Note]) -> Vec<(&str, Vec<&Note>)> {
    let mut groups: Vec<(&str, Vec<&Note>)> = Vec::new();
    for note in notes {
        let key = note.paper.first_institution.as_str();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(note),
            None => groups.push((key, vec![note])),
        }
    }
    groups
}

pub fn render_content_sheet(notes: &[Note]) -> String {
    let mut out = String::new();
    for (institution, members) in by_institution(notes) {
        out.push_str(&format!("\n🛎️{}\n", institution));
        for note in members {
            out.push_str(&copy_line(note));
            out.push('\n');
        }
    }
    out
}

/// Image rendering settings.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub dpi: u32,
    pub format: ImageFormat,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { dpi: 300, format: ImageFormat::Png }
    }
}

/// Write `content.txt` for every bucket and render first pages as
/// `{seq}_{id}.{ext}`, the sequence running across buckets in sheet order.
/// Existing images are kept; render failures are logged and skipped.
/// Returns the number of images rendered in this call.
pub async fn write_materials(
    institution_dir: &Path,
    grouped: &[BucketNotes],
    renderer: &dyn PageRenderer,
    settings: RenderSettings,
) -> Result<usize> {
    let mut seq = 0usize;
    let mut rendered = 0usize;

    for group in grouped {
        let dir = group.dir(institution_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DigestError::checkpoint(&dir, e))?;
        write_atomic(&dir.join(CONTENT_SHEET), render_content_sheet(&group.notes).as_bytes()).await?;

        for (_, members) in by_institution(&group.notes) {
            for note in members {
                let image = dir.join(format!("{}_{}.{}", seq, note.paper.id(), settings.format.extension()));
                seq += 1;

                if tokio::fs::try_exists(&image).await.unwrap_or(false) {
                    debug!(image = %image.display(), "Image exists, skipping");
                    continue;
                }
                if !tokio::fs::try_exists(&note.paper.file_path).await.unwrap_or(false) {
                    warn!(arxiv_id = %note.paper.id(), "PDF missing, no image rendered");
                    continue;
                }
                match renderer
                    .render_first_page(&note.paper.file_path, &image, settings.dpi, settings.format)
                    .await
                {
                    Ok(()) => rendered += 1,
                    Err(e) => warn!(arxiv_id = %note.paper.id(), error = %e, "First-page render failed"),
                }
            }
        }
    }

    info!(images = seq, rendered, "Materials written");
    Ok(rendered)
}
