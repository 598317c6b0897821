//! First-page rendering for the digest materials, through poppler's `pdftoppm`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    fn pdftoppm_flag(&self) -> &'static str {
        match self {
            ImageFormat::Png => "-png",
            ImageFormat::Jpeg => "-jpeg",
        }
    }
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Render page 1 of `pdf` to `output` (extension included).
    async fn render_first_page(
        &self,
        pdf: &Path,
        output: &Path,
        dpi: u32,
        format: ImageFormat,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    binary: PathBuf,
}

impl PdftoppmRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new("pdftoppm")
    }
}

#[async_trait]
impl PageRenderer for PdftoppmRenderer {
    async fn render_first_page(
        &self,
        pdf: &Path,
        output: &Path,
        dpi: u32,
        format: ImageFormat,
    ) -> anyhow::Result<()> {
        // With -singlefile pdftoppm appends the extension to the output root.
        let root = output.with_extension("");
        let status = Command::new(&self.binary)
            .args(pdftoppm_args(dpi, format))
            .arg(pdf)
            .arg(&root)
            .kill_on_drop(true)
            .output()
            .await?;

        if !status.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.binary.display(),
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            );
        }

        // Not `with_extension`: arXiv ids contain a dot.
        let mut produced = root.into_os_string();
        produced.push(".");
        produced.push(format.extension());
        let produced = PathBuf::from(produced);
        if produced != output {
            tokio::fs::rename(&produced, output).await?;
        }
        debug!(pdf = %pdf.display(), output = %output.display(), "Rendered first page");
        Ok(())
    }
}

fn pdftoppm_args(dpi: u32, format: ImageFormat) -> Vec<String> {
    vec![
        "-f".to_string(),
        "1".to_string(),
        "-l".to_string(),
        "1".to_string(),
        "-r".to_string(),
        dpi.to_string(),
        format.pdftoppm_flag().to_string(),
        "-singlefile".to_string(),
    ]
}
