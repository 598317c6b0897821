//! Configuration loading for paperdigest.
//! Reads paperdigest.toml from the path given on the command line, the
//! PAPERDIGEST_CONFIG env var, or the current directory, in that order.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use paperdigest_ingestion::render::ImageFormat;
use paperdigest_ingestion::sources::arxiv::{DEFAULT_CATEGORIES, DEFAULT_MAX_RESULTS, DEFAULT_PAGE_SIZE};

pub const CONFIG_ENV: &str = "PAPERDIGEST_CONFIG";
pub const API_KEY_ENV: &str = "PAPERDIGEST_API_KEY";
const DEFAULT_CONFIG_FILE: &str = "paperdigest.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// TOML institution table replacing the built-in one.
    #[serde(default)]
    pub institutions_path: Option<PathBuf>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    OpenaiCompatible,
    Openai,
    Ollama,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenaiCompatible => "openai_compatible",
            BackendKind::Openai => "openai",
            BackendKind::Ollama => "ollama",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Falls back to PAPERDIGEST_API_KEY when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    /// Per-request limit for model calls; a timed-out call is an ordinary failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend()      -> BackendKind { BackendKind::OpenaiCompatible }
fn default_base_url()     -> String { "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string() }
fn default_timeout_secs() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            base_url: default_base_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Key from the file, else from the environment. Empty strings count as unset.
    pub fn resolve_api_key(&self, env_value: Option<String>) -> Option<SecretString> {
        self.api_key
            .clone()
            .filter(|k| !k.expose_secret().is_empty())
            .or_else(|| env_value.filter(|k| !k.is_empty()).map(SecretString::from))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_filter_model")]
    pub filter_model: String,
    #[serde(default = "default_institution_model")]
    pub institution_model: String,
    #[serde(default = "default_note_model")]
    pub note_model: String,
}

fn default_filter_model()      -> String { "qwen-plus".to_string() }
fn default_institution_model() -> String { "qwen-plus".to_string() }
fn default_note_model()        -> String { "qwen-plus".to_string() }

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            filter_model: default_filter_model(),
            institution_model: default_institution_model(),
            note_model: default_note_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_categories()  -> Vec<String> { DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect() }
fn default_max_results() -> usize { DEFAULT_MAX_RESULTS }
fn default_page_size()   -> usize { DEFAULT_PAGE_SIZE }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            max_results: default_max_results(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub finalize_with_pending: bool,
}

fn default_output_dir()     -> PathBuf { PathBuf::from("./output") }
fn default_max_concurrent() -> usize { 4 }

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent: default_max_concurrent(),
            finalize_with_pending: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default)]
    pub format: ImageFormat,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: PathBuf,
}

fn default_dpi()      -> u32 { 300 }
fn default_pdftoppm() -> PathBuf { PathBuf::from("pdftoppm") }

impl Default for RenderConfig {
    fn default() -> Self {
        Self { dpi: default_dpi(), format: ImageFormat::default(), pdftoppm: default_pdftoppm() }
    }
}

mod tests;

impl Config {
    /// Config file location: explicit path, then PAPERDIGEST_CONFIG, then ./paperdigest.toml.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load the file at `path`. A missing file yields the built-in defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using built-in defaults. Copy paperdigest.example.toml to paperdigest.toml and edit it."
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.pipeline.max_concurrent == 0 {
            anyhow::bail!("pipeline.max_concurrent must be at least 1");
        }
        if config.llm.timeout_secs == 0 {
            anyhow::bail!("llm.timeout_secs must be at least 1");
        }
        Ok(config)
    }
}
