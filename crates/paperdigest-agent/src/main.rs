//! paperdigest: daily arXiv digest.
//! Entry point for the `paperdigest` binary.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paperdigest_common::sandbox::SandboxClient;
use paperdigest_common::InstitutionTable;
use paperdigest_ingestion::fetcher::HttpDownloader;
use paperdigest_ingestion::pdf_parser::LopdfExtractor;
use paperdigest_ingestion::render::PdftoppmRenderer;
use paperdigest_ingestion::sources::arxiv::ArxivSearch;
use paperdigest_llm::backend::{OllamaBackend, OpenAiBackend, OpenAiCompatibleBackend};
use paperdigest_llm::{LlmBackend, Stage, StageRouter};
use paperdigest_pipeline::materials::RenderSettings;
use paperdigest_pipeline::pipeline::{Collaborators, StageModels};
use paperdigest_pipeline::{DigestPipeline, PipelineConfig};

use config::{BackendKind, Config};

#[derive(Debug, Parser)]
#[command(name = "paperdigest", version, about = "Filter, fetch and summarise a day of arXiv papers")]
struct Args {
    /// Submission day to digest (YYYY-MM-DD); defaults to today (UTC).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Config file; overrides PAPERDIGEST_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root directory for run output; overrides `pipeline.output_dir`.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Finish the run even if some papers could not be resolved.
    #[arg(long)]
    finalize_pending: bool,
}

fn build_router(config: &Config) -> anyhow::Result<StageRouter> {
    let llm = &config.llm;
    let api_key = llm.resolve_api_key(std::env::var(config::API_KEY_ENV).ok());
    let timeout = llm.timeout();

    let backend: Arc<dyn LlmBackend> = match llm.backend {
        BackendKind::OpenaiCompatible => {
            if api_key.is_none() {
                warn!("No API key configured (set llm.api_key or {})", config::API_KEY_ENV);
            }
            Arc::new(OpenAiCompatibleBackend::with_timeout(
                &llm.base_url,
                &config.models.note_model,
                api_key,
                timeout,
            )?)
        }
        BackendKind::Openai => {
            let key = api_key.with_context(|| {
                format!("llm.backend = \"openai\" needs llm.api_key or {}", config::API_KEY_ENV)
            })?;
            Arc::new(OpenAiBackend::with_timeout(key, &config.models.note_model, timeout)?)
        }
        BackendKind::Ollama => {
            Arc::new(OllamaBackend::with_timeout(&llm.base_url, &config.models.note_model, timeout)?)
        }
    };

    let name = llm.backend.as_str();
    let mut router = StageRouter::new();
    router.register_backend(name, backend);
    router.route(Stage::Filter, name, &config.models.filter_model);
    router.route(Stage::Institution, name, &config.models.institution_model);
    router.route(Stage::Note, name, &config.models.note_model);
    Ok(router)
}

fn load_institutions(config: &Config) -> anyhow::Result<InstitutionTable> {
    match &config.institutions_path {
        Some(path) => InstitutionTable::load(path)
            .with_context(|| format!("loading institution table {}", path.display())),
        None => Ok(InstitutionTable::builtin()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("paperdigest=debug,info")),
        )
        .init();

    let args = Args::parse();
    info!("📚 paperdigest {} starting up...", env!("CARGO_PKG_VERSION"));

    let config_path = Config::resolve_path(args.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("reading config {}", config_path.display()))?;
    info!(
        backend = config.llm.backend.as_str(),
        categories = ?config.search.categories,
        "Configuration loaded"
    );

    let router = build_router(&config)?;
    let models = StageModels {
        filter: router.handle(Stage::Filter)?,
        institution: router.handle(Stage::Institution)?,
        note: router.handle(Stage::Note)?,
    };

    let institutions = load_institutions(&config)?;
    info!(institutions = institutions.len(), "Institution table ready");

    let sandbox = SandboxClient::new()?;
    let collaborators = Collaborators {
        search: Arc::new(ArxivSearch::new(sandbox.clone()).with_page_size(config.search.page_size)),
        downloader: Arc::new(HttpDownloader::new(sandbox)),
        extractor: Arc::new(LopdfExtractor::new()),
        renderer: Arc::new(PdftoppmRenderer::new(&config.render.pdftoppm)),
        institutions: Arc::new(institutions),
        models,
    };

    let pipeline_config = PipelineConfig {
        output_dir: args.output_dir.unwrap_or_else(|| config.pipeline.output_dir.clone()),
        categories: config.search.categories.clone(),
        max_results: config.search.max_results,
        max_concurrent: config.pipeline.max_concurrent,
        render: RenderSettings { dpi: config.render.dpi, format: config.render.format },
        finalize_with_pending: args.finalize_pending || config.pipeline.finalize_with_pending,
    };

    let date = args.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    let summary = DigestPipeline::new(pipeline_config, collaborators).run(date).await?;

    info!(
        run_id = %summary.run_id,
        run_dir = %summary.run_dir.display(),
        found = summary.found,
        relevant = summary.relevant,
        downloaded = summary.downloaded,
        download_failed = summary.download_failed,
        kept = summary.kept,
        removed = summary.removed,
        still_pending = summary.still_pending,
        notes = summary.notes,
        buckets = ?summary.buckets,
        images = summary.images_rendered,
        "Run summary"
    );
    if summary.completed {
        info!("✅ Digest for {} complete.", date);
    } else {
        warn!(
            "{} papers are still pending; re-run to retry them, or pass --finalize-pending to finish without them.",
            summary.still_pending
        );
    }
    Ok(())
}
