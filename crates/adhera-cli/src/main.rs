use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use adhera_core::{ColumnTarget, Document, EngineConfig, Table};
use adhera_engine::{BatchOrchestrator, DecisionEngine, VerdictCache};
use adhera_knowledge::{chunk, ChunkConfig, KnowledgeBase};
use adhera_providers::{load_documents, OpenAiConfig, OpenAiEmbedder, OpenAiReasoner};

#[derive(Parser)]
#[command(name = "adhera", version, about = "Guideline-grounded adherence classification")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify target cells of a table against a guideline corpus.
    Run {
        /// Directory of guideline .txt files.
        guidelines: PathBuf,

        /// Input table as JSON ({"columns": [...], "rows": [[...], ...]}).
        input: PathBuf,

        /// Where the labelled table is written.
        #[arg(long)]
        output: PathBuf,

        /// Target column and its guideline role, as column=role. Repeatable.
        #[arg(long = "target", value_parser = parse_target, required = true)]
        targets: Vec<ColumnTarget>,

        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Override the OpenAI-compatible API base URL.
        #[arg(long)]
        base_url: Option<String>,

        /// Verdict cache file; re-runs with the same cache cost nothing for
        /// already-settled cells.
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Engine configuration as JSON; missing fields use defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long)]
        retrieval_k: Option<usize>,
    },

    /// Show how a guideline file would be split into passages.
    Chunks {
        file: PathBuf,

        #[arg(long, default_value_t = 1000)]
        size: usize,

        #[arg(long, default_value_t = 0.1)]
        overlap: f32,
    },
}

fn parse_target(raw: &str) -> Result<ColumnTarget, String> {
    match raw.split_once('=') {
        Some((column, role)) if !column.is_empty() && !role.is_empty() => {
            Ok(ColumnTarget::new(column, role))
        }
        _ => Err(format!("expected column=role, got '{raw}'")),
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command {
        Command::Run {
            guidelines,
            input,
            output,
            targets,
            api_key,
            base_url,
            cache,
            config,
            concurrency,
            retrieval_k,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(retrieval_k) = retrieval_k {
                config.retrieval_k = retrieval_k;
            }
            config.validate()?;

            let raw = std::fs::read_to_string(&input)
                .with_context(|| format!("reading table {}", input.display()))?;
            let mut table: Table = serde_json::from_str(&raw)
                .with_context(|| format!("parsing table {}", input.display()))?;

            let documents = load_documents(&guidelines).await?;
            if documents.is_empty() {
                bail!("no .txt guideline files in {}", guidelines.display());
            }

            let mut provider_cfg = OpenAiConfig::new(api_key).with_timeout(config.call_timeout());
            if let Some(base_url) = base_url {
                provider_cfg = provider_cfg.with_base_url(base_url);
            }
            let embedder = Arc::new(OpenAiEmbedder::new(&provider_cfg)?);
            let reasoner = Arc::new(OpenAiReasoner::new(&provider_cfg)?);

            let mut kb = KnowledgeBase::new(embedder, &config);
            kb.ingest(&documents).await?;

            let engine = DecisionEngine::new(Arc::new(kb), reasoner, &config);
            let verdicts = match &cache {
                Some(path) => VerdictCache::with_persistence(path)?,
                None => VerdictCache::new(),
            }
            .with_model(provider_cfg.chat_model.clone());
            let orchestrator = BatchOrchestrator::new(engine, verdicts, &config);

            let handle = orchestrator.cancel_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, draining in-flight cells");
                    handle.cancel();
                }
            });

            let report = orchestrator.run(&mut table, &targets).await?;

            let json = serde_json::to_string_pretty(&table)?;
            std::fs::write(&output, json)
                .with_context(|| format!("writing table {}", output.display()))?;
            info!(output = %output.display(), "labelled table written");

            println!(
                "{} cells: {} yes, {} no, {} skipped, {} failed ({} from cache)",
                report.total,
                report.labelled_yes,
                report.labelled_no,
                report.skipped,
                report.failed.len(),
                report.cache_hits,
            );
            for cell in &report.failed {
                println!("  failed: {cell}");
            }
            if report.cancelled {
                bail!("batch cancelled before completion");
            }
            if !report.failed.is_empty() {
                bail!("{} cells failed", report.failed.len());
            }
        }

        Command::Chunks {
            file,
            size,
            overlap,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let source = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            let document = Document::new(source, text);

            for (n, piece) in chunk(&document, ChunkConfig::new(size, overlap))?.enumerate() {
                println!(
                    "-- chunk {n} @ {} ({} chars)",
                    piece.start,
                    piece.text.chars().count()
                );
                println!("{}", piece.text);
            }
        }
    }

    Ok(())
}
