//! Embedding model comparison CLI
//!
//! ## Quick Start
//!
//! ```bash
//! # Benchmark the built-in hash models on a dataset
//! ./embed-compare run \
//!     --dataset ./dataset.json \
//!     --models hash/fnv-384,hash/fnv-768
//!
//! # Use a custom model catalog
//! ./embed-compare run \
//!     --dataset ./dataset.json \
//!     --models-config ./models.toml \
//!     --models openai/text-embedding-3-small
//!
//! # List configured models with availability status
//! ./embed-compare models
//! ```
//!
//! Datasets are JSON files with a document corpus and judged queries; model
//! catalogs are TOML (see `ModelCatalog` defaults for the format).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use embed_compare::benchmark::{BenchmarkRunner, RunOptions, RunStatus, SimilarityMetric};
use embed_compare::config::ModelCatalog;
use embed_compare::dataset::Dataset;
use embed_compare::embedders::EmbedderRegistry;
use embed_compare::report::{BenchmarkReport, ReportFormat};

#[derive(Parser)]
#[command(name = "embed-compare")]
#[command(about = "Benchmark embedding models for retrieval quality, latency, and cost")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a benchmark over a dataset
    ///
    /// All selected models are benchmarked sequentially against the same
    /// corpus and queries. Results are exported to a report file.
    Run {
        /// Path to the dataset JSON file
        #[arg(short, long)]
        dataset: PathBuf,

        /// Model ids to benchmark (comma-separated catalog keys)
        #[arg(short, long, value_delimiter = ',')]
        models: Vec<String>,

        /// Path to the model catalog file (TOML)
        #[arg(long, default_value = "models.toml")]
        models_config: PathBuf,

        /// Cutoffs for rank metrics (comma-separated)
        #[arg(long, value_delimiter = ',', default_values_t = [1usize, 3, 5, 10, 20])]
        top_k: Vec<usize>,

        /// Similarity metric: cosine, dot_product, or euclidean
        #[arg(long, default_value = "cosine")]
        metric: String,

        /// Skip L2 normalization of stored embeddings
        #[arg(long)]
        no_normalize: bool,

        /// Output file for the report
        #[arg(short, long, default_value = "results/benchmark_report.json")]
        output: PathBuf,

        /// Report format: json or markdown
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// List configured models with availability status
    Models {
        /// Path to the model catalog file (TOML)
        #[arg(long, default_value = "models.toml")]
        models_config: PathBuf,
    },

    /// Validate a dataset file
    Validate {
        /// Path to the dataset JSON file
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            dataset,
            models,
            models_config,
            top_k,
            metric,
            no_normalize,
            output,
            format,
        } => {
            run_benchmark(
                &dataset,
                models,
                &models_config,
                top_k,
                &metric,
                !no_normalize,
                &output,
                &format,
            )
            .await?;
        }

        Commands::Models { models_config } => {
            list_models(&models_config).await?;
        }

        Commands::Validate { dataset } => {
            validate_dataset(&dataset)?;
        }
    }

    Ok(())
}

fn load_catalog(path: &Path) -> Result<ModelCatalog> {
    if path.exists() {
        println!("Loading model catalog from {:?}...", path);
        Ok(ModelCatalog::load(path)?)
    } else {
        println!("Using built-in model catalog...");
        Ok(ModelCatalog::default())
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_benchmark(
    dataset_path: &Path,
    models: Vec<String>,
    models_config_path: &Path,
    top_k: Vec<usize>,
    metric: &str,
    normalize: bool,
    output: &Path,
    format: &str,
) -> Result<()> {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              EMBEDDING MODEL COMPARISON                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    if models.is_empty() {
        anyhow::bail!("No models selected. Pass --models with catalog keys");
    }

    let similarity_metric = SimilarityMetric::parse(metric)
        .with_context(|| format!("unknown similarity metric '{}'", metric))?;
    let report_format = ReportFormat::parse(format)
        .with_context(|| format!("unknown report format '{}'", format))?;

    let catalog = load_catalog(models_config_path)?;
    println!("  {} models configured", catalog.len());

    println!("\nLoading dataset from {:?}...", dataset_path);
    let dataset = Dataset::load(dataset_path)?;
    println!(
        "  '{}': {} documents, {} queries",
        dataset.name,
        dataset.documents.len(),
        dataset.queries.len()
    );

    let runner = BenchmarkRunner::new(Arc::new(EmbedderRegistry::new(catalog)));
    let run_id = runner.submit(
        &dataset,
        RunOptions {
            model_ids: models,
            top_k_values: top_k,
            similarity_metric,
            normalize_embeddings: normalize,
        },
    )?;
    println!("\nSubmitted run {}\n", run_id);

    // Progress goes to stderr so a piped report stays clean; Ctrl-C cancels
    // the run cooperatively instead of killing the process mid-model.
    let final_progress = loop {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCancelling run {}...", run_id);
                runner.cancel(&run_id);
            }
        }

        let Some(progress) = runner.progress(&run_id) else {
            anyhow::bail!("run {} disappeared from the registry", run_id);
        };
        if progress.status.is_terminal() {
            break progress;
        }

        let model = progress.current_model.as_deref().unwrap_or("-");
        let eta = progress
            .eta_seconds
            .map(|e| format!("{:.0}s", e))
            .unwrap_or_else(|| "?".to_string());
        eprintln!(
            "  [{}/{}] {} | docs {}/{} | queries {}/{} | eta {}",
            progress.models_completed,
            progress.total_models,
            model,
            progress.documents_embedded,
            progress.total_documents,
            progress.queries_processed,
            progress.total_queries,
            eta
        );
    };

    match final_progress.status {
        RunStatus::Completed => {}
        RunStatus::Cancelled => {
            println!(
                "Run cancelled after {} of {} models.",
                final_progress.models_completed, final_progress.total_models
            );
            return Ok(());
        }
        RunStatus::Failed => {
            anyhow::bail!(
                "run failed: {}",
                final_progress.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }
        RunStatus::Running => unreachable!("loop exits only on terminal status"),
    }

    let results = runner
        .results(&run_id)
        .with_context(|| format!("no results for run {}", run_id))?;

    println!("Benchmark completed in {:.1}s\n", results.elapsed_seconds);
    println!(
        "{:<30} {:>8} {:>8} {:>12} {:>12}",
        "Model", "MRR", "MAP", "Embed avg", "Query avg"
    );
    for model in &results.model_results {
        println!(
            "{:<30} {:>8.4} {:>8.4} {:>10}ms {:>10}ms",
            model.model_id,
            model.ir_metrics.mrr,
            model.ir_metrics.map_score,
            model.performance.embedding_latency_avg_ms,
            model.performance.query_latency_avg_ms
        );
    }

    let report = BenchmarkReport::from_results(&results)?;
    let rendered = report.render(report_format)?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
    }
    std::fs::write(output, rendered)
        .with_context(|| format!("failed to write report to {:?}", output))?;
    println!("\nReport saved to {:?}", output);

    Ok(())
}

async fn list_models(models_config_path: &Path) -> Result<()> {
    let catalog = load_catalog(models_config_path)?;
    let registry = EmbedderRegistry::new(catalog);

    println!("\n{:<34} {:>6} {:>12} {:>12}", "Model", "Dim", "Cost/1k tok", "Status");
    let model_ids: Vec<String> = registry.catalog().iter().map(|(id, _)| id.clone()).collect();
    for model_id in model_ids {
        let status = registry.validate_model(&model_id).await;
        let entry = match registry.catalog().get(&model_id) {
            Some(entry) => entry,
            None => continue,
        };
        println!(
            "{:<34} {:>6} {:>12} {:>12}",
            model_id,
            entry.dimension,
            format!("${}", entry.cost_per_1k_tokens),
            format!("{:?}", status).to_lowercase()
        );
    }

    Ok(())
}

fn validate_dataset(dataset_path: &Path) -> Result<()> {
    println!("Validating dataset {:?}...", dataset_path);
    let dataset = Dataset::load(dataset_path)?;
    dataset.validate()?;

    println!("  Dataset '{}' is valid", dataset.name);
    println!("  Documents: {}", dataset.documents.len());
    println!("  Queries:   {}", dataset.queries.len());
    println!("  Avg doc length: {:.0} chars", dataset.avg_doc_length());

    Ok(())
}
