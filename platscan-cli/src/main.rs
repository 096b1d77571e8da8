use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

// Import from platscan-core
use platscan_core::{
    DocumentOrchestrator, DocumentOutcome, EventLog, PipelineConfig, TesseractEngine, TracingLog,
    WriterConfig,
};

// Import CLI utilities
use platscan_cli::{default_config_path, discover_files, RunSummary};

#[derive(Parser)]
#[command(name = "platscan")]
#[command(about = "OCR scanned plat PDFs and page images and store the recognized text")]
struct Args {
    /// File or directory to process (repeatable; directories are listed flat)
    #[arg(short, long, default_value = "plats")]
    input: Vec<PathBuf>,

    /// Path to custom config file (YAML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also write each document's text to <DIR>/<stem>_ocr.txt
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Drop every mongo writer from the config
    #[arg(long)]
    no_mongo: bool,

    /// Documents processed concurrently (overrides pipeline.workers)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-document timeout in seconds, 0 disables (overrides pipeline.document_timeout_secs)
    #[arg(long)]
    timeout: Option<u64>,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Write a JSON run summary with per-file outcomes
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Print the effective config as YAML and exit
    #[arg(long)]
    show_config: bool,
}

fn main() -> Result<()> {
    // MONGODB_USERNAME / MONGODB_PASSWORD may live in .env
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.log_file.as_deref())?;

    let config = load_config(&args)?;

    if args.show_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    println!("🦀 Platscan Document OCR");

    let engine = TesseractEngine::with_config(config.ocr.clone());
    if !engine.is_available() {
        println!(
            "⚠️  {} not found on PATH; every image will fail recognition",
            config.ocr.binary
        );
    }

    let log: Arc<dyn EventLog> = Arc::new(TracingLog);
    let orchestrator =
        DocumentOrchestrator::from_config(&config, log).context("Unusable writer configuration")?;
    if orchestrator.writers().is_empty() {
        println!("⚠️  No writers configured; records will be processed but not stored");
    }
    for writer in orchestrator.writers() {
        println!("💾 Writer: {}", writer.describe());
    }

    let files = discover_files(&args.input)?;
    println!(
        "📄 Processing {} file(s) with {} worker(s)",
        files.len(),
        orchestrator.options().workers
    );

    let started_at = Utc::now();
    let report = orchestrator.process_batch(&files);

    for document in &report.documents {
        println!("   {} → {}", document.path, describe_outcome(&document.outcome));
    }

    let summary = RunSummary::new(started_at, report);
    summary.print();

    if let Some(path) = &args.summary {
        summary.save(path)?;
        println!("💾 Summary saved to: {}", path.display());
    }

    // Per-file failures are in the summary; the run itself succeeded
    Ok(())
}

/// Config file (explicit or from the user config dir) plus CLI overrides
fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let config = PipelineConfig::load_from_file(path)?;
            tracing::info!("Loaded config from: {}", path.display());
            config
        }
        None => match default_config_path() {
            Some(path) => PipelineConfig::load_with_fallback(Some(&path)),
            None => {
                tracing::info!("Using default config");
                PipelineConfig::default()
            }
        },
    };

    // Apply CLI overrides to config
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.pipeline.document_timeout_secs = Some(timeout);
    }
    if args.no_mongo {
        config
            .writers
            .retain(|w| !matches!(w, WriterConfig::Mongo { .. }));
    }
    if let Some(dir) = &args.output_dir {
        let uri = dir.join("{stem}_ocr.txt");
        config
            .writers
            .push(WriterConfig::file(uri.to_string_lossy(), true));
    }

    Ok(config)
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    Ok(())
}

fn describe_outcome(outcome: &DocumentOutcome) -> String {
    match outcome {
        DocumentOutcome::Persisted { succeeded, failed: 0 } => {
            format!("✅ stored by {succeeded} writer(s)")
        }
        DocumentOutcome::Persisted { succeeded, failed } => {
            format!("⚠️  stored by {succeeded} writer(s), {failed} failed")
        }
        DocumentOutcome::Dropped => "∅ nothing extracted".to_string(),
        DocumentOutcome::Skipped { extension } => format!("⏭️  skipped ({extension})"),
        DocumentOutcome::Failed { kind, message } => format!("❌ {kind}: {message}"),
    }
}
