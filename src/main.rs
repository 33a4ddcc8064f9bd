//! CLI entry point for the gazette pipeline.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gazette_core::feed::read_records;
use gazette_core::{
    ContentStore, Database, DocumentRecord, FilesStore, GazetteCatalog, HttpClient, MetadataSink,
    Pipeline, PipelineConfig, PipelineRunner,
};
use tokio::io::{AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // stdout carries emitted items
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = load_config(&args)?;
    let source = Arc::new(config.source(&args.spider)?.clone());
    info!(spider = %args.spider, source_id = %source.source_id, "Gazette pipeline starting");

    let input: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input file '{}'", path.display()))?,
        ),
        None if std::io::stdin().is_terminal() => {
            info!("No input provided. Pipe JSON-lines records via stdin or pass --input.");
            return Ok(());
        }
        None => Box::new(tokio::io::stdin()),
    };

    let files = FilesStore::new(&config.files_store).with_expiry_days(config.files_expires_days);
    files.ensure_root().await?;

    let sink = match &config.database_url {
        Some(url) => {
            let db = Database::connect(url, config.database.options())
                .await
                .with_context(|| format!("Failed to open database '{url}'"))?;
            let catalog = GazetteCatalog::new(db);
            catalog
                .register_sources(&config.source_registrations())
                .await
                .context("Failed to register sources")?;
            MetadataSink::new(Arc::new(catalog))
        }
        None => {
            info!("No database configured, metadata persistence disabled");
            MetadataSink::disabled()
        }
    };
    let sink_stats = sink.stats();

    let client = HttpClient::try_new_with_timeouts(
        config.http.connect_timeout_secs,
        config.http.read_timeout_secs,
    )
    .context("Failed to build HTTP client")?;
    let pipeline = Arc::new(Pipeline::standard(ContentStore::new(files, client), sink));

    let mut runner = PipelineRunner::new(config.concurrency)?;
    let writer = if args.emit_items {
        let (tx, rx) = mpsc::unbounded_channel();
        runner = runner.with_output(tx);
        Some(tokio::spawn(write_items(rx)))
    } else {
        None
    };

    let stats = runner
        .run(read_records(BufReader::new(input)), pipeline, source)
        .await?;
    // Closes the output channel so the writer can finish
    drop(runner);
    if let Some(writer) = writer {
        writer.await.context("Item writer task failed")??;
    }

    let sink = sink_stats.report();
    info!(
        processed = stats.processed(),
        dropped = stats.dropped(),
        downloaded = stats.downloaded(),
        already_present = stats.already_present(),
        failed = stats.failed(),
        persisted = sink.persisted,
        discarded = sink.discarded,
        "Pipeline complete"
    );

    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(files_store) = &args.files_store {
        config.files_store.clone_from(files_store);
    }
    if let Some(database_url) = &args.database_url {
        config.database_url = Some(database_url.clone());
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = usize::from(concurrency);
    }
    config.validate()?;
    Ok(config)
}

async fn write_items(mut items: mpsc::UnboundedReceiver<DocumentRecord>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(item) = items.recv().await {
        let mut line = serde_json::to_vec(&item)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
    }
    stdout.flush().await?;
    Ok(())
}
