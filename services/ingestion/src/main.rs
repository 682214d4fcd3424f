//! Ingest CLI - Loads one weekly report spreadsheet from disk
//!
//! Usage:
//!   # Validate and print the summary, touching nothing:
//!   cargo run --bin ingest -- --file reports/week1.xlsx --dry-run
//!
//!   # Ingest into the store configured by SINK_KIND / DB_URL / SINK_URL:
//!   cargo run --bin ingest -- --file reports/week1.csv

use anyhow::{Context, Result};
use clap::Parser;
use ingestion::factory::mime_for_file_name;
use ingestion::{
    connect_and_migrate, sink_from_config, Config, DryRunSink, IngestOptions, IngestionService,
    NoopJournal, PgJournal,
};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Ingests a weekly report spreadsheet into the reporting store")]
struct Args {
    /// Spreadsheet to ingest (.xlsx, .xls or .csv)
    #[arg(long)]
    file: PathBuf,

    /// MIME type to declare (defaults to one guessed from the extension)
    #[arg(long)]
    mime: Option<String>,

    /// Dry run - validate only, publish nothing and write no log
    #[arg(long, default_value = "false")]
    dry_run: bool,

    /// Score risk with the syllabus pace instead of assuming On-Track
    #[arg(long, default_value = "false")]
    derive_syllabus_pace: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("File path has no file name")?;
    let mime_type = args
        .mime
        .clone()
        .unwrap_or_else(|| mime_for_file_name(&file_name).to_string());

    let bytes = fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let options = IngestOptions {
        derive_syllabus_pace: args.derive_syllabus_pace || config.derive_syllabus_pace,
    };

    info!(
        file = %args.file.display(),
        mime = %mime_type,
        bytes = bytes.len(),
        mode = if args.dry_run { "dry-run" } else { "live" },
        "Starting ingestion"
    );

    let result = if args.dry_run {
        let service = IngestionService::with_options(DryRunSink, options);
        service
            .process_file_logged(&NoopJournal, &bytes, &file_name, &mime_type)
            .await?
    } else {
        let pool = connect_and_migrate(config.require_db_url()?, config.db_max_connections).await?;

        let sink = sink_from_config(&config, &pool)?;
        let journal = PgJournal::new(pool);

        let service = IngestionService::with_options(sink, options);
        service
            .process_file_logged(&journal, &bytes, &file_name, &mime_type)
            .await?
    };

    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
