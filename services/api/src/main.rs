use anyhow::Context;
use api::{build_router, AppState};
use ingestion::{connect_and_migrate, sink_from_config, Config, IngestOptions, IngestionService, PgJournal};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;

    info!("Connecting to database...");
    let pool = connect_and_migrate(config.require_db_url()?, config.db_max_connections).await?;
    info!("Database connected");

    let sink = sink_from_config(&config, &pool).context("Failed to build report sink")?;
    let options = IngestOptions {
        derive_syllabus_pace: config.derive_syllabus_pace,
    };

    let state = Arc::new(AppState {
        journal: Arc::new(PgJournal::new(pool.clone())),
        service: IngestionService::with_options(sink, options),
        pool,
    });

    let app = build_router(state);

    info!(bind = %config.api_bind, sink = ?config.sink_kind, "API listening");
    info!("Endpoints:");
    info!("  GET  /health");
    info!("  POST /ingest (multipart field 'file')");
    info!("  POST /departments/weekly-reports");
    info!("  GET  /weekly-reports?week_no=&department_code=&limit=");
    info!("  GET  /ingestion-logs?limit=");

    let listener = tokio::net::TcpListener::bind(&config.api_bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.api_bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}
