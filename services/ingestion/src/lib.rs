//! Weekly ingestion pipeline - spreadsheet uploads into weekly reports
//!
//! Responsibilities:
//! - Parse XLSX/XLS/CSV uploads into unified records
//! - Normalize branch codes and percent fields
//! - Validate row-level invariants, collecting anomalies
//! - Upsert valid rows into the report store keyed on (department, week)
//! - Keep an ingestion log per upload
//!
//! Same file in = same records out: re-ingesting an upload overwrites the
//! rows it wrote the first time.

pub mod config;
pub mod error;
pub mod factory;
pub mod journal;
pub mod normalizer;
pub mod parser;
pub mod record;
pub mod service;
pub mod sink;
pub mod validator;

pub use config::{Config, SinkKind};
pub use error::{IngestError, ParseError, SinkError};
pub use journal::{IngestionJournal, IngestionStatus, JournalOutcome, NoopJournal, PgJournal};
pub use normalizer::{RiskLevel, SyllabusPace};
pub use record::{IngestionAnomaly, IngestionResult, RawRow, RawValue, Severity, UnifiedIngestionRecord};
pub use service::{IngestOptions, IngestionService};
pub use sink::{DryRunSink, HttpSink, PgSink, ReportSink, WeeklyReportUpsert};

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

/// Connect to the report database and bring its schema up to date.
pub async fn connect_and_migrate(db_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    use anyhow::Context;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    Ok(pool)
}

/// Sink selected by `SINK_KIND`.
pub fn sink_from_config(config: &Config, pool: &PgPool) -> Result<Arc<dyn ReportSink>, SinkError> {
    let sink: Arc<dyn ReportSink> = match config.sink_kind {
        SinkKind::Postgres => Arc::new(PgSink::new(pool.clone())),
        SinkKind::Http => Arc::new(HttpSink::new(&config.sink_url)?),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    const SCHEMA: &str = include_str!("../migrations/0001_weekly_reports.sql");

    #[test]
    fn test_weekly_report_columns_are_not_null() {
        // The API decodes these columns as plain values
        for column in [
            "department_code TEXT",
            "week_no INTEGER",
            "avg_attendance DOUBLE PRECISION",
            "avg_test_pass DOUBLE PRECISION",
            "units_covered DOUBLE PRECISION",
            "total_units DOUBLE PRECISION",
            "risk_level TEXT",
        ] {
            let line = SCHEMA
                .lines()
                .find(|l| l.trim_start().starts_with(column))
                .unwrap_or_else(|| panic!("column {} missing", column));
            assert!(line.contains("NOT NULL"), "{} is nullable", column);
        }
    }
}
