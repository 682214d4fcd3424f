//! Downstream weekly-report store
//!
//! The store upserts on `(departmentCode, weekNo)`: publishing the same
//! batch twice leaves it in the same state as publishing it once.

use crate::error::SinkError;
use crate::normalizer::RiskLevel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Write shape sent to the report store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReportUpsert {
    pub department_code: String,
    pub week_no: i32,
    pub avg_attendance: f64,
    pub avg_test_pass: f64,
    pub units_covered: i32,
    pub total_units: i32,
    pub risk_level: RiskLevel,
}

/// A store that accepts a whole batch or none of it
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError>;
}

#[async_trait]
impl<T: ReportSink + ?Sized> ReportSink for Arc<T> {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        (**self).publish(reports).await
    }
}

// =============================================================================
// HTTP sink - reporting backend bulk endpoint
// =============================================================================

pub const WEEKLY_REPORTS_PATH: &str = "/departments/weekly-reports";

/// Posts batches to the reporting backend. No retries.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(base_url: &str) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent(concat!("weekly-ingestion/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), WEEKLY_REPORTS_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportSink for HttpSink {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        info!(endpoint = %self.endpoint, reports = reports.len(), "Publishing weekly reports");

        let resp = self.client.post(&self.endpoint).json(reports).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SinkError::Rejected(format!("{} {}", status, body.trim())));
        }

        Ok(())
    }
}

// =============================================================================
// Postgres sink - weekly_reports table
// =============================================================================

const UPSERT_WEEKLY_REPORT: &str = r#"
    INSERT INTO weekly_reports
        (department_code, week_no, avg_attendance, avg_test_pass, units_covered, total_units, risk_level)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    ON CONFLICT (department_code, week_no) DO UPDATE
    SET avg_attendance = EXCLUDED.avg_attendance,
        avg_test_pass = EXCLUDED.avg_test_pass,
        units_covered = EXCLUDED.units_covered,
        total_units = EXCLUDED.total_units,
        risk_level = EXCLUDED.risk_level,
        updated_at = now()
"#;

/// Upsert a batch in one transaction; any failure rolls the batch back.
pub async fn upsert_weekly_reports(
    pool: &PgPool,
    reports: &[WeeklyReportUpsert],
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;

    for report in reports {
        sqlx::query(UPSERT_WEEKLY_REPORT)
            .bind(&report.department_code)
            .bind(report.week_no)
            .bind(report.avg_attendance)
            .bind(report.avg_test_pass)
            .bind(report.units_covered as f64)
            .bind(report.total_units as f64)
            .bind(report.risk_level.as_str())
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(reports.len())
}

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportSink for PgSink {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        let count = upsert_weekly_reports(&self.pool, reports).await?;
        info!(reports = count, "Upserted weekly reports");
        Ok(())
    }
}

/// Accepts and discards every batch (dry runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunSink;

#[async_trait]
impl ReportSink for DryRunSink {
    async fn publish(&self, reports: &[WeeklyReportUpsert]) -> Result<(), SinkError> {
        info!(reports = reports.len(), "Dry run - weekly reports not published");
        Ok(())
    }
}
