//! Ingestion log: one row per upload, opened before parsing and closed
//! with the outcome.

use crate::record::{IngestionResult, Severity};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionStatus {
    Processing,
    Completed,
    PartialSuccess,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Processing => "PROCESSING",
            IngestionStatus::Completed => "COMPLETED",
            IngestionStatus::PartialSuccess => "PARTIAL_SUCCESS",
            IngestionStatus::Failed => "FAILED",
        }
    }

    /// Final status of a call that ran to completion
    pub fn from_counts(success: usize, fails: usize) -> Self {
        match (success, fails) {
            (_, 0) => IngestionStatus::Completed,
            (0, _) => IngestionStatus::Failed,
            _ => IngestionStatus::PartialSuccess,
        }
    }
}

/// How an ingestion call ended
#[derive(Debug)]
pub enum JournalOutcome<'a> {
    Finished(&'a IngestionResult),
    /// Fatal error, with its message
    Aborted(&'a str),
}

impl JournalOutcome<'_> {
    pub fn status(&self) -> IngestionStatus {
        match self {
            JournalOutcome::Finished(result) => {
                IngestionStatus::from_counts(result.success, result.fails)
            }
            JournalOutcome::Aborted(_) => IngestionStatus::Failed,
        }
    }

    /// Anomaly list as stored in the log
    pub fn anomalies_json(&self) -> serde_json::Value {
        match self {
            JournalOutcome::Finished(result) => {
                serde_json::to_value(&result.anomalies).unwrap_or_else(|_| serde_json::json!([]))
            }
            JournalOutcome::Aborted(message) => serde_json::json!([{
                "issue": message,
                "severity": Severity::Critical,
            }]),
        }
    }
}

/// Content hash recorded with every upload
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

#[async_trait]
pub trait IngestionJournal: Send + Sync {
    /// Open a PROCESSING entry and return its id
    async fn open(&self, file_name: &str, content_hash: &str) -> Result<Uuid, sqlx::Error>;

    async fn finish(&self, log_id: Uuid, outcome: &JournalOutcome<'_>) -> Result<(), sqlx::Error>;
}

/// Journal backed by the `ingestion_logs` table
pub struct PgJournal {
    pool: PgPool,
}

impl PgJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IngestionJournal for PgJournal {
    async fn open(&self, file_name: &str, content_hash: &str) -> Result<Uuid, sqlx::Error> {
        let log_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO ingestion_logs (log_id, file_name, content_hash, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(log_id)
        .bind(file_name)
        .bind(content_hash)
        .bind(IngestionStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(log_id)
    }

    async fn finish(&self, log_id: Uuid, outcome: &JournalOutcome<'_>) -> Result<(), sqlx::Error> {
        let (processed, success, fails, error) = match outcome {
            JournalOutcome::Finished(result) => {
                (result.processed_rows(), result.success, result.fails, None)
            }
            JournalOutcome::Aborted(message) => (0, 0, 0, Some(*message)),
        };

        sqlx::query(
            r#"
            UPDATE ingestion_logs
            SET finished_at = now(), status = $2, processed_rows = $3,
                success_count = $4, error_count = $5, anomalies = $6, error = $7
            WHERE log_id = $1
            "#,
        )
        .bind(log_id)
        .bind(outcome.status().as_str())
        .bind(processed as i32)
        .bind(success as i32)
        .bind(fails as i32)
        .bind(outcome.anomalies_json())
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Journal that records nothing (dry runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJournal;

#[async_trait]
impl IngestionJournal for NoopJournal {
    async fn open(&self, _file_name: &str, _content_hash: &str) -> Result<Uuid, sqlx::Error> {
        Ok(Uuid::new_v4())
    }

    async fn finish(&self, _log_id: Uuid, _outcome: &JournalOutcome<'_>) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

/// Stored log row, as listed by the API
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct IngestionLogRow {
    pub log_id: Uuid,
    pub file_name: String,
    pub content_hash: String,
    pub status: String,
    pub processed_rows: i32,
    pub success_count: i32,
    pub error_count: i32,
    pub anomalies: serde_json::Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

pub async fn recent_logs(pool: &PgPool, limit: i64) -> Result<Vec<IngestionLogRow>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT log_id, file_name, content_hash, status, processed_rows, success_count,
               error_count, anomalies, error, started_at, finished_at
        FROM ingestion_logs
        ORDER BY started_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
