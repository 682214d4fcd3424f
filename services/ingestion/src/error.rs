//! Error types for the ingestion pipeline
//!
//! Row-level violations are data (see `IngestionAnomaly`), not errors.
//! Everything here aborts the whole call with no partial result.

use thiserror::Error;

/// The upload could not be read as a spreadsheet at all
#[derive(Error, Debug)]
pub enum ParseError {
    /// Unrecognized or corrupt workbook container
    #[error("Failed to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Workbook has no sheets")]
    NoSheets,

    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// The downstream report store did not accept a batch
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The sink answered but refused the batch
    #[error("Batch rejected: {0}")]
    Rejected(String),
}

/// Fatal ingestion failure
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Backend sync failed")]
    BackendSync(#[source] SinkError),

    #[error("Ingestion log error: {0}")]
    Journal(#[from] sqlx::Error),
}

impl IngestError {
    /// True when the upload itself is at fault (bad type or unreadable bytes)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IngestError::UnsupportedFileType(_) | IngestError::Parse(_)
        )
    }
}
