//! Ingestion orchestration: parse -> validate -> transform -> publish
//!
//! Row-level problems become anomalies and never stop the batch. Fatal
//! problems (unsupported type, unreadable bytes, sink failure) abort the
//! call with no partial result.

use crate::error::IngestError;
use crate::factory;
use crate::journal::{content_hash, IngestionJournal, JournalOutcome};
use crate::normalizer::{risk_level, syllabus_pace, SyllabusPace};
use crate::record::{IngestionAnomaly, IngestionResult, Severity, UnifiedIngestionRecord};
use crate::sink::{ReportSink, WeeklyReportUpsert};
use crate::validator::validate;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Feed the syllabus pace into the risk score instead of assuming
    /// On-Track.
    pub derive_syllabus_pace: bool,
}

pub struct IngestionService<S> {
    sink: S,
    options: IngestOptions,
}

impl<S: ReportSink> IngestionService<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, IngestOptions::default())
    }

    pub fn with_options(sink: S, options: IngestOptions) -> Self {
        Self { sink, options }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn process_file(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<IngestionResult, IngestError> {
        let parser = factory::parser_for(mime_type, file_name)?;
        let records = parser.parse(bytes)?;
        info!(file = file_name, records = records.len(), "Parsed upload");

        let mut reports = Vec::new();
        let mut anomalies = Vec::new();

        for (idx, record) in records.into_iter().enumerate() {
            let errors = validate(&record);
            if !errors.is_empty() {
                let issue = errors.join(", ");
                warn!(row = idx + 1, branch = %record.branch_code, issue = %issue, "Rejected record");
                anomalies.push(IngestionAnomaly {
                    row_index: idx + 1,
                    issue,
                    value: record,
                    severity: Severity::Critical,
                });
                continue;
            }

            reports.push(to_upsert(&record, self.options));
        }

        if !reports.is_empty() {
            if let Err(e) = self.sink.publish(&reports).await {
                error!(file = file_name, reports = reports.len(), error = %e, "Publishing weekly reports failed");
                return Err(IngestError::BackendSync(e));
            }
        }

        info!(
            file = file_name,
            success = reports.len(),
            fails = anomalies.len(),
            "Ingestion finished"
        );

        Ok(IngestionResult {
            success: reports.len(),
            fails: anomalies.len(),
            anomalies,
        })
    }

    /// `process_file` bracketed by an ingestion log entry.
    ///
    /// Fatal errors are recorded and returned unchanged; a failure to close
    /// the log after a fatal error is only logged.
    pub async fn process_file_logged<J>(
        &self,
        journal: &J,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
    ) -> Result<IngestionResult, IngestError>
    where
        J: IngestionJournal + ?Sized,
    {
        let log_id = journal.open(file_name, &content_hash(bytes)).await?;

        match self.process_file(bytes, file_name, mime_type).await {
            Ok(result) => {
                journal.finish(log_id, &JournalOutcome::Finished(&result)).await?;
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                if let Err(journal_err) = journal.finish(log_id, &JournalOutcome::Aborted(&message)).await {
                    error!(%log_id, error = %journal_err, "Failed to close ingestion log");
                }
                Err(e)
            }
        }
    }
}

/// Reshape a valid record for the report store and score its risk.
pub fn to_upsert(record: &UnifiedIngestionRecord, options: IngestOptions) -> WeeklyReportUpsert {
    let pace = if options.derive_syllabus_pace {
        syllabus_pace(record.syllabus_covered, record.syllabus_total)
    } else {
        SyllabusPace::OnTrack
    };

    WeeklyReportUpsert {
        department_code: record.branch_code.clone(),
        week_no: record.week_no,
        avg_attendance: record.avg_attendance_percent,
        avg_test_pass: record.avg_test_pass_percent,
        units_covered: record.syllabus_covered,
        total_units: record.syllabus_total,
        risk_level: risk_level(record.avg_attendance_percent, record.avg_test_pass_percent, pace),
    }
}
