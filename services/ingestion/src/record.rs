//! Format-independent row types shared by every parser and the pipeline.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A single non-empty cell as read from the source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Text(s) => f.write_str(s),
            RawValue::Number(n) => write!(f, "{}", n),
            RawValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

/// Header -> cell map for one source row. Empty cells are absent.
///
/// BTreeMap keeps `raw_data` serialization deterministic.
pub type RawRow = BTreeMap<String, RawValue>;

/// Canonical intermediate record produced by every parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnifiedIngestionRecord {
    pub branch_code: String,
    pub week_no: i32,
    pub sessions: i32,
    pub avg_attendance_percent: f64,
    pub avg_test_attendance_percent: f64,
    pub avg_test_pass_percent: f64,
    pub syllabus_covered: i32,
    pub syllabus_total: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<RawRow>,
}

/// Every rejected record is critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
}

/// A rejected record with the violations that rejected it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionAnomaly {
    /// 1-based position among the parsed records
    pub row_index: usize,
    pub issue: String,
    pub value: UnifiedIngestionRecord,
    pub severity: Severity,
}

/// Summary returned by one ingestion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestionResult {
    pub success: usize,
    pub fails: usize,
    pub anomalies: Vec<IngestionAnomaly>,
}

impl IngestionResult {
    /// Number of records the parser produced (skipped rows excluded)
    pub fn processed_rows(&self) -> usize {
        self.success + self.fails
    }
}
