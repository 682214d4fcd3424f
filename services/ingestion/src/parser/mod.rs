//! Parsers turning raw upload bytes into unified records
//!
//! Every format first produces `RawRow`s, then goes through `map_row`,
//! so header resolution and coercion live in exactly one place.

mod delimited;
mod workbook;

pub use delimited::CsvParser;
pub use workbook::{records_from_range, ExcelParser};

use crate::error::ParseError;
use crate::normalizer::{normalize_branch_code, normalize_percent, parse_count};
use crate::record::{RawRow, RawValue, UnifiedIngestionRecord};

/// Parse raw file bytes into unified records.
///
/// Rows without a branch or week are dropped, so the output may be
/// shorter than the source sheet.
pub trait RecordParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<UnifiedIngestionRecord>, ParseError>;
}

/// Header candidates per field, consulted in order (case-sensitive)
pub const BRANCH_HEADERS: &[&str] = &["Branch", "branch", "Department"];
pub const WEEK_HEADERS: &[&str] = &["Week", "week", "Week No"];
pub const SESSIONS_HEADERS: &[&str] = &["Sessions", "No of Sessions"];
pub const ATTENDANCE_HEADERS: &[&str] = &["Avg Attendance", "Attendance %"];
pub const TEST_ATTENDANCE_HEADERS: &[&str] = &["Test Attendance", "Avg Test Attd"];
pub const PASS_HEADERS: &[&str] = &["Pass %", "Avg Pass %"];
pub const COVERED_HEADERS: &[&str] = &["Covered Topics", "Syllabus Covered"];
pub const TOTAL_HEADERS: &[&str] = &["Total Topics", "Total Syllabus"];

/// First candidate header present in the row wins, whatever its value.
fn first_present<'a>(row: &'a RawRow, candidates: &[&str]) -> Option<&'a RawValue> {
    candidates.iter().find_map(|key| row.get(*key))
}

/// Map one raw row to a unified record, or `None` when it has no branch
/// or no week cell.
pub fn map_row(row: RawRow) -> Option<UnifiedIngestionRecord> {
    let branch = first_present(&row, BRANCH_HEADERS)?.to_string();
    let week_no = parse_count(Some(first_present(&row, WEEK_HEADERS)?));

    Some(UnifiedIngestionRecord {
        branch_code: normalize_branch_code(Some(&branch)),
        week_no,
        sessions: parse_count(first_present(&row, SESSIONS_HEADERS)),
        avg_attendance_percent: normalize_percent(first_present(&row, ATTENDANCE_HEADERS)),
        avg_test_attendance_percent: normalize_percent(first_present(&row, TEST_ATTENDANCE_HEADERS)),
        avg_test_pass_percent: normalize_percent(first_present(&row, PASS_HEADERS)),
        syllabus_covered: parse_count(first_present(&row, COVERED_HEADERS)),
        syllabus_total: parse_count(first_present(&row, TOTAL_HEADERS)),
        raw_data: Some(row),
    })
}

/// Insert a cell unless its header is blank or already taken by an
/// earlier column.
pub(crate) fn insert_cell(row: &mut RawRow, header: &str, value: RawValue) {
    if header.is_empty() {
        return;
    }
    row.entry(header.to_string()).or_insert(value);
}
