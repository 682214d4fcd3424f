// =============================================================================
// WORKBOOK PARSER - XLSX / XLS / XLSB / ODS, first sheet only
// =============================================================================

use super::delimited::{looks_delimited, CsvParser};
use super::{insert_cell, map_row, RecordParser};
use crate::error::ParseError;
use crate::record::{RawRow, RawValue, UnifiedIngestionRecord};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use tracing::{debug, info};

/// Spreadsheet parser backed by calamine.
///
/// Sheet selection is the uploader's concern: only the first sheet is read.
/// Plain delimited text sent under an Excel MIME type is read as CSV.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExcelParser;

impl RecordParser for ExcelParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<UnifiedIngestionRecord>, ParseError> {
        // calamine auto-detects the container format from the bytes
        let mut workbook = match open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())) {
            Ok(workbook) => workbook,
            Err(e) if looks_delimited(bytes) => {
                info!(reason = %e, "Not a workbook container, reading as delimited text");
                return CsvParser.parse(bytes);
            }
            Err(e) => return Err(e.into()),
        };

        let sheet_names = workbook.sheet_names().to_vec();
        let sheet_name = sheet_names.first().ok_or(ParseError::NoSheets)?;

        let range = workbook.worksheet_range(sheet_name)?;
        let (row_count, col_count) = range.get_size();
        info!(
            sheet = %sheet_name,
            sheets = sheet_names.len(),
            rows = row_count,
            columns = col_count,
            "Reading first sheet"
        );

        Ok(records_from_range(&range))
    }
}

/// Map a sheet range (header row first) to unified records.
pub fn records_from_range(range: &Range<Data>) -> Vec<UnifiedIngestionRecord> {
    let mut rows = range.rows();

    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(header_text).collect(),
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    let mut skipped = 0;

    for (offset, cells) in rows.enumerate() {
        let mut row = RawRow::new();
        for (header, cell) in headers.iter().zip(cells.iter()) {
            if let Some(value) = cell_value(cell) {
                insert_cell(&mut row, header, value);
            }
        }

        match map_row(row) {
            Some(record) => records.push(record),
            None => {
                // +2: 1-indexed, plus the header row
                debug!(row = offset + 2, "Skipping row without branch or week");
                skipped += 1;
            }
        }
    }

    info!(records = records.len(), skipped, "Parsed sheet rows");
    records
}

fn header_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => format!("{}", other),
    }
}

fn cell_value(cell: &Data) -> Option<RawValue> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(RawValue::Text(s.clone())),
        Data::Float(f) => Some(RawValue::Number(*f)),
        Data::Int(i) => Some(RawValue::Number(*i as f64)),
        Data::Bool(b) => Some(RawValue::Bool(*b)),
        // Serial day number, as the sheet stores it
        Data::DateTime(dt) => Some(RawValue::Number(dt.as_f64())),
        other => Some(RawValue::Text(format!("{}", other))),
    }
}
