// =============================================================================
// DELIMITED TEXT PARSER - CSV exports (comma, semicolon or tab)
// =============================================================================
// Spreadsheet exports from different locales disagree on the delimiter and
// the encoding. This parser:
// - Strips a UTF-8 BOM
// - Falls back to Windows-1252 when the bytes are not valid UTF-8
// - Picks the delimiter from the header line
// - Trims headers only, so a whitespace cell is present like in a workbook
// - Feeds rows through the same mapping as the workbook parser
// =============================================================================

use super::{insert_cell, map_row, RecordParser};
use crate::error::ParseError;
use crate::record::{RawRow, RawValue, UnifiedIngestionRecord};
use std::borrow::Cow;
use tracing::{debug, info};

const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t'];

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvParser;

impl RecordParser for CsvParser {
    fn parse(&self, bytes: &[u8]) -> Result<Vec<UnifiedIngestionRecord>, ParseError> {
        let content = decode(bytes);
        let delimiter = sniff_delimiter(&content);
        debug!(delimiter = ?(delimiter as char), "Detected CSV delimiter");

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

        let mut records = Vec::new();
        let mut skipped = 0;

        for (line_idx, result) in reader.records().enumerate() {
            let fields = result?;

            let mut row = RawRow::new();
            for (header, field) in headers.iter().zip(fields.iter()) {
                if !field.is_empty() {
                    insert_cell(&mut row, header, RawValue::Text(field.to_string()));
                }
            }

            match map_row(row) {
                Some(record) => records.push(record),
                None => {
                    // +2 for 1-indexed + header
                    debug!(line = line_idx + 2, "Skipping row without branch or week");
                    skipped += 1;
                }
            }
        }

        info!(records = records.len(), skipped, "Parsed CSV rows");
        Ok(records)
    }
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            text
        }
    }
}

/// True when the bytes read as delimited text: no workbook container
/// signature, no control bytes, and a delimiter in the first line.
pub(super) fn looks_delimited(bytes: &[u8]) -> bool {
    const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
    const CFB_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0";
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC) {
        return false;
    }

    let content = decode(bytes);
    if content
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\t' | '\r' | '\n'))
    {
        return false;
    }

    let header_line = content.lines().next().unwrap_or("");
    header_line
        .bytes()
        .any(|b| DELIMITER_CANDIDATES.contains(&b))
}

/// Most frequent candidate in the first line; comma on ties or when
/// none occurs.
fn sniff_delimiter(content: &str) -> u8 {
    let header_line = content.lines().next().unwrap_or("");

    let mut best = b',';
    let mut best_count = 0;
    for &candidate in DELIMITER_CANDIDATES {
        let count = header_line.bytes().filter(|b| *b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}
