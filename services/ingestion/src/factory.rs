//! Parser selection by declared MIME type and file name.

use crate::error::IngestError;
use crate::parser::{CsvParser, ExcelParser, RecordParser};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const XLS_MIME: &str = "application/vnd.ms-excel";
pub const CSV_MIME: &str = "text/csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Delimited,
}

fn has_extension(file_name: &str, ext: &str) -> bool {
    file_name.to_lowercase().ends_with(ext)
}

/// Detect the upload format, `None` when it is not supported.
///
/// The `.csv` name is checked first: browsers label CSV files as
/// `application/vnd.ms-excel` on some platforms.
pub fn detect_format(mime_type: &str, file_name: &str) -> Option<SourceFormat> {
    if has_extension(file_name, ".csv") {
        return Some(SourceFormat::Delimited);
    }

    if mime_type == XLSX_MIME
        || mime_type == XLS_MIME
        || has_extension(file_name, ".xlsx")
        || has_extension(file_name, ".xls")
    {
        return Some(SourceFormat::Workbook);
    }

    None
}

pub fn parser_for(mime_type: &str, file_name: &str) -> Result<Box<dyn RecordParser>, IngestError> {
    match detect_format(mime_type, file_name) {
        Some(SourceFormat::Workbook) => Ok(Box::new(ExcelParser)),
        Some(SourceFormat::Delimited) => Ok(Box::new(CsvParser)),
        None => Err(IngestError::UnsupportedFileType(mime_type.to_string())),
    }
}

/// MIME type to declare for a local file, from its extension.
pub fn mime_for_file_name(file_name: &str) -> &'static str {
    if has_extension(file_name, ".xlsx") {
        XLSX_MIME
    } else if has_extension(file_name, ".xls") {
        XLS_MIME
    } else if has_extension(file_name, ".csv") {
        CSV_MIME
    } else {
        "application/octet-stream"
    }
}
