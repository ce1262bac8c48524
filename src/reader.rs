//! Loads a single CSV or spreadsheet file into a [`RawGrid`].
//!
//! No header is assumed: every source row becomes a data row and columns are
//! named `Column_0..`. Header promotion is a later transform.

use std::{
    io::{Read, Seek},
    path::Path,
};

use calamine::{Data, DataRef, Reader, Sheets, Xlsx, XlsxError, open_workbook_auto};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, parse_timestamp},
    error::{ImportError, ImportResult},
    grid::RawGrid,
    io_utils::{self, SourceFormat},
};

/// Raw rows read before cleanup when sampling for a preview.
pub const PREVIEW_ROW_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Preview,
    Full,
}

impl ReadMode {
    pub fn row_cap(self) -> usize {
        match self {
            ReadMode::Preview => PREVIEW_ROW_CAP,
            ReadMode::Full => usize::MAX,
        }
    }
}

/// Format-specific selector: the sheet for spreadsheets, the text encoding
/// for CSV. Fields that do not apply to a file are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocator {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

pub fn read_grid(path: &Path, locator: &SourceLocator, mode: ReadMode) -> ImportResult<RawGrid> {
    let grid = match source_format(path)? {
        SourceFormat::Csv => read_csv(path, locator.encoding.as_deref(), mode.row_cap())?,
        SourceFormat::Spreadsheet => {
            read_spreadsheet(path, locator.sheet.as_deref(), mode.row_cap())?
        }
    };
    debug!(
        "Read {} row(s) x {} column(s) from {:?} ({:?})",
        grid.len(),
        grid.width(),
        path,
        mode
    );
    Ok(grid)
}

pub fn list_sheets(path: &Path) -> ImportResult<Vec<String>> {
    if source_format(path)? != SourceFormat::Spreadsheet {
        return Err(ImportError::source_read(path, "not a spreadsheet file"));
    }
    let workbook = open_workbook_auto(path).map_err(|e| ImportError::source_read(path, e))?;
    Ok(workbook.sheet_names())
}

fn source_format(path: &Path) -> ImportResult<SourceFormat> {
    io_utils::detect_format(path)
        .ok_or_else(|| ImportError::source_read(path, "unsupported file extension"))
}

fn read_csv(path: &Path, encoding: Option<&str>, cap: usize) -> ImportResult<RawGrid> {
    let encoding =
        io_utils::resolve_encoding(encoding).map_err(|e| ImportError::source_read(path, e))?;
    let mut reader = io_utils::open_csv_reader_from_path(path)
        .map_err(|e| ImportError::source_read(path, format!("{e:#}")))?;

    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        if idx >= cap {
            break;
        }
        let record = record
            .map_err(|e| ImportError::source_read(path, format!("row {}: {e}", idx + 1)))?;
        let decoded = io_utils::decode_record(&record, encoding).map_err(|e| {
            ImportError::source_read(
                path,
                format!("row {}: {e} (is the encoding correct?)", idx + 1),
            )
        })?;
        rows.push(
            decoded
                .iter()
                .map(|field| Value::from_text(field))
                .collect(),
        );
    }
    Ok(RawGrid::from_rows(rows))
}

fn read_spreadsheet(path: &Path, sheet: Option<&str>, cap: usize) -> ImportResult<RawGrid> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ImportError::source_read(path, e))?;
    let names = workbook.sheet_names();
    let sheet = match sheet {
        Some(name) if names.iter().any(|candidate| candidate == name) => name.to_string(),
        Some(name) => {
            return Err(ImportError::source_read(
                path,
                format!("sheet '{name}' not found (available: {})", names.join(", ")),
            ));
        }
        None => names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::source_read(path, "workbook has no sheets"))?,
    };

    let sheet_error = |e: &dyn std::fmt::Display| {
        ImportError::source_read(path, format!("sheet '{sheet}': {e}"))
    };
    let rows = if let Sheets::Xlsx(xlsx) = &mut workbook {
        stream_xlsx_rows(xlsx, &sheet, cap).map_err(|e| sheet_error(&e))?
    } else {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| sheet_error(&e))?;
        range
            .rows()
            .take(cap)
            .map(|row| row.iter().map(cell_value).collect())
            .collect()
    };
    Ok(RawGrid::from_rows(rows))
}

/// Reads `.xlsx` cells in document order and stops after `cap` rows counted
/// from the first used row, so a preview never parses the rest of the sheet.
/// Rows are padded to the widest one.
fn stream_xlsx_rows<RS: Read + Seek>(
    xlsx: &mut Xlsx<RS>,
    sheet: &str,
    cap: usize,
) -> Result<Vec<Vec<Value>>, XlsxError> {
    let mut cells = xlsx.worksheet_cells_reader(sheet)?;
    let mut rows: Vec<Vec<Value>> = Vec::new();
    let mut first_row = None;
    let mut width = 0;
    while let Some(cell) = cells.next_cell()? {
        if matches!(cell.get_value(), DataRef::Empty) {
            continue;
        }
        let (row, col) = cell.get_position();
        let first = *first_row.get_or_insert(row);
        let offset = row.saturating_sub(first) as usize;
        if offset >= cap {
            break;
        }
        if rows.len() <= offset {
            rows.resize_with(offset + 1, Vec::new);
        }
        let col = col as usize;
        let line = &mut rows[offset];
        if line.len() <= col {
            line.resize(col + 1, Value::Null);
        }
        line[col] = cell_value(&Data::from(cell.get_value().clone()));
        width = width.max(col + 1);
    }
    for row in &mut rows {
        row.resize(width, Value::Null);
    }
    Ok(rows)
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Integer(*i),
        Data::Float(f) => Value::Real(*f),
        Data::Bool(b) => Value::Boolean(*b),
        Data::String(s) => Value::from_text(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::Real(dt.as_f64())),
        Data::DateTimeIso(s) => parse_timestamp(s)
            .map(Value::Timestamp)
            .unwrap_or_else(|| Value::from_text(s)),
        Data::DurationIso(s) => Value::from_text(s),
    }
}
