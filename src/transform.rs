//! Per-file transforms, applied in a fixed order:
//! skip rows, promote header, sanitize columns, deduplicate rows, add the
//! source-filename column.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{columns::sanitize_columns, data::Value, grid::RawGrid};

pub const DEFAULT_SOURCE_COLUMN: &str = "source_file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    pub rows_to_skip: usize,
    pub promote_headers: bool,
    pub deduplicate: bool,
    pub add_source_column: bool,
    pub source_column_name: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            rows_to_skip: 0,
            promote_headers: false,
            deduplicate: false,
            add_source_column: false,
            source_column_name: DEFAULT_SOURCE_COLUMN.to_string(),
        }
    }
}

/// Which steps changed the grid during [`apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppliedSteps {
    pub skipped: bool,
    pub promoted: bool,
    pub duplicates_removed: usize,
    pub source_added: bool,
}

/// Runs every enabled step on one file's grid. `source_name` is the value
/// written into the source column.
pub fn apply(grid: &mut RawGrid, options: &TransformOptions, source_name: &str) -> AppliedSteps {
    let mut steps = AppliedSteps {
        skipped: skip_rows(grid, options.rows_to_skip),
        ..AppliedSteps::default()
    };
    if options.promote_headers {
        steps.promoted = promote_header(grid);
    }
    sanitize(grid);
    if options.deduplicate {
        steps.duplicates_removed = deduplicate_rows(grid);
    }
    if options.add_source_column {
        steps.source_added = add_source_column(grid, &options.source_column_name, source_name);
    }
    steps
}

/// Drops the first `count` rows when `0 < count < rows`; any other count
/// leaves the grid untouched.
pub fn skip_rows(grid: &mut RawGrid, count: usize) -> bool {
    if count == 0 || count >= grid.len() {
        return false;
    }
    grid.rows.drain(..count);
    true
}

pub fn promote_header(grid: &mut RawGrid) -> bool {
    if grid.is_empty() {
        return false;
    }
    let header = grid.rows.remove(0);
    grid.columns = header.iter().map(Value::as_display).collect();
    true
}

/// Removes the first row without reading it; used for files after the first
/// when headers were promoted.
pub fn drop_first_row(grid: &mut RawGrid) -> bool {
    if grid.is_empty() {
        return false;
    }
    grid.rows.remove(0);
    true
}

pub fn sanitize(grid: &mut RawGrid) {
    grid.columns = sanitize_columns(&grid.columns);
}

/// Keeps the first occurrence of every distinct row, preserving order.
/// Returns the number of rows removed.
pub fn deduplicate_rows(grid: &mut RawGrid) -> usize {
    let before = grid.rows.len();
    let mut seen = HashSet::with_capacity(before);
    grid.rows.retain(|row| seen.insert(row.clone()));
    let removed = before - grid.rows.len();
    if removed > 0 {
        debug!("Removed {removed} duplicate row(s)");
    }
    removed
}

pub fn add_source_column(grid: &mut RawGrid, column_name: &str, source_name: &str) -> bool {
    if grid.column_index(column_name).is_some() {
        return false;
    }
    grid.columns.insert(0, column_name.to_string());
    let value = Value::Text(source_name.to_string());
    for row in &mut grid.rows {
        row.insert(0, value.clone());
    }
    true
}
