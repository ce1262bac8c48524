//! Header-less tabular data as loaded from a source file.

use crate::data::Value;

pub const PLACEHOLDER_PREFIX: &str = "Column_";

/// Column names plus rows of cells. Every row holds exactly
/// `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGrid {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawGrid {
    /// Builds a grid with placeholder column names, dropping fully-empty rows
    /// and columns. Callers guarantee equal row lengths.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Self {
        let width = rows.first().map(Vec::len).unwrap_or(0);
        debug_assert!(rows.iter().all(|row| row.len() == width));

        let mut rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(Value::is_empty))
            .collect::<Vec<_>>();

        let keep = (0..width)
            .map(|idx| rows.iter().any(|row| !row[idx].is_empty()))
            .collect::<Vec<_>>();
        if keep.iter().any(|k| !k) {
            for row in &mut rows {
                let mut idx = 0;
                row.retain(|_| {
                    let kept = keep[idx];
                    idx += 1;
                    kept
                });
            }
        }

        let kept_width = keep.iter().filter(|k| **k).count();
        RawGrid {
            columns: placeholder_names(kept_width),
            rows,
        }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Renders every cell to text, for table output.
    pub fn display_rows(&self, limit: usize) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| row.iter().map(Value::as_display).collect())
            .collect()
    }
}

pub fn placeholder_names(count: usize) -> Vec<String> {
    (0..count)
        .map(|idx| format!("{PLACEHOLDER_PREFIX}{idx}"))
        .collect()
}
