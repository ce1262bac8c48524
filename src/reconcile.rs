//! Merges per-file grids into one dataset sharing a canonical column set.
//!
//! The first file that still has rows after its transforms fixes the column
//! names and count. Later files are matched by position; a file with a
//! different column count is skipped with a warning.

use log::{debug, info, warn};

use crate::{
    data::Value,
    error::{ImportError, ImportResult, ImportWarning},
    grid::RawGrid,
    transform::{self, TransformOptions},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedDataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Base names of the files that contributed rows, in order.
    pub files: Vec<String>,
}

impl MergedDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[idx])
    }
}

pub struct Reconciler<'a> {
    options: &'a TransformOptions,
    canonical: Option<Vec<String>>,
    merged: MergedDataset,
    warnings: Vec<ImportWarning>,
}

impl<'a> Reconciler<'a> {
    pub fn new(options: &'a TransformOptions) -> Self {
        Self {
            options,
            canonical: None,
            merged: MergedDataset::default(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, warning: ImportWarning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Transforms one freshly read grid and appends it when it fits.
    pub fn push(&mut self, file: &str, mut grid: RawGrid) {
        transform::skip_rows(&mut grid, self.options.rows_to_skip);

        let canonical_width = match self.canonical.clone() {
            None => {
                if self.options.promote_headers {
                    transform::promote_header(&mut grid);
                }
                transform::sanitize(&mut grid);
                if grid.is_empty() {
                    self.warn(ImportWarning::EmptyFile {
                        file: file.to_string(),
                    });
                    return;
                }
                debug!("'{file}' defines the canonical columns {:?}", grid.columns);
                self.canonical = Some(grid.columns.clone());
                grid.width()
            }
            Some(canonical) => {
                if self.options.promote_headers {
                    transform::drop_first_row(&mut grid);
                }
                if grid.is_empty() {
                    self.warn(ImportWarning::EmptyFile {
                        file: file.to_string(),
                    });
                    return;
                }
                if grid.width() != canonical.len() {
                    self.warn(
                        ImportError::SchemaMismatch {
                            file: file.to_string(),
                            expected: canonical.len(),
                            found: grid.width(),
                        }
                        .into(),
                    );
                    return;
                }
                grid.columns = canonical;
                grid.width()
            }
        };

        if self.options.add_source_column {
            transform::add_source_column(&mut grid, &self.options.source_column_name, file);
        }
        if self.merged.files.is_empty() {
            self.merged.columns = grid.columns.clone();
        }
        debug!(
            "'{file}' contributes {} row(s) over {canonical_width} canonical column(s)",
            grid.len()
        );
        self.merged.rows.extend(grid.rows);
        self.merged.files.push(file.to_string());
    }

    pub fn finish(mut self) -> ImportResult<(MergedDataset, Vec<ImportWarning>)> {
        if self.merged.is_empty() {
            return Err(ImportError::NoUsableInput);
        }
        if self.options.deduplicate {
            let mut grid = RawGrid {
                columns: std::mem::take(&mut self.merged.columns),
                rows: std::mem::take(&mut self.merged.rows),
            };
            let removed = transform::deduplicate_rows(&mut grid);
            if removed > 0 {
                info!("Dropped {removed} duplicate row(s) across all files");
            }
            self.merged.columns = grid.columns;
            self.merged.rows = grid.rows;
        }
        Ok((self.merged, self.warnings))
    }
}

/// Convenience wrapper over [`Reconciler`] for already-read grids.
pub fn reconcile(
    files: Vec<(String, RawGrid)>,
    options: &TransformOptions,
) -> ImportResult<(MergedDataset, Vec<ImportWarning>)> {
    let mut reconciler = Reconciler::new(options);
    for (name, grid) in files {
        reconciler.push(&name, grid);
    }
    reconciler.finish()
}
