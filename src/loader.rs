//! Orchestrates one import run: read every source, reconcile, resolve the
//! target table, then insert in committed batches.

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    data::Value,
    error::{ImportError, ImportResult, ImportWarning, display_name},
    grid::RawGrid,
    import_spec::{ExistingTablePolicy, ImportSpec},
    infer::{self, ColumnDef},
    query,
    reader::{self, ReadMode},
    reconcile::{MergedDataset, Reconciler},
    store::TableStore,
};

pub const BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    ReadingFiles,
    Reconciling,
    ResolvingTarget,
    Inserting,
    Succeeded,
    Failed,
}

impl LoaderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoaderState::Succeeded | LoaderState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStatus {
    Succeeded { rows: usize },
    Failed { message: String },
}

/// Receives every state the loader enters, progress after every committed
/// batch, and one terminal status.
pub trait ProgressSink {
    fn state(&mut self, _state: LoaderState) {}

    fn progress(&mut self, rows_written: usize, rows_total: usize);

    fn finished(&mut self, status: &ImportStatus);
}

impl<T: ProgressSink + ?Sized> ProgressSink for &mut T {
    fn state(&mut self, state: LoaderState) {
        (**self).state(state);
    }

    fn progress(&mut self, rows_written: usize, rows_total: usize) {
        (**self).progress(rows_written, rows_total);
    }

    fn finished(&mut self, status: &ImportStatus) {
        (**self).finished(status);
    }
}

/// Reports progress through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn progress(&mut self, rows_written: usize, rows_total: usize) {
        info!("Committed {rows_written}/{rows_total} row(s)");
    }

    fn finished(&mut self, status: &ImportStatus) {
        match status {
            ImportStatus::Succeeded { rows } => info!("Import finished: {rows} row(s) written"),
            ImportStatus::Failed { message } => error!("Import failed: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub table: String,
    pub rows_written: usize,
    pub batches: usize,
    /// Files that contributed rows.
    pub files: Vec<String>,
    /// The inferred schema when the table was (re)created; `None` on append.
    pub created_columns: Option<Vec<ColumnDef>>,
    pub warnings: Vec<ImportWarning>,
}

/// Reads every source in order. Failures are warnings when several files
/// are imported and fatal for a single file.
pub fn read_sources(
    spec: &ImportSpec,
) -> ImportResult<(Vec<(String, RawGrid)>, Vec<ImportWarning>)> {
    let mut grids = Vec::with_capacity(spec.sources.len());
    let mut warnings = Vec::new();
    for path in &spec.sources {
        match reader::read_grid(path, &spec.locator, ReadMode::Full) {
            Ok(grid) => grids.push((display_name(path), grid)),
            Err(err) if spec.is_multi_file() => {
                let warning = ImportWarning::from(err);
                warn!("{warning}");
                warnings.push(warning);
            }
            Err(err) => return Err(err),
        }
    }
    if grids.is_empty() {
        return Err(ImportError::NoUsableInput);
    }
    Ok((grids, warnings))
}

/// Reconciles already-read grids into one dataset. Warnings from reading are
/// kept ahead of those raised here.
pub fn merge_sources(
    spec: &ImportSpec,
    grids: Vec<(String, RawGrid)>,
    mut warnings: Vec<ImportWarning>,
) -> ImportResult<(MergedDataset, Vec<ImportWarning>)> {
    let mut reconciler = Reconciler::new(&spec.transform);
    for (name, grid) in grids {
        reconciler.push(&name, grid);
    }
    let (dataset, reconcile_warnings) = reconciler.finish()?;
    warnings.extend(reconcile_warnings);
    Ok((dataset, warnings))
}

/// Inserts `rows` in [`BATCH_SIZE`] chunks, one committed transaction each,
/// reporting progress after every commit. Returns the number of batches.
pub fn insert_batches<S, P>(
    store: &mut S,
    sink: &mut P,
    table: &str,
    columns: &[String],
    rows: &[Vec<Value>],
) -> ImportResult<usize>
where
    S: TableStore + ?Sized,
    P: ProgressSink + ?Sized,
{
    let total = rows.len();
    let mut written = 0;
    let mut batches = 0;
    for chunk in rows.chunks(BATCH_SIZE) {
        store.insert_batch(table, columns, chunk)?;
        written += chunk.len();
        batches += 1;
        debug!("Batch {batches} committed ({written}/{total})");
        sink.progress(written, total);
    }
    Ok(batches)
}

/// Single-use: [`ChunkedLoader::run`] consumes the loader.
pub struct ChunkedLoader<S, P> {
    spec: ImportSpec,
    store: S,
    sink: P,
    state: LoaderState,
    run_id: Uuid,
}

impl<S, P> ChunkedLoader<S, P>
where
    S: TableStore,
    P: ProgressSink,
{
    pub fn new(spec: ImportSpec, store: S, sink: P) -> Self {
        Self {
            spec,
            store,
            sink,
            state: LoaderState::Idle,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run(mut self) -> ImportResult<ImportReport> {
        info!(
            "[{}] Importing {} file(s) into '{}'",
            self.run_id,
            self.spec.sources.len(),
            self.spec.target_table
        );
        let outcome = self.execute();
        match &outcome {
            Ok(report) => {
                self.transition(LoaderState::Succeeded);
                self.sink.finished(&ImportStatus::Succeeded {
                    rows: report.rows_written,
                });
            }
            Err(err) => {
                self.transition(LoaderState::Failed);
                self.sink.finished(&ImportStatus::Failed {
                    message: err.to_string(),
                });
            }
        }
        outcome
    }

    /// Terminal states are final; later transitions are ignored.
    fn transition(&mut self, next: LoaderState) {
        if self.state.is_terminal() {
            debug!("[{}] ignoring {next:?} after {:?}", self.run_id, self.state);
            return;
        }
        debug!("[{}] {:?} -> {:?}", self.run_id, self.state, next);
        self.state = next;
        self.sink.state(next);
    }

    fn execute(&mut self) -> ImportResult<ImportReport> {
        self.spec.validate()?;

        self.transition(LoaderState::ReadingFiles);
        let (grids, warnings) = read_sources(&self.spec)?;

        self.transition(LoaderState::Reconciling);
        let (mut dataset, warnings) = merge_sources(&self.spec, grids, warnings)?;
        info!(
            "[{}] Merged {} row(s) x {} column(s) from {} file(s)",
            self.run_id,
            dataset.len(),
            dataset.columns.len(),
            dataset.files.len()
        );

        self.transition(LoaderState::ResolvingTarget);
        let created_columns = self.resolve_target(&mut dataset)?;

        self.transition(LoaderState::Inserting);
        let table = self.spec.target_table.clone();
        let batches = insert_batches(
            &mut self.store,
            &mut self.sink,
            &table,
            &dataset.columns,
            &dataset.rows,
        )?;
        info!(
            "[{}] Imported {} row(s) into '{table}' in {batches} batch(es)",
            self.run_id,
            dataset.len()
        );

        Ok(ImportReport {
            run_id: self.run_id,
            table,
            rows_written: dataset.len(),
            batches,
            files: dataset.files,
            created_columns,
            warnings,
        })
    }

    /// Creates, recreates or keeps the target table. When the table is
    /// (re)created the rows are coerced to the inferred column types.
    fn resolve_target(
        &mut self,
        dataset: &mut MergedDataset,
    ) -> ImportResult<Option<Vec<ColumnDef>>> {
        let table = self.spec.target_table.as_str();
        let exists = self.store.table_exists(table)?;
        if exists {
            match self.spec.if_exists {
                ExistingTablePolicy::Fail => {
                    return Err(ImportError::TargetExists {
                        table: table.to_string(),
                    });
                }
                ExistingTablePolicy::Append => {
                    info!("[{}] Appending to existing table '{table}'", self.run_id);
                    return Ok(None);
                }
                ExistingTablePolicy::Overwrite => {}
            }
        }

        let columns = infer::infer_columns(dataset);
        debug!("[{}] Inferred columns: {columns:?}", self.run_id);
        // Every column name must be usable before the old table is dropped.
        query::create_table_sql(table, &columns)?;
        if exists {
            info!("[{}] Dropping existing table '{table}'", self.run_id);
            self.store.drop_table(table)?;
        }
        self.store.create_table(table, &columns)?;
        infer::coerce_rows(&mut dataset.rows, &columns);
        Ok(Some(columns))
    }
}
