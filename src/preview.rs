//! Interactive preview of one source file.
//!
//! A [`PipelineState`] holds a raw sample (at most
//! [`PREVIEW_ROW_CAP`](crate::reader::PREVIEW_ROW_CAP) rows) and the result of
//! applying the current transform options to it. Options are always replayed
//! from the raw sample, so applying the same options twice is harmless.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::PreviewArgs,
    error::{ImportResult, display_name},
    grid::RawGrid,
    import_spec::{ExistingTablePolicy, ImportSpec},
    reader::{self, ReadMode, SourceLocator},
    table,
    transform::{self, TransformOptions},
};

pub const DEFAULT_DISPLAY_ROWS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    pub source: PathBuf,
    pub locator: SourceLocator,
    pub options: TransformOptions,
    pub raw: RawGrid,
    pub transformed: RawGrid,
    pub skip_applied: bool,
    pub headers_promoted: bool,
}

impl PipelineState {
    pub fn load(path: &Path, locator: &SourceLocator) -> ImportResult<Self> {
        let raw = reader::read_grid(path, locator, ReadMode::Preview)?;
        Ok(Self::from_grid(path.to_path_buf(), locator.clone(), raw))
    }

    pub fn from_grid(source: PathBuf, locator: SourceLocator, raw: RawGrid) -> Self {
        let mut state = Self {
            source,
            locator,
            options: TransformOptions::default(),
            transformed: raw.clone(),
            raw,
            skip_applied: false,
            headers_promoted: false,
        };
        state.apply(TransformOptions::default());
        state
    }

    pub fn apply(&mut self, options: TransformOptions) {
        let mut grid = self.raw.clone();
        let steps = transform::apply(&mut grid, &options, &display_name(&self.source));
        self.skip_applied = steps.skipped;
        self.headers_promoted = steps.promoted;
        self.transformed = grid;
        self.options = options;
    }

    /// The import that repeats, over every row of `sources`, what this
    /// preview shows.
    pub fn to_import_spec(
        &self,
        sources: Vec<PathBuf>,
        target_table: impl Into<String>,
        if_exists: ExistingTablePolicy,
    ) -> ImportSpec {
        ImportSpec {
            sources,
            locator: self.locator.clone(),
            transform: self.options.clone(),
            target_table: target_table.into(),
            if_exists,
        }
    }
}

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let locator = args.source.locator();
    let mut state = PipelineState::load(&args.input, &locator)
        .with_context(|| format!("Loading preview of {:?}", args.input))?;
    state.apply(args.transform.options());

    table::print_grid(&state.transformed, args.rows);
    info!(
        "Displayed {} of {} sampled row(s) from {:?} (skip applied: {}, headers promoted: {})",
        state.transformed.len().min(args.rows),
        state.transformed.len(),
        args.input,
        state.skip_applied,
        state.headers_promoted
    );
    Ok(())
}
