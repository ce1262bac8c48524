//! Error taxonomy for the import pipeline.
//!
//! Per-file problems ([`ImportError::SourceRead`], [`ImportError::SchemaMismatch`])
//! are downgraded to [`ImportWarning`]s when more than one file is imported.
//! Everything else aborts the run. Nothing already committed is rolled back.

use std::{fmt, path::PathBuf};

use thiserror::Error;

pub type ImportResult<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to read {path:?}: {message}")]
    SourceRead { path: PathBuf, message: String },
    #[error("File '{file}' has {found} column(s) but the first file has {expected}")]
    SchemaMismatch {
        file: String,
        expected: usize,
        found: usize,
    },
    #[error("No rows survived reading and reconciliation")]
    NoUsableInput,
    #[error("Table '{table}' already exists")]
    TargetExists { table: String },
    #[error("{context}: {message}")]
    Store { context: String, message: String },
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: &'static str },
    #[error("Invalid import job: {0}")]
    InvalidSpec(String),
    #[error("An import is already running")]
    ImportInProgress,
}

impl ImportError {
    pub fn source_read(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        ImportError::SourceRead {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn store(context: impl Into<String>, err: impl fmt::Display) -> Self {
        ImportError::Store {
            context: context.into(),
            message: err.to_string(),
        }
    }
}

/// Non-fatal problems recorded while collecting input files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportWarning {
    SkippedFile { file: String, reason: String },
    SchemaMismatch {
        file: String,
        expected: usize,
        found: usize,
    },
    EmptyFile { file: String },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::SkippedFile { file, reason } => {
                write!(f, "Skipped '{file}': {reason}")
            }
            ImportWarning::SchemaMismatch {
                file,
                expected,
                found,
            } => write!(
                f,
                "Skipped '{file}': {found} column(s) do not match the first file's {expected}"
            ),
            ImportWarning::EmptyFile { file } => {
                write!(f, "Skipped '{file}': no rows left after transforms")
            }
        }
    }
}

impl From<ImportError> for ImportWarning {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::SchemaMismatch {
                file,
                expected,
                found,
            } => ImportWarning::SchemaMismatch {
                file,
                expected,
                found,
            },
            ImportError::SourceRead { path, message } => ImportWarning::SkippedFile {
                file: display_name(&path),
                reason: message,
            },
            other => ImportWarning::SkippedFile {
                file: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

/// Base file name used in warnings, source columns and log lines.
pub fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
