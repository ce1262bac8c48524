//! The immutable description of one import run.
//!
//! An [`ImportSpec`] can be built from command-line flags, loaded from a YAML
//! job file, or derived from a preview session. It never changes once a run
//! starts.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ImportError, ImportResult},
    query,
    reader::SourceLocator,
    transform::TransformOptions,
};

/// What to do when the target table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ExistingTablePolicy {
    /// Drop the table and recreate it from the inferred schema
    Overwrite,
    /// Insert into the table as-is
    Append,
    /// Refuse to import
    #[default]
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSpec {
    pub sources: Vec<PathBuf>,
    #[serde(flatten)]
    pub locator: SourceLocator,
    #[serde(flatten)]
    pub transform: TransformOptions,
    pub target_table: String,
    #[serde(default)]
    pub if_exists: ExistingTablePolicy,
}

impl ImportSpec {
    pub fn new(sources: Vec<PathBuf>, target_table: impl Into<String>) -> Self {
        Self {
            sources,
            locator: SourceLocator::default(),
            transform: TransformOptions::default(),
            target_table: target_table.into(),
            if_exists: ExistingTablePolicy::default(),
        }
    }

    /// With several sources, unreadable files are skipped instead of failing
    /// the run.
    pub fn is_multi_file(&self) -> bool {
        self.sources.len() > 1
    }

    pub fn validate(&self) -> ImportResult<()> {
        if self.sources.is_empty() {
            return Err(ImportError::InvalidSpec(
                "at least one source file is required".to_string(),
            ));
        }
        if self.target_table.trim().is_empty() {
            return Err(ImportError::InvalidSpec(
                "a target table name is required".to_string(),
            ));
        }
        query::quote_identifier(&self.target_table)?;
        if self.transform.add_source_column {
            query::quote_identifier(&self.transform.source_column_name)?;
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening job file {path:?}"))?;
        let spec = serde_yaml::from_reader(BufReader::new(file)).context("Parsing job YAML")?;
        Ok(spec)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating job file {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing job YAML")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn job_file_round_trips_with_flattened_options() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("job.yaml");
        let mut spec = ImportSpec::new(
            vec![PathBuf::from("a.csv"), PathBuf::from("b.xlsx")],
            "orders",
        );
        spec.locator.sheet = Some("Sheet2".to_string());
        spec.transform.promote_headers = true;
        spec.transform.rows_to_skip = 2;
        spec.if_exists = ExistingTablePolicy::Overwrite;

        spec.save(&path).expect("save job");
        let yaml = std::fs::read_to_string(&path).expect("read job");
        assert!(yaml.contains("promote_headers: true"), "{yaml}");
        assert!(yaml.contains("if_exists: overwrite"), "{yaml}");

        let loaded = ImportSpec::load(&path).expect("load job");
        assert_eq!(loaded, spec);
    }

    #[test]
    fn minimal_job_uses_defaults() {
        let yaml = "sources: [data.csv]\ntarget_table: t\n";
        let spec: ImportSpec = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(spec.if_exists, ExistingTablePolicy::Fail);
        assert_eq!(spec.transform, TransformOptions::default());
        assert_eq!(spec.locator, SourceLocator::default());
        assert!(!spec.is_multi_file());
    }

    #[test]
    fn validate_rejects_missing_sources_and_bad_names() {
        let spec = ImportSpec::new(Vec::new(), "t");
        assert!(matches!(spec.validate(), Err(ImportError::InvalidSpec(_))));

        let spec = ImportSpec::new(vec![PathBuf::from("a.csv")], "  ");
        assert!(matches!(spec.validate(), Err(ImportError::InvalidSpec(_))));

        let spec = ImportSpec::new(vec![PathBuf::from("a.csv")], "x".repeat(65));
        assert!(matches!(
            spec.validate(),
            Err(ImportError::InvalidIdentifier { .. })
        ));

        let spec = ImportSpec::new(vec![PathBuf::from("a.csv")], "weird `name`");
        assert!(spec.validate().is_ok());
    }
}
