use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::{info, warn};
use serde_json::json;

use crate::{
    cli::ImportArgs,
    discover,
    error::ImportResult,
    import_spec::ImportSpec,
    loader::ImportReport,
    store::{MemoryStore, MySqlStore, TableStore},
    worker::{Coordinator, WorkerEvent},
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn execute(args: &ImportArgs) -> Result<()> {
    let spec = resolve_spec(args)?;
    if let Some(path) = &args.save_job {
        spec.save(path)
            .with_context(|| format!("Saving job to {path:?}"))?;
        info!("Job written to {path:?}");
    }

    if args.dry_run {
        let report = run_in_background(spec.clone(), || Ok(MemoryStore::new()))?;
        let plan = json!({
            "job": spec,
            "files": report.files,
            "rows": report.rows_written,
            "columns": report.created_columns,
            "warnings": report.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).context("Serializing dry-run plan")?
        );
        return Ok(());
    }

    let config = args.connection.config();
    info!("Connecting to {}", config.describe());
    let table = spec.target_table.clone();
    let report = run_in_background(spec, move || MySqlStore::connect(&config))?;
    for warning in &report.warnings {
        warn!("{warning}");
    }
    info!(
        "Imported {} row(s) from {} file(s) into '{table}'",
        report.rows_written,
        report.files.len()
    );
    Ok(())
}

/// Merges the job file (if any) with command-line flags; flags win.
pub fn resolve_spec(args: &ImportArgs) -> Result<ImportSpec> {
    let mut spec = match &args.job {
        Some(path) => {
            ImportSpec::load(path).with_context(|| format!("Loading job from {path:?}"))?
        }
        None => ImportSpec::new(Vec::new(), String::new()),
    };

    if let Some(dir) = &args.dir {
        spec.sources = discover::discover_files(dir, args.keyword.as_deref())
            .with_context(|| format!("Listing files in {dir:?}"))?;
        if spec.sources.is_empty() {
            return Err(anyhow!("No importable files found in {dir:?}"));
        }
    } else if !args.inputs.is_empty() {
        spec.sources = args.inputs.clone();
    }
    if let Some(table) = &args.table {
        spec.target_table = table.clone();
    }
    if let Some(policy) = args.if_exists {
        spec.if_exists = policy;
    }
    spec.locator = args.source.overlay(spec.locator);
    spec.transform = args.transform.overlay(spec.transform);

    spec.validate().context("Validating import job")?;
    Ok(spec)
}

fn run_in_background<S, F>(spec: ImportSpec, connect: F) -> Result<ImportReport>
where
    S: TableStore,
    F: FnOnce() -> ImportResult<S> + Send + 'static,
{
    let mut coordinator = Coordinator::new();
    coordinator.start_import(spec, connect)?;
    loop {
        let mut events = coordinator.wait(POLL_INTERVAL);
        if events.is_empty() && !coordinator.is_importing() {
            // The worker clears its busy flag just before sending the result.
            events = coordinator.wait(POLL_INTERVAL);
            if events.is_empty() {
                return Err(anyhow!("Import worker stopped without reporting a result"));
            }
        }
        for event in events {
            match event {
                WorkerEvent::Progress {
                    rows_written,
                    rows_total,
                } => info!("Committed {rows_written}/{rows_total} row(s)"),
                WorkerEvent::ImportFinished(result) => {
                    return result.context("Import failed");
                }
                WorkerEvent::Preview { .. } => {}
            }
        }
    }
}
