pub mod cli;
pub mod columns;
pub mod connection;
pub mod data;
pub mod discover;
pub mod error;
pub mod grid;
pub mod import_cmd;
pub mod import_spec;
pub mod infer;
pub mod io_utils;
pub mod loader;
pub mod preview;
pub mod query;
pub mod reader;
pub mod reconcile;
pub mod store;
pub mod table;
pub mod transform;
pub mod worker;

use std::{env, fs::OpenOptions, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let target = match log_file {
        Some(path) => Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Opening log file {path:?}"))?,
        ),
        None => None,
    };
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if target.is_some() {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("db_importer", level);
        }
        if let Some(file) = target {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;
    match cli.command {
        Commands::Sheets(args) => handle_sheets(&args),
        Commands::Files(args) => handle_files(&args),
        Commands::Preview(args) => preview::execute(&args),
        Commands::Import(args) => import_cmd::execute(&args),
    }
}

fn handle_sheets(args: &cli::SheetsArgs) -> Result<()> {
    let sheets = reader::list_sheets(&args.input)
        .with_context(|| format!("Listing sheets of {:?}", args.input))?;
    for name in &sheets {
        println!("{name}");
    }
    info!("{} sheet(s) in {:?}", sheets.len(), args.input);
    Ok(())
}

fn handle_files(args: &cli::FilesArgs) -> Result<()> {
    let files = discover::discover_files(&args.dir, args.keyword.as_deref())
        .with_context(|| format!("Listing files in {:?}", args.dir))?;
    for path in &files {
        println!("{}", path.display());
    }
    info!("{} importable file(s) in {:?}", files.len(), args.dir);
    Ok(())
}
