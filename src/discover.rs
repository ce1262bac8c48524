use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    error::{ImportError, ImportResult},
    io_utils,
};

/// Lists the CSV and spreadsheet files directly inside `dir`, sorted by name.
/// A keyword keeps only files whose name contains it, ignoring case. Office
/// lock files (`~$...`) are never listed.
pub fn discover_files(dir: &Path, keyword: Option<&str>) -> ImportResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| ImportError::source_read(dir, e))?;
    let keyword = keyword
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty());

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ImportError::source_read(dir, e))?.path();
        if !path.is_file() || io_utils::detect_format(&path).is_none() {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if name.starts_with("~$") {
            continue;
        }
        if keyword.as_ref().is_some_and(|k| !name.contains(k.as_str())) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    debug!("Found {} importable file(s) in {:?}", files.len(), dir);
    Ok(files)
}
