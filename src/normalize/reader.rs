// src/normalize/reader.rs
use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use tracing::debug;

use super::{normalize_rows, reindex, Table};

fn read_raw_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let file =
        File::open(path).with_context(|| format!("opening dump file {}", path.display()))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result
            .with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(rows)
}

/// Read one bulk dump file (several logical tables concatenated) and
/// normalize it.
pub fn read_dump(path: impl AsRef<Path>) -> Result<Vec<Table>> {
    let path = path.as_ref();
    let rows = read_raw_rows(path)?;
    let tables = normalize_rows(rows, None);
    debug!(path = %path.display(), tables = tables.len(), "normalized dump");
    Ok(tables)
}

/// Read every `*.csv` under `dir` (sorted for determinism), normalizing each
/// file independently. A file's stem titles its first table when no section
/// boundary supplied one. Sidecar metadata files are skipped.
pub fn read_tables_dir(dir: impl AsRef<Path>) -> Result<Vec<Table>> {
    let dir = dir.as_ref();
    let pattern = format!("{}/*.csv", dir.display());
    let mut paths: Vec<_> = glob(&pattern)
        .with_context(|| format!("invalid glob pattern for {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut tables = Vec::new();
    for path in paths {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if stem.to_lowercase().contains("metadata") {
            continue;
        }
        let rows = read_raw_rows(&path)?;
        tables.extend(normalize_rows(rows, Some(stem)));
    }
    reindex(&mut tables);
    debug!(dir = %dir.display(), tables = tables.len(), "normalized tables directory");
    Ok(tables)
}
