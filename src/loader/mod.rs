//! BOM-aware CSV I/O for snapshot and master tables.

use crate::error::StoreError;
use crate::models::Table;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Extract the stock code from a master file name: `master/2330.csv` → `2330`.
pub fn code_from_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?.trim();
    if stem.is_empty() { None } else { Some(stem.to_string()) }
}

/// Read a table written by [`save_table`] (or any UTF-8 CSV, BOM or not).
/// A zero-byte file reads as an empty table.
pub fn load_table(path: &Path) -> Result<Table, StoreError> {
    if !path.exists() {
        return Err(StoreError::MissingFile(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Table::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(body);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }

    debug!("Loaded {} rows from {:?}", rows.len(), path);
    Ok(Table::new(headers, rows)?)
}

/// Overwrite `path` with the table, UTF-8 with a leading BOM.
pub fn save_table(path: &Path, table: &Table) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row)?;
    }
    writer.flush()?;

    debug!("Wrote {} rows to {:?}", table.len(), path);
    Ok(())
}

pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "csv").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
