use crate::error::TableError;
use chrono::NaiveDate;

// ── Table ─────────────────────────────────────────────────────────────────────

/// A rectangular table of string cells. The first column is the row key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headers.len())
        {
            return Err(TableError::RaggedRow {
                row,
                expected: headers.len(),
                found: cells.len(),
            });
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.headers, self.rows)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Name of the key column, if the table has any columns.
    pub fn key_column(&self) -> Option<&str> {
        self.headers.first().map(String::as_str)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Values of the key column, top to bottom.
    pub fn keys(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.first().map(String::as_str).unwrap_or(""))
            .collect()
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// One day's scrape of one stock code.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub code: String,
    pub date: NaiveDate,
    pub table: Table,
}

impl Snapshot {
    /// `YYYYMMDD`, as used in snapshot file names.
    pub fn date_stamp(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }
}

/// Suffix repeated header names (`name`, `name.1`, `name.2`, ...).
pub fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(headers.len());
    for h in headers {
        let mut candidate = h.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", h, n);
            n += 1;
        }
        seen.push(candidate);
    }
    seen
}
