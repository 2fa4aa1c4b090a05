use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("row {row} has {found} cells, header has {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Why a page could not be turned into a table.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("timed out after {0:?} waiting for page")]
    Timeout(Duration),

    #[error("HTTP status {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("table #{0} not found, check the stock code")]
    TableNotFound(String),

    #[error("table #{0} has no header row")]
    NoHeaderRow(String),

    #[error("selector error: {0}")]
    Selector(String),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Failures reading or writing snapshot and master files.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid stock code {0:?}")]
    InvalidCode(String),

    #[error("{} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("unknown column {0:?}")]
    UnknownColumn(String),
}
