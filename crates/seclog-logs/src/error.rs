use std::path::PathBuf;

use thiserror::Error;

/// Request-level fetch failures, raised before any channel is opened
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid date {value:?}, expected YYYY-MM-DD")]
    InvalidDateFormat { value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    /// Informational: a monitor loop is already running
    #[error("already monitoring")]
    AlreadyMonitoring,
}

#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing to export; no file was created
    #[error("no log records to export")]
    NoData,

    /// The destination could not be written; it may be left partially written
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
