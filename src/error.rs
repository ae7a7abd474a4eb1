// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Failures the ingestion pipeline distinguishes between.
///
/// Only `SourceNotFound` and `Config` end the run; the others are scoped to a
/// sheet or a single record and are logged before moving on.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("workbook {path:?} could not be opened: {reason}")]
    SourceNotFound { path: PathBuf, reason: String },

    #[error("sheet '{sheet}' is malformed: {reason}")]
    MalformedSheet { sheet: String, reason: String },

    #[error("sheet '{sheet}' row {row}: field {field} resolved to {value:?}, not a valid code (raw row: {raw:?})")]
    InvalidNormalizedValue {
        sheet: String,
        row: usize,
        field: String,
        value: String,
        raw: Vec<(String, String)>,
    },

    #[error("sheet '{sheet}' row {row}: insert rejected: {source}")]
    PersistenceFailure {
        sheet: String,
        row: usize,
        #[source]
        source: rusqlite::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    pub fn malformed(sheet: &str, reason: impl Into<String>) -> Self {
        IngestError::MalformedSheet {
            sheet: sheet.to_string(),
            reason: reason.into(),
        }
    }
}
