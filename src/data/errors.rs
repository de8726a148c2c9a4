//! Data ingestion error types
//!
//! These fire before row validation starts, in the same fail-fast phase as
//! schema build: a table whose file cannot be read or whose header does not
//! line up with its declared columns cannot be validated positionally.

use thiserror::Error;

/// Result type for data ingestion
pub type DataResult<T> = Result<T, DataError>;

/// Errors produced while materializing a concrete table's rows
#[derive(Debug, Error)]
pub enum DataError {
    /// The data file cannot be read or parsed as TSV
    #[error("cannot read data for table '{table}' from {path}: {reason}")]
    Io {
        table: String,
        path: String,
        reason: String,
    },

    /// The file header disagrees with the bound table's declared columns
    #[error("header mismatch for table '{table}': expected [{expected}], found [{found}]")]
    HeaderMismatch {
        table: String,
        expected: String,
        found: String,
    },
}
