//! Schema-build error types
//!
//! Every error here is fatal: the meta-schema must be internally consistent
//! before any data row is checked, so schema-build failures abort the run
//! with no partial report.

use thiserror::Error;

use crate::condition::ConditionError;

use super::structure::StructureError;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Fatal schema-build errors
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A datatype reference that resolves to no declared datatype
    #[error("unknown datatype '{name}' referenced by {referrer}")]
    UnknownDatatype { name: String, referrer: String },

    /// A table reference that resolves to no declared table
    #[error("unknown table '{name}' referenced by {referrer}")]
    UnknownTable { name: String, referrer: String },

    /// A column reference that resolves to no column of its target table
    #[error("unknown column '{table}.{column}' referenced by {referrer}")]
    UnknownColumn {
        table: String,
        column: String,
        referrer: String,
    },

    /// A required cell left blank in one of the meta-schema tables
    #[error("missing required field '{field}' in {file} row {row}")]
    MissingRequiredField {
        file: String,
        field: String,
        row: usize,
    },

    /// Two declarations claiming the same key
    #[error("duplicate {kind} '{key}'")]
    DuplicateKey { kind: &'static str, key: String },

    /// A cycle in the datatype parent graph
    #[error("datatype parent cycle: {cycle}")]
    CyclicDatatype { cycle: String },

    /// A template table included in a run with no binding for its placeholder
    #[error("no binding for placeholder '{placeholder}' required by table '{table}'")]
    UnboundPlaceholder { placeholder: String, table: String },

    /// One placeholder bound to conflicting values within a single run
    #[error("placeholder '{placeholder}' bound to both '{first}' and '{second}'")]
    AmbiguousBinding {
        placeholder: String,
        first: String,
        second: String,
    },

    /// A malformed structure expression on a column
    #[error("invalid structure for column '{table}.{column}': {source}")]
    Structure {
        table: String,
        column: String,
        #[source]
        source: StructureError,
    },

    /// A malformed condition expression on a datatype
    #[error("invalid condition for datatype '{datatype}': {source}")]
    Condition {
        datatype: String,
        #[source]
        source: ConditionError,
    },

    /// A table name that is neither concrete nor a single-placeholder template
    #[error("invalid table name '{name}': {reason}")]
    TableName { name: String, reason: String },

    /// A meta-schema file that cannot be read or lacks the expected header
    #[error("malformed {file}: {reason}")]
    InvalidFormat { file: String, reason: String },
}
