//! CLI-specific error types
//!
//! Everything here aborts the invocation; validation findings are not
//! errors in this sense, they are the report's content.

use std::fmt;
use std::io;

use crate::data::DataError;
use crate::schema::SchemaError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error
    IoError,
    /// Meta-schema failed to build
    SchemaError,
    /// Data ingestion failed
    DataError,
    /// Git invocation failed during seeding
    GitError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "TDT_CLI_CONFIG_ERROR",
            Self::IoError => "TDT_CLI_IO_ERROR",
            Self::SchemaError => "TDT_CLI_SCHEMA_ERROR",
            Self::DataError => "TDT_CLI_DATA_ERROR",
            Self::GitError => "TDT_CLI_GIT_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Git error
    pub fn git_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::GitError, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<SchemaError> for CliError {
    fn from(e: SchemaError) -> Self {
        Self::new(CliErrorCode::SchemaError, e.to_string())
    }
}

impl From<DataError> for CliError {
    fn from(e: DataError) -> Self {
        Self::new(CliErrorCode::DataError, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
