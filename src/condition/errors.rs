//! Condition parse errors
//!
//! All condition errors are schema-build errors: a datatype with a malformed
//! condition fails the load before any data is read.

use thiserror::Error;

/// Result type for condition parsing
pub type ConditionResult<T> = Result<T, ConditionError>;

/// Errors produced while parsing a condition expression
#[derive(Debug, Clone, Error)]
pub enum ConditionError {
    /// Input ended mid-expression
    #[error("condition ended unexpectedly, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    /// A character that does not fit the grammar at this position
    #[error("unexpected character {found:?} at byte {at}, expected {expected}")]
    Unexpected {
        found: char,
        at: usize,
        expected: &'static str,
    },

    /// A function name outside the grammar
    #[error("unknown condition function '{name}'")]
    UnknownFunction { name: String },

    /// A regex literal that failed to compile
    #[error("invalid pattern /{pattern}/: {reason}")]
    BadPattern { pattern: String, reason: String },

    /// Well-formed expression followed by extra input
    #[error("trailing input at byte {at}")]
    TrailingInput { at: usize },
}
