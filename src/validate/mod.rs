//! Validation subsystem
//!
//! # Design principles
//!
//! - Collect-all: row and reference findings accumulate, they never abort
//! - Rows are independent; row validation runs in parallel with per-worker
//!   buffers merged at the join point
//! - Reference resolution waits for the row barrier
//! - The schema graph is shared read-only; the report is the only mutable
//!   run state

mod diagnostics;
mod refs;
mod rows;
mod run;

pub use diagnostics::{Diagnostic, Report, Rule, Severity};
pub use refs::resolve_references;
pub use rows::validate_rows;
pub use run::{CancelToken, ValidationRun};
