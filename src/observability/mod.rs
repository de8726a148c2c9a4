//! Observability for the validation engine
//!
//! Structured, synchronous JSON logging. The engine logs phase boundaries
//! and summary counts; per-cell findings go into the run report, not the
//! log.

mod logger;

pub use logger::{Level, Logger};
