//! Run-time table data
//!
//! Concrete tables and their rows are per-run transients: produced from the
//! expanded table set plus input TSVs, validated, and discarded. Nothing
//! here mutates the schema graph.

mod errors;
mod reader;

pub use errors::{DataError, DataResult};
pub use reader::{read_all, read_rows, read_table, Row, TableData};
