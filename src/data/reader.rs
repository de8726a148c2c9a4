//! Row ingestion for concrete tables
//!
//! Data files are tab-separated with a header row naming the table's columns
//! in declaration order. Rows are materialized as owned cell vectors aligned
//! positionally with the bound table's columns; short records are padded
//! with empty cells so ragged trailing tabs do not shift alignment.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::schema::BoundTable;

use super::errors::{DataError, DataResult};

/// An ordered sequence of raw cell values for one data row
pub type Row = Vec<String>;

/// All rows of one concrete table for a run
#[derive(Debug, Clone)]
pub struct TableData {
    pub name: String,
    pub rows: Vec<Row>,
}

impl TableData {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// Reads a bound table's rows from a TSV source, checking the header.
pub fn read_rows<R: Read>(source: R, table: &BoundTable, path: &str) -> DataResult<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(source);

    let headers = reader.headers().map_err(|e| DataError::Io {
        table: table.name.clone(),
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let expected: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    let found: Vec<&str> = headers.iter().collect();
    if expected != found {
        return Err(DataError::HeaderMismatch {
            table: table.name.clone(),
            expected: expected.join(", "),
            found: found.join(", "),
        });
    }

    let width = table.columns.len();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| DataError::Io {
            table: table.name.clone(),
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let mut row: Row = Vec::with_capacity(width);
        for i in 0..width {
            row.push(record.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Reads a bound table's rows from its declared path under `base`.
pub fn read_table(base: &Path, table: &BoundTable) -> DataResult<TableData> {
    let path = base.join(&table.path);
    let file = File::open(&path).map_err(|e| DataError::Io {
        table: table.name.clone(),
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let rows = read_rows(file, table, &path.display().to_string())?;
    Ok(TableData::new(table.name.clone(), rows))
}

/// Reads every bound table's rows from `base`.
pub fn read_all(base: &Path, tables: &[BoundTable]) -> DataResult<Vec<TableData>> {
    tables.iter().map(|t| read_table(base, t)).collect()
}
