//! Run orchestration
//!
//! The phase state machine for one validation run:
//!
//! ```text
//! schema build (elsewhere, terminal on failure)
//!   -> expand templates
//!   -> validate rows        (parallel, collect-all)
//!   -> resolve references   (after all rows of all tables are in)
//!   -> report
//! ```
//!
//! Reference resolution must not start before row validation has finished
//! for every table; the sequential phase order here is that barrier. A run
//! may be cancelled between phases, in which case its report is marked
//! partial and never presented as complete. No state carries across runs.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::{self, DataResult, Row, TableData};
use crate::observability::Logger;
use crate::schema::{BoundTable, Schema, SchemaResult, TemplateBinding};

use super::diagnostics::{Diagnostic, Report};
use super::refs::resolve_references;
use super::rows::validate_rows;

/// Cooperative cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// One validation run over a concrete table set
pub struct ValidationRun<'a> {
    schema: &'a Schema,
    tables: Vec<BoundTable>,
    data: Vec<TableData>,
}

impl<'a> ValidationRun<'a> {
    /// Expands the schema under the given bindings, producing the run's
    /// concrete table set. Fails fast on unbound or ambiguous placeholders
    /// and on structure targets that do not resolve.
    pub fn bind(schema: &'a Schema, bindings: &[TemplateBinding]) -> SchemaResult<Self> {
        let tables = schema.expand(bindings)?;
        Logger::trace(
            "templates_expanded",
            &[("tables", &tables.len().to_string())],
        );
        Ok(Self {
            schema,
            tables,
            data: Vec::new(),
        })
    }

    /// The run's concrete tables, in schema declaration order.
    pub fn tables(&self) -> &[BoundTable] {
        &self.tables
    }

    /// Reads every table's rows from its declared path under `base`.
    pub fn load_data(&mut self, base: &Path) -> DataResult<()> {
        self.data = data::read_all(base, &self.tables)?;
        Ok(())
    }

    /// Supplies rows for one table directly (tests, in-memory callers).
    ///
    /// Returns false when the run has no table of that name.
    pub fn insert_rows(&mut self, table: &str, rows: Vec<Row>) -> bool {
        if !self.tables.iter().any(|t| t.name == table) {
            return false;
        }
        self.data.retain(|d| d.name != table);
        self.data.push(TableData::new(table, rows));
        true
    }

    /// Runs row validation and reference resolution to completion.
    pub fn execute(&self) -> Report {
        self.execute_with_cancel(&CancelToken::new())
    }

    /// Runs the validation phases, checking the token between them.
    pub fn execute_with_cancel(&self, token: &CancelToken) -> Report {
        let mut report = Report::new();
        Logger::info(
            "run_started",
            &[
                ("run_id", &report.run_id.to_string()),
                ("tables", &self.tables.len().to_string()),
            ],
        );

        report.extend(structure_warnings(&self.tables, self.schema));

        if token.is_cancelled() {
            return self.abandon(report);
        }

        // Row validation: tables in order, rows in parallel within each.
        for table in &self.tables {
            let rows = self
                .data
                .iter()
                .find(|d| d.name == table.name)
                .map(|d| d.rows.as_slice())
                .unwrap_or(&[]);
            report.extend(validate_rows(table, rows, self.schema.conditions()));
        }

        // Barrier: reference resolution only sees fully validated tables.
        if token.is_cancelled() {
            return self.abandon(report);
        }

        report.extend(resolve_references(&self.tables, &self.data));

        report.sort();
        Logger::info(
            "run_finished",
            &[
                ("run_id", &report.run_id.to_string()),
                ("errors", &report.error_count().to_string()),
                ("warnings", &report.warning_count().to_string()),
            ],
        );
        report
    }

    fn abandon(&self, mut report: Report) -> Report {
        report.mark_partial();
        report.sort();
        Logger::warn(
            "run_cancelled",
            &[("run_id", &report.run_id.to_string())],
        );
        report
    }
}

/// Bind-time warnings: a `primary`/`unique` column whose datatype admits
/// blank values is not reliably set-comparable. A warning, never fatal.
fn structure_warnings(tables: &[BoundTable], schema: &Schema) -> Vec<Diagnostic> {
    let mut findings = Vec::new();
    for table in tables {
        for column in &table.columns {
            let requires_unique = column
                .structure
                .as_ref()
                .map(|s| s.requires_unique())
                .unwrap_or(false);
            if !requires_unique {
                continue;
            }
            let accepts_blank = match schema.effective_condition(&column.datatype) {
                Some(condition) => condition.accepts_blank(),
                None => true,
            };
            if accepts_blank {
                findings.push(Diagnostic::structure_mismatch(
                    &table.name,
                    &column.name,
                    format!(
                        "datatype '{}' admits blank values, weak fit for a {} column",
                        column.datatype,
                        column.structure.as_ref().map(|s| s.to_string()).unwrap_or_default(),
                    ),
                ));
            }
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;
    use crate::validate::diagnostics::Rule;

    use super::*;

    const TABLE_TSV: &str = "table\tpath\ttype\tdescription\n\
        prefix\tprefix.tsv\t\t\n\
        {taxonomy_id}\t{taxonomy_id}.tsv\t\t\n";

    const COLUMN_TSV: &str = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
        prefix\tprefix\t\tword\tprimary\t\n\
        {taxonomy_id}\tcell_set_accession\t\tword\tprimary\t\n\
        {taxonomy_id}\tparent_cell_set_accession\tempty\tword\ttree(cell_set_accession)\t\n\
        {taxonomy_id}\tprefix\tempty\tword\tfrom(prefix.prefix)\t\n";

    const DATATYPE_TSV: &str = "datatype\tparent\tcondition\n\
        text\t\t\n\
        empty\ttext\tblank\n\
        word\ttext\tmatch(/\\S+/)\n";

    fn schema() -> Schema {
        Schema::from_readers(
            TABLE_TSV.as_bytes(),
            COLUMN_TSV.as_bytes(),
            DATATYPE_TSV.as_bytes(),
        )
        .unwrap()
    }

    fn binding(value: &str) -> TemplateBinding {
        let mut b = TemplateBinding::new();
        b.bind("taxonomy_id", value).unwrap();
        b
    }

    fn rows(cells: &[&[&str]]) -> Vec<Row> {
        cells
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_clean_run_succeeds() {
        let schema = schema();
        let mut run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        assert!(run.insert_rows("prefix", rows(&[&["CL"]])));
        assert!(run.insert_rows(
            "T1",
            rows(&[&["root", "", "CL"], &["child", "root", ""]])
        ));

        let report = run.execute();
        assert!(report.is_success(), "diagnostics: {:?}", report.diagnostics);
    }

    #[test]
    fn test_findings_from_all_phases_accumulate() {
        let schema = schema();
        let mut run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        run.insert_rows("prefix", rows(&[&["CL"]]));
        run.insert_rows(
            "T1",
            rows(&[
                // Bad word, cycle with row 2, dangling prefix.
                &["has space", "child", "GHOST"],
                &["child", "has space", ""],
            ]),
        );

        let report = run.execute();
        assert!(!report.is_success());
        let rules: Vec<Rule> = report.diagnostics.iter().map(|d| d.rule).collect();
        assert!(rules.contains(&Rule::ConditionFailed));
        assert!(rules.contains(&Rule::CyclicRow));
        assert!(rules.contains(&Rule::DanglingReference));
    }

    #[test]
    fn test_bindings_are_independent() {
        let schema = schema();
        let mut run =
            ValidationRun::bind(&schema, &[binding("A1"), binding("B2")]).unwrap();
        run.insert_rows("prefix", rows(&[&["CL"]]));
        // A1 references a missing prefix; B2 is clean.
        run.insert_rows("A1", rows(&[&["x", "", "GHOST"]]));
        run.insert_rows("B2", rows(&[&["y", "", "CL"]]));

        let report = run.execute();
        let dangling: Vec<&str> = report
            .diagnostics
            .iter()
            .filter(|d| d.rule == Rule::DanglingReference)
            .map(|d| d.table.as_str())
            .collect();
        assert_eq!(dangling, vec!["A1"]);
    }

    #[test]
    fn test_missing_table_data_validates_as_empty() {
        let schema = schema();
        let mut run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        run.insert_rows("prefix", rows(&[&["CL"]]));

        let report = run.execute();
        assert!(report.is_success());
    }

    #[test]
    fn test_cancelled_run_is_partial() {
        let schema = schema();
        let run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let report = run.execute_with_cancel(&token);
        assert!(report.partial);
        assert!(!report.is_success());
    }

    #[test]
    fn test_insert_rows_rejects_unknown_table() {
        let schema = schema();
        let mut run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        assert!(!run.insert_rows("nowhere", rows(&[&["x"]])));
    }

    #[test]
    fn test_report_is_sorted_by_location() {
        let schema = schema();
        let mut run = ValidationRun::bind(&schema, &[binding("T1")]).unwrap();
        run.insert_rows("prefix", rows(&[&["CL"], &["CL"]]));
        run.insert_rows("T1", rows(&[&["a b", "", ""], &["c d", "", ""]]));

        let report = run.execute();
        let locations: Vec<(&str, Option<usize>)> = report
            .diagnostics
            .iter()
            .map(|d| (d.table.as_str(), d.row))
            .collect();
        let mut sorted = locations.clone();
        sorted.sort();
        assert_eq!(locations, sorted);
    }
}
