//! Validation diagnostics and the run report
//!
//! Row- and reference-level findings never abort a run; they accumulate into
//! a run-scoped report returned to the caller, who decides exit behavior. A
//! run with zero error-severity diagnostics succeeds; warnings alone do not
//! affect success.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Finding severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// The rule that produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// A cell does not satisfy its datatype or nulltype condition
    ConditionFailed,
    /// A value that fails to resolve against its `from` or `tree` target
    DanglingReference,
    /// A row participating in a `tree` parent cycle
    CyclicRow,
    /// A duplicated value under a `primary` or `unique` constraint
    DuplicateValue,
    /// A structure constraint on a column whose datatype cannot support it
    StructureMismatch,
}

/// One validation finding, located as precisely as the rule allows.
///
/// Row indices are 1-based data rows; the file header is not counted.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub rule: Rule,
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// A failed datatype or nulltype condition on one cell.
    pub fn condition_failed(
        table: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            rule: Rule::ConditionFailed,
            table: table.into(),
            row: Some(row),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// A value missing from its `from` or `tree` target.
    pub fn dangling_reference(
        table: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            rule: Rule::DanglingReference,
            table: table.into(),
            row: Some(row),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// A row on a `tree` parent cycle.
    pub fn cyclic_row(
        table: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            rule: Rule::CyclicRow,
            table: table.into(),
            row: Some(row),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// A duplicated value under a uniqueness constraint.
    pub fn duplicate_value(
        table: impl Into<String>,
        row: usize,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            rule: Rule::DuplicateValue,
            table: table.into(),
            row: Some(row),
            column: Some(column.into()),
            message: message.into(),
        }
    }

    /// A schema-level warning against a column, not a data row.
    pub fn structure_mismatch(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            rule: Rule::StructureMismatch,
            table: table.into(),
            row: None,
            column: Some(column.into()),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// The run-scoped accumulation of findings
#[derive(Debug, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// True when the run was cancelled between phases; a partial report must
    /// never be presented as complete.
    pub partial: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            partial: false,
            diagnostics: Vec::new(),
        }
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn mark_partial(&mut self) {
        self.partial = true;
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.diagnostics.len() - self.error_count()
    }

    /// Zero error-severity findings and not partial.
    pub fn is_success(&self) -> bool {
        !self.partial && self.error_count() == 0
    }

    /// Stable report ordering: parallel merge order is arbitrary, so the
    /// report is sorted post hoc by (table, row, column).
    pub fn sort(&mut self) {
        self.diagnostics.sort_by(|a, b| {
            (&a.table, a.row, &a.column).cmp(&(&b.table, b.row, &b.column))
        });
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_no_errors() {
        let mut report = Report::new();
        assert!(report.is_success());

        report.extend([Diagnostic::structure_mismatch("t", "c", "warned")]);
        assert!(report.is_success());
        assert_eq!(report.warning_count(), 1);

        report.extend([Diagnostic::condition_failed("t", 1, "c", "failed")]);
        assert!(!report.is_success());
        assert_eq!(report.error_count(), 1);
    }

    #[test]
    fn test_partial_report_never_succeeds() {
        let mut report = Report::new();
        report.mark_partial();
        assert!(!report.is_success());
    }

    #[test]
    fn test_sort_orders_by_location() {
        let mut report = Report::new();
        report.extend([
            Diagnostic::condition_failed("b", 2, "y", "m"),
            Diagnostic::condition_failed("a", 9, "x", "m"),
            Diagnostic::condition_failed("b", 1, "z", "m"),
        ]);
        report.sort();
        let order: Vec<(&str, Option<usize>)> = report
            .diagnostics
            .iter()
            .map(|d| (d.table.as_str(), d.row))
            .collect();
        assert_eq!(order, vec![("a", Some(9)), ("b", Some(1)), ("b", Some(2))]);
    }

    #[test]
    fn test_report_serializes() {
        let mut report = Report::new();
        report.extend([Diagnostic::dangling_reference("t", 3, "c", "missing 'x'")]);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["diagnostics"][0]["rule"], "dangling_reference");
        assert_eq!(value["diagnostics"][0]["row"], 3);
        assert_eq!(value["partial"], false);
    }
}
