//! Per-row cell validation
//!
//! Every cell is checked against its column's effective condition: the
//! nulltype's when the cell is empty and the column declares one, the
//! datatype's otherwise. Rows have no data dependency on each other, so the
//! pass runs rows in parallel; each worker collects findings into its own
//! buffer and rayon merges them at the join point. The collect-all policy
//! means a single run surfaces every row-level problem.

use rayon::prelude::*;

use crate::data::Row;
use crate::schema::{BoundColumn, BoundTable, EffectiveConditions};

use super::diagnostics::Diagnostic;

/// Validates every cell of every row of one concrete table.
///
/// Diagnostics come back in arbitrary order; the report sorts post hoc.
pub fn validate_rows(
    table: &BoundTable,
    rows: &[Row],
    conditions: &EffectiveConditions,
) -> Vec<Diagnostic> {
    rows.par_iter()
        .enumerate()
        .flat_map_iter(|(index, row)| {
            let mut findings = Vec::new();
            // Diagnostics use 1-based data rows.
            validate_row(table, index + 1, row, conditions, &mut findings);
            findings
        })
        .collect()
}

fn validate_row(
    table: &BoundTable,
    row_number: usize,
    row: &Row,
    conditions: &EffectiveConditions,
    findings: &mut Vec<Diagnostic>,
) {
    for (position, column) in table.columns.iter().enumerate() {
        let value = row.get(position).map(String::as_str).unwrap_or("");
        if let Some(finding) = validate_cell(table, row_number, column, value, conditions) {
            findings.push(finding);
        }
    }
}

fn validate_cell(
    table: &BoundTable,
    row_number: usize,
    column: &BoundColumn,
    value: &str,
    conditions: &EffectiveConditions,
) -> Option<Diagnostic> {
    // An empty cell with a declared nulltype answers to the nulltype's
    // condition, not the datatype's.
    if value.is_empty() {
        if let Some(nulltype) = &column.nulltype {
            if conditions.accepts(nulltype, value) {
                return None;
            }
            return Some(Diagnostic::condition_failed(
                &table.name,
                row_number,
                &column.name,
                format!("empty cell does not satisfy nulltype '{}'", nulltype),
            ));
        }
    }

    if conditions.accepts(&column.datatype, value) {
        return None;
    }

    let condition = conditions
        .get(&column.datatype)
        .map(|c| c.to_string())
        .unwrap_or_default();
    Some(Diagnostic::condition_failed(
        &table.name,
        row_number,
        &column.name,
        format!(
            "value '{}' does not satisfy {} of datatype '{}'",
            value, condition, column.datatype
        ),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::condition::Condition;
    use crate::schema::{BoundColumn, Datatype};

    use super::*;

    fn conditions() -> EffectiveConditions {
        let mut datatypes = BTreeMap::new();
        for (name, parent, condition) in [
            ("text", None, None),
            ("empty", Some("text"), Some("blank")),
            ("word", Some("text"), Some("match(/\\S+/)")),
            ("ontology_label", Some("word"), None),
        ] {
            datatypes.insert(
                name.to_string(),
                Datatype {
                    name: name.to_string(),
                    parent: parent.map(String::from),
                    condition: condition.map(|c: &str| Condition::parse(c).unwrap()),
                },
            );
        }
        EffectiveConditions::resolve(&datatypes).unwrap()
    }

    fn table(columns: Vec<BoundColumn>) -> BoundTable {
        BoundTable {
            name: "T1".to_string(),
            path: "T1.tsv".to_string(),
            table_type: None,
            columns,
        }
    }

    fn column(name: &str, datatype: &str, nulltype: Option<&str>) -> BoundColumn {
        BoundColumn {
            name: name.to_string(),
            nulltype: nulltype.map(String::from),
            datatype: datatype.to_string(),
            structure: None,
        }
    }

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_inherited_condition_enforced() {
        let table = table(vec![column("label", "ontology_label", None)]);
        let rows = vec![row(&["NeuronA"]), row(&["Neuron type A"])];
        let findings = validate_rows(&table, &rows, &conditions());

        // ontology_label inherits word's no-whitespace rule.
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].row, Some(2));
        assert!(findings[0].message.contains("Neuron type A"));
    }

    #[test]
    fn test_nulltype_overrides_on_empty_cell() {
        let table = table(vec![column("parent", "word", Some("empty"))]);
        // word rejects "", but the nulltype accepts it.
        let findings = validate_rows(&table, &[row(&[""])], &conditions());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_empty_cell_without_nulltype_uses_datatype() {
        let table = table(vec![column("accession", "word", None)]);
        let findings = validate_rows(&table, &[row(&[""])], &conditions());
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_nulltype_does_not_shadow_nonempty_cells() {
        let table = table(vec![column("parent", "word", Some("empty"))]);
        let findings = validate_rows(&table, &[row(&["has space"])], &conditions());
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_collect_all_does_not_stop_at_first_failure() {
        let table = table(vec![
            column("a", "word", None),
            column("b", "word", None),
        ]);
        let rows = vec![row(&["bad one", "bad two"]), row(&["", "also bad "])];
        let findings = validate_rows(&table, &rows, &conditions());
        assert_eq!(findings.len(), 4);
    }

    #[test]
    fn test_missing_trailing_cells_validate_as_empty() {
        let table = table(vec![
            column("a", "word", None),
            column("b", "word", Some("empty")),
        ]);
        // Row shorter than the column list: the absent cell is empty.
        let findings = validate_rows(&table, &[row(&["x"])], &conditions());
        assert!(findings.is_empty());
    }

    #[test]
    fn test_condition_free_datatype_accepts_anything() {
        let table = table(vec![column("note", "text", None)]);
        let rows = vec![row(&["anything at all"]), row(&[""])];
        let findings = validate_rows(&table, &rows, &conditions());
        assert!(findings.is_empty());
    }
}
