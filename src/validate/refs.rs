//! Cross-table reference resolution
//!
//! Runs after the row-validation barrier: every check here needs a complete
//! column value set, either from another table (`from`), from the same
//! table's key column (`tree`), or from the column itself (`primary` /
//! `unique` duplicates). Findings are collected, never aborting the run;
//! a row cycle is an error finding reported against every row on the cycle.

use std::collections::{HashMap, HashSet};

use crate::data::{Row, TableData};
use crate::schema::{BoundTable, Structure};

use super::diagnostics::Diagnostic;

/// Resolves all structural constraints across the run's table set.
pub fn resolve_references(tables: &[BoundTable], data: &[TableData]) -> Vec<Diagnostic> {
    let tables_by_name: HashMap<&str, &BoundTable> =
        tables.iter().map(|t| (t.name.as_str(), t)).collect();
    let rows_by_table: HashMap<&str, &[Row]> = data
        .iter()
        .map(|d| (d.name.as_str(), d.rows.as_slice()))
        .collect();

    let mut findings = Vec::new();
    for table in tables {
        let rows = rows_by_table
            .get(table.name.as_str())
            .copied()
            .unwrap_or(&[]);
        for (position, column) in table.columns.iter().enumerate() {
            match &column.structure {
                Some(Structure::From {
                    table: target_table,
                    column: target_column,
                }) => {
                    let target_values = collect_target_values(
                        target_table,
                        target_column,
                        &tables_by_name,
                        &rows_by_table,
                    );
                    check_from(
                        table,
                        rows,
                        position,
                        target_table,
                        target_column,
                        &target_values,
                        &mut findings,
                    );
                }
                Some(Structure::Tree { column: key_column }) => {
                    check_tree(table, rows, position, key_column, &mut findings);
                }
                Some(structure) if structure.requires_unique() => {
                    let primary = matches!(structure, Structure::Primary);
                    check_unique(table, rows, position, primary, &mut findings);
                }
                _ => {}
            }
        }
    }
    findings
}

/// The non-empty value set of `target_table.target_column`.
///
/// Target existence was verified at bind time; only its row data can be
/// absent here, in which case every reference dangles.
fn collect_target_values<'a>(
    target_table: &str,
    target_column: &str,
    tables_by_name: &HashMap<&str, &BoundTable>,
    rows_by_table: &HashMap<&str, &'a [Row]>,
) -> HashSet<&'a str> {
    let Some(target) = tables_by_name.get(target_table) else {
        return HashSet::new();
    };
    let Some(position) = target.column_index(target_column) else {
        return HashSet::new();
    };
    let rows = rows_by_table.get(target_table).copied().unwrap_or(&[]);
    rows.iter()
        .map(|row| cell(row, position))
        .filter(|v| !v.is_empty())
        .collect()
}

/// Every non-empty source value must appear in the target column.
fn check_from(
    table: &BoundTable,
    rows: &[Row],
    position: usize,
    target_table: &str,
    target_column: &str,
    target_values: &HashSet<&str>,
    findings: &mut Vec<Diagnostic>,
) {
    let column = &table.columns[position];
    for (index, row) in rows.iter().enumerate() {
        let value = cell(row, position);
        if value.is_empty() || target_values.contains(value) {
            continue;
        }
        findings.push(Diagnostic::dangling_reference(
            &table.name,
            index + 1,
            &column.name,
            format!(
                "value '{}' not found in {}.{}",
                value, target_table, target_column
            ),
        ));
    }
}

/// Parent-pointer column: every non-empty parent must exist among the key
/// column's values, and following parents must never loop.
fn check_tree(
    table: &BoundTable,
    rows: &[Row],
    position: usize,
    key_column: &str,
    findings: &mut Vec<Diagnostic>,
) {
    let key_position = match table.column_index(key_column) {
        Some(idx) => idx,
        // Verified at bind time; unreachable in a bound table.
        None => return,
    };
    let column = &table.columns[position];

    // First occurrence wins for duplicate keys; the duplicates themselves
    // are the uniqueness check's finding, not this one's.
    let mut key_to_row: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let key = cell(row, key_position);
        if !key.is_empty() {
            key_to_row.entry(key).or_insert(index);
        }
    }

    let mut parent: Vec<Option<usize>> = vec![None; rows.len()];
    for (index, row) in rows.iter().enumerate() {
        let value = cell(row, position);
        if value.is_empty() {
            continue;
        }
        match key_to_row.get(value) {
            Some(&parent_index) => parent[index] = Some(parent_index),
            None => findings.push(Diagnostic::dangling_reference(
                &table.name,
                index + 1,
                &column.name,
                format!(
                    "parent '{}' not found among values of '{}'",
                    value, key_column
                ),
            )),
        }
    }

    for index in find_cycle_rows(&parent) {
        let key = cell(&rows[index], key_position);
        findings.push(Diagnostic::cyclic_row(
            &table.name,
            index + 1,
            &column.name,
            format!("row '{}' participates in a parent cycle", key),
        ));
    }
}

/// Cycle members of a functional parent graph (each node has at most one
/// outgoing edge). Rows that merely lead into a cycle are not members.
fn find_cycle_rows(parent: &[Option<usize>]) -> Vec<usize> {
    const UNKNOWN: u8 = 0;
    const VISITING: u8 = 1;
    const DONE: u8 = 2;
    const CYCLIC: u8 = 3;

    let mut state = vec![UNKNOWN; parent.len()];
    for start in 0..parent.len() {
        if state[start] != UNKNOWN {
            continue;
        }
        let mut path = Vec::new();
        let mut current = start;
        loop {
            match state[current] {
                DONE | CYCLIC => break,
                VISITING => {
                    // Re-entered the current walk: everything from the first
                    // occurrence onward is on the cycle.
                    let cycle_start = path
                        .iter()
                        .position(|&node| node == current)
                        .unwrap_or(0);
                    for &node in &path[cycle_start..] {
                        state[node] = CYCLIC;
                    }
                    break;
                }
                _ => {
                    state[current] = VISITING;
                    path.push(current);
                    match parent[current] {
                        Some(next) => current = next,
                        None => break,
                    }
                }
            }
        }
        for &node in &path {
            if state[node] == VISITING {
                state[node] = DONE;
            }
        }
    }

    (0..parent.len()).filter(|&i| state[i] == CYCLIC).collect()
}

/// Duplicate detection for `primary`/`unique` columns.
///
/// `unique` ignores empty cells (they answer to the nulltype); `primary`
/// counts them.
fn check_unique(
    table: &BoundTable,
    rows: &[Row],
    position: usize,
    primary: bool,
    findings: &mut Vec<Diagnostic>,
) {
    let column = &table.columns[position];
    let mut counts: HashMap<&str, usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        let value = cell(row, position);
        if value.is_empty() && !primary {
            continue;
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let label = if primary { "primary" } else { "unique" };
    for (index, row) in rows.iter().enumerate() {
        let value = cell(row, position);
        if value.is_empty() && !primary {
            continue;
        }
        if counts.get(value).copied().unwrap_or(0) > 1 {
            findings.push(Diagnostic::duplicate_value(
                &table.name,
                index + 1,
                &column.name,
                format!("value '{}' duplicated in {} column", value, label),
            ));
        }
    }
}

fn cell<'a>(row: &'a Row, position: usize) -> &'a str {
    row.get(position).map(String::as_str).unwrap_or("")
}
