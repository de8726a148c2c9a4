//! Meta-schema loader
//!
//! Reads the three meta-schema tables (`table.tsv`, `column.tsv`,
//! `datatype.tsv`) into the schema graph. All files are tab-separated with a
//! required header row; an empty cell is an absent optional value. The load
//! is one pass and fails fast: any structural problem aborts before data
//! validation can start.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::condition::Condition;

use super::errors::{SchemaError, SchemaResult};
use super::structure::Structure;
use super::types::{Column, Datatype, Schema, Table, TableName};

/// Expected header of `table.tsv`
const TABLE_HEADERS: [&str; 4] = ["table", "path", "type", "description"];
/// Expected header of `column.tsv`
const COLUMN_HEADERS: [&str; 6] = [
    "table",
    "column",
    "nulltype",
    "datatype",
    "structure",
    "description",
];
/// Expected header of `datatype.tsv`
const DATATYPE_HEADERS: [&str; 3] = ["datatype", "parent", "condition"];

impl Schema {
    /// Loads the meta-schema from a directory containing `table.tsv`,
    /// `column.tsv` and `datatype.tsv`.
    pub fn load(dir: &Path) -> SchemaResult<Schema> {
        Schema::load_files(
            &dir.join("table.tsv"),
            &dir.join("column.tsv"),
            &dir.join("datatype.tsv"),
        )
    }

    /// Loads the meta-schema from three explicit file paths.
    pub fn load_files(table: &Path, column: &Path, datatype: &Path) -> SchemaResult<Schema> {
        Schema::from_readers(
            open(table, "table.tsv")?,
            open(column, "column.tsv")?,
            open(datatype, "datatype.tsv")?,
        )
    }

    /// Builds the meta-schema from in-memory sources.
    pub fn from_readers<T, C, D>(table: T, column: C, datatype: D) -> SchemaResult<Schema>
    where
        T: Read,
        C: Read,
        D: Read,
    {
        let datatypes = read_datatypes(datatype)?;
        let mut tables = read_tables(table)?;
        attach_columns(column, &mut tables, &datatypes)?;
        Schema::build(tables, datatypes)
    }
}

fn open(path: &Path, label: &'static str) -> SchemaResult<File> {
    File::open(path).map_err(|e| SchemaError::InvalidFormat {
        file: label.to_string(),
        reason: format!("cannot open {}: {}", path.display(), e),
    })
}

/// A tab-separated meta-schema file with its header resolved by name.
struct MetaTsv<R: Read> {
    file: &'static str,
    reader: csv::Reader<R>,
    header_index: Vec<usize>,
}

impl<R: Read> MetaTsv<R> {
    fn new(source: R, file: &'static str, expected: &[&str]) -> SchemaResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_reader(source);
        let headers = reader
            .headers()
            .map_err(|e| SchemaError::InvalidFormat {
                file: file.to_string(),
                reason: e.to_string(),
            })?
            .clone();
        let mut header_index = Vec::with_capacity(expected.len());
        for name in expected {
            let position = headers.iter().position(|h| h == *name).ok_or_else(|| {
                SchemaError::InvalidFormat {
                    file: file.to_string(),
                    reason: format!("missing header column '{}'", name),
                }
            })?;
            header_index.push(position);
        }
        Ok(Self {
            file,
            reader,
            header_index,
        })
    }

    /// Yields each data row as fixed-order cells, with its 1-based file line
    /// (the header is line 1).
    fn rows(mut self) -> SchemaResult<Vec<(usize, Vec<String>)>> {
        let mut out = Vec::new();
        for (i, record) in self.reader.records().enumerate() {
            let record = record.map_err(|e| SchemaError::InvalidFormat {
                file: self.file.to_string(),
                reason: e.to_string(),
            })?;
            let cells = self
                .header_index
                .iter()
                .map(|&idx| record.get(idx).unwrap_or("").to_string())
                .collect();
            out.push((i + 2, cells));
        }
        Ok(out)
    }
}

fn require(
    file: &'static str,
    field: &'static str,
    row: usize,
    value: &str,
) -> SchemaResult<String> {
    if value.is_empty() {
        return Err(SchemaError::MissingRequiredField {
            file: file.to_string(),
            field: field.to_string(),
            row,
        });
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn read_datatypes<R: Read>(source: R) -> SchemaResult<BTreeMap<String, Datatype>> {
    let file = "datatype.tsv";
    let mut datatypes = BTreeMap::new();

    for (row, cells) in MetaTsv::new(source, file, &DATATYPE_HEADERS)?.rows()? {
        let name = require(file, "datatype", row, &cells[0])?;
        let parent = optional(&cells[1]);
        let condition = match optional(&cells[2]) {
            Some(source_text) => Some(Condition::parse(&source_text).map_err(|e| {
                SchemaError::Condition {
                    datatype: name.clone(),
                    source: e,
                }
            })?),
            None => None,
        };
        if datatypes.contains_key(&name) {
            return Err(SchemaError::DuplicateKey {
                kind: "datatype",
                key: name,
            });
        }
        datatypes.insert(
            name.clone(),
            Datatype {
                name,
                parent,
                condition,
            },
        );
    }

    // Parent resolution and cycle detection happen in Schema::build; unknown
    // parents surface there with the referring datatype named.
    Ok(datatypes)
}

fn read_tables<R: Read>(source: R) -> SchemaResult<Vec<Table>> {
    let file = "table.tsv";
    let mut tables = Vec::new();

    for (row, cells) in MetaTsv::new(source, file, &TABLE_HEADERS)?.rows()? {
        let raw_name = require(file, "table", row, &cells[0])?;
        let path = require(file, "path", row, &cells[1])?;
        tables.push(Table {
            name: TableName::parse(&raw_name)?,
            path,
            table_type: optional(&cells[2]),
            description: cells[3].clone(),
            columns: Vec::new(),
        });
    }

    Ok(tables)
}

fn attach_columns<R: Read>(
    source: R,
    tables: &mut [Table],
    datatypes: &BTreeMap<String, Datatype>,
) -> SchemaResult<()> {
    let file = "column.tsv";

    for (row, cells) in MetaTsv::new(source, file, &COLUMN_HEADERS)?.rows()? {
        let table_name = require(file, "table", row, &cells[0])?;
        let column_name = require(file, "column", row, &cells[1])?;
        let nulltype = optional(&cells[2]);
        let datatype = require(file, "datatype", row, &cells[3])?;
        let structure = match optional(&cells[4]) {
            Some(source_text) => Some(Structure::parse(&source_text).map_err(|e| {
                SchemaError::Structure {
                    table: table_name.clone(),
                    column: column_name.clone(),
                    source: e,
                }
            })?),
            None => None,
        };

        let referrer = format!("column '{}.{}'", table_name, column_name);
        if !datatypes.contains_key(&datatype) {
            return Err(SchemaError::UnknownDatatype {
                name: datatype,
                referrer,
            });
        }
        if let Some(nulltype_name) = &nulltype {
            if !datatypes.contains_key(nulltype_name) {
                return Err(SchemaError::UnknownDatatype {
                    name: nulltype_name.clone(),
                    referrer,
                });
            }
        }

        let table = tables
            .iter_mut()
            .find(|t| t.name.raw() == table_name)
            .ok_or_else(|| SchemaError::UnknownTable {
                name: table_name.clone(),
                referrer: format!("column.tsv row {}", row),
            })?;
        if table.column(&column_name).is_some() {
            return Err(SchemaError::DuplicateKey {
                kind: "column",
                key: format!("{}.{}", table_name, column_name),
            });
        }
        table.columns.push(Column {
            table: table_name,
            name: column_name,
            nulltype,
            datatype,
            structure,
            description: cells[5].clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const TABLE_TSV: &str = "table\tpath\ttype\tdescription\n\
        prefix\tcuration_tables/prefix.tsv\t\tIRI prefixes\n\
        {taxonomy_id}\tcuration_tables/{taxonomy_id}.tsv\t\tCell set curation\n";

    const COLUMN_TSV: &str = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
        prefix\tprefix\t\tword\tprimary\tShort prefix\n\
        prefix\tbase\t\tword\t\tExpansion IRI\n\
        {taxonomy_id}\tcell_set_accession\t\tword\tprimary\tAccession\n\
        {taxonomy_id}\tparent_cell_set_accession\tempty\tword\ttree(cell_set_accession)\tParent accession\n";

    const DATATYPE_TSV: &str = "datatype\tparent\tcondition\n\
        text\t\t\n\
        empty\ttext\tblank\n\
        word\ttext\tmatch(/\\S+/)\n";

    fn load(table: &str, column: &str, datatype: &str) -> SchemaResult<Schema> {
        Schema::from_readers(table.as_bytes(), column.as_bytes(), datatype.as_bytes())
    }

    #[test]
    fn test_load_well_formed_schema() {
        let schema = load(TABLE_TSV, COLUMN_TSV, DATATYPE_TSV).unwrap();
        assert_eq!(schema.tables().count(), 2);

        let prefix = schema.table("prefix").unwrap();
        assert_eq!(prefix.columns.len(), 2);
        assert_eq!(prefix.columns[0].structure, Some(Structure::Primary));

        let taxonomy = schema.table("{taxonomy_id}").unwrap();
        assert!(taxonomy.name.is_template());
        let parent = taxonomy.column("parent_cell_set_accession").unwrap();
        assert_eq!(parent.nulltype.as_deref(), Some("empty"));
        assert_eq!(
            parent.structure,
            Some(Structure::Tree {
                column: "cell_set_accession".into()
            })
        );
    }

    #[test]
    fn test_column_order_is_declaration_order() {
        let schema = load(TABLE_TSV, COLUMN_TSV, DATATYPE_TSV).unwrap();
        let names: Vec<&str> = schema
            .table("prefix")
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["prefix", "base"]);
    }

    #[test]
    fn test_missing_required_field_rejected() {
        let bad_tables = "table\tpath\ttype\tdescription\nprefix\t\t\t\n";
        let err = load(bad_tables, COLUMN_TSV, DATATYPE_TSV).unwrap_err();
        match err {
            SchemaError::MissingRequiredField { field, row, .. } => {
                assert_eq!(field, "path");
                assert_eq!(row, 2);
            }
            other => panic!("expected MissingRequiredField, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_datatype_rejected() {
        let bad_columns = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
            prefix\tprefix\t\tghost\t\t\n";
        let err = load(TABLE_TSV, bad_columns, DATATYPE_TSV).unwrap_err();
        match err {
            SchemaError::UnknownDatatype { name, referrer } => {
                assert_eq!(name, "ghost");
                assert!(referrer.contains("prefix.prefix"));
            }
            other => panic!("expected UnknownDatatype, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_nulltype_rejected() {
        let bad_columns = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
            prefix\tprefix\tghost\tword\t\t\n";
        let err = load(TABLE_TSV, bad_columns, DATATYPE_TSV).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownDatatype { .. }));
    }

    #[test]
    fn test_unknown_table_rejected() {
        let bad_columns = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
            nowhere\tprefix\t\tword\t\t\n";
        let err = load(TABLE_TSV, bad_columns, DATATYPE_TSV).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTable { .. }));
    }

    #[test]
    fn test_duplicate_datatype_rejected() {
        let bad_datatypes = "datatype\tparent\tcondition\nword\t\t\nword\t\t\n";
        let err = load(TABLE_TSV, COLUMN_TSV, bad_datatypes).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateKey {
                kind: "datatype",
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let bad_columns = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
            prefix\tprefix\t\tword\t\t\n\
            prefix\tprefix\t\tword\t\t\n";
        let err = load(TABLE_TSV, bad_columns, DATATYPE_TSV).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateKey { kind: "column", .. }
        ));
    }

    #[test]
    fn test_malformed_structure_rejected() {
        let bad_columns = "table\tcolumn\tnulltype\tdatatype\tstructure\tdescription\n\
            prefix\tprefix\t\tword\tfrom(prefix)\t\n";
        let err = load(TABLE_TSV, bad_columns, DATATYPE_TSV).unwrap_err();
        assert!(matches!(err, SchemaError::Structure { .. }));
    }

    #[test]
    fn test_malformed_condition_rejected() {
        let bad_datatypes = "datatype\tparent\tcondition\nword\t\tmatch(/[/)\n";
        let err = load(TABLE_TSV, COLUMN_TSV, bad_datatypes).unwrap_err();
        assert!(matches!(err, SchemaError::Condition { .. }));
    }

    #[test]
    fn test_missing_header_rejected() {
        let bad_tables = "name\tpath\ttype\tdescription\nprefix\tp.tsv\t\t\n";
        let err = load(bad_tables, COLUMN_TSV, DATATYPE_TSV).unwrap_err();
        match err {
            SchemaError::InvalidFormat { reason, .. } => {
                assert!(reason.contains("table"));
            }
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("table.tsv"), TABLE_TSV).unwrap();
        fs::write(dir.path().join("column.tsv"), COLUMN_TSV).unwrap();
        fs::write(dir.path().join("datatype.tsv"), DATATYPE_TSV).unwrap();

        let schema = Schema::load(dir.path()).unwrap();
        assert!(schema.table("prefix").is_some());
        assert!(schema.datatype("word").is_some());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = Schema::load(dir.path()).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFormat { .. }));
    }
}
