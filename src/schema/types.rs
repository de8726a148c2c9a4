//! Schema graph types
//!
//! Everything here is constructed once at schema-load time and immutable for
//! the duration of a validation run. Template tables and their concrete
//! instances are distinct types: `Table` may carry a templated name, while
//! the bound instances produced per run live in [`super::template::BoundTable`].

use std::collections::{BTreeMap, HashMap};

use crate::condition::Condition;

use super::datatype::EffectiveConditions;
use super::errors::{SchemaError, SchemaResult};
use super::structure::Structure;
use super::template::{BoundTable, TemplateBinding, TemplateName};

/// A table name as declared in `table.tsv`: concrete, or a template with a
/// single `{placeholder}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableName {
    Concrete(String),
    Template(TemplateName),
}

impl TableName {
    /// Classifies a raw table name.
    pub fn parse(raw: &str) -> SchemaResult<Self> {
        match TemplateName::parse(raw)? {
            Some(template) => Ok(TableName::Template(template)),
            None => Ok(TableName::Concrete(raw.to_string())),
        }
    }

    /// The name exactly as written in the meta-schema.
    pub fn raw(&self) -> &str {
        match self {
            TableName::Concrete(name) => name,
            TableName::Template(template) => template.raw(),
        }
    }

    pub fn is_template(&self) -> bool {
        matches!(self, TableName::Template(_))
    }
}

/// A table declaration from `table.tsv`, owning its columns in declaration
/// order. Column order determines row-cell alignment.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: TableName,
    pub path: String,
    /// Reserved type label; empty cell in the TSV maps to `None`.
    pub table_type: Option<String>,
    pub description: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A column declaration from `column.tsv`
#[derive(Debug, Clone)]
pub struct Column {
    /// Owning table's raw name, as written (may be templated)
    pub table: String,
    pub name: String,
    /// Datatype validated against when the cell is empty
    pub nulltype: Option<String>,
    pub datatype: String,
    pub structure: Option<Structure>,
    pub description: String,
}

/// A datatype declaration from `datatype.tsv`
#[derive(Debug, Clone)]
pub struct Datatype {
    pub name: String,
    /// At most one parent; the parent graph forms a forest
    pub parent: Option<String>,
    /// Own condition; absent means the effective condition is inherited
    pub condition: Option<Condition>,
}

/// The resolved, immutable schema graph
#[derive(Debug)]
pub struct Schema {
    tables: Vec<Table>,
    index: HashMap<String, usize>,
    datatypes: BTreeMap<String, Datatype>,
    effective: EffectiveConditions,
}

impl Schema {
    /// Assembles the graph from loaded declarations, resolving effective
    /// conditions and rejecting datatype cycles.
    pub(crate) fn build(
        tables: Vec<Table>,
        datatypes: BTreeMap<String, Datatype>,
    ) -> SchemaResult<Self> {
        let mut index = HashMap::with_capacity(tables.len());
        for (position, table) in tables.iter().enumerate() {
            if index
                .insert(table.name.raw().to_string(), position)
                .is_some()
            {
                return Err(SchemaError::DuplicateKey {
                    kind: "table",
                    key: table.name.raw().to_string(),
                });
            }
        }
        let effective = EffectiveConditions::resolve(&datatypes)?;
        Ok(Self {
            tables,
            index,
            datatypes,
            effective,
        })
    }

    /// Looks a table up by its raw (possibly templated) name.
    pub fn table(&self, raw_name: &str) -> Option<&Table> {
        self.index.get(raw_name).map(|&i| &self.tables[i])
    }

    /// All tables in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    pub fn datatype(&self, name: &str) -> Option<&Datatype> {
        self.datatypes.get(name)
    }

    pub fn datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.datatypes.values()
    }

    /// The condition actually enforced for a datatype after inheritance.
    ///
    /// `None` means accept any value.
    pub fn effective_condition(&self, datatype: &str) -> Option<&Condition> {
        self.effective.get(datatype)
    }

    /// The full effective-condition map, shared read-only by row workers.
    pub fn conditions(&self) -> &EffectiveConditions {
        &self.effective
    }

    /// Instantiates the run's concrete table set under the given bindings.
    pub fn expand(&self, bindings: &[TemplateBinding]) -> SchemaResult<Vec<BoundTable>> {
        super::template::expand(self, bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name_concrete() {
        let name = TableName::parse("prefix").unwrap();
        assert!(!name.is_template());
        assert_eq!(name.raw(), "prefix");
    }

    #[test]
    fn test_table_name_template() {
        let name = TableName::parse("{taxonomy_id}_config").unwrap();
        assert!(name.is_template());
        assert_eq!(name.raw(), "{taxonomy_id}_config");
    }

    #[test]
    fn test_build_rejects_duplicate_table() {
        let table = Table {
            name: TableName::parse("prefix").unwrap(),
            path: "prefix.tsv".into(),
            table_type: None,
            description: String::new(),
            columns: Vec::new(),
        };
        let err = Schema::build(vec![table.clone(), table], BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateKey { kind: "table", .. }));
    }
}
