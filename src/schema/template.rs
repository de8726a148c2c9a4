//! Template tables and per-run instantiation
//!
//! A table name containing a `{placeholder}` denotes a family of tables,
//! instantiated once per bound value. Instantiation substitutes the
//! placeholder in the table name, in the table path, and in every
//! `from(...)` target that names the same placeholder — so
//! `from({taxonomy_id}.cell_set_accession)` inside `{taxonomy_id}` ties the
//! reference to the instance produced by the same binding.
//!
//! Templates and instances are distinct types: [`super::types::Table`] may
//! be templated, [`BoundTable`] never is.

use std::collections::{BTreeMap, HashMap};

use super::errors::{SchemaError, SchemaResult};
use super::structure::Structure;
use super::types::{Schema, Table, TableName};

/// A parsed template table name: `prefix{placeholder}suffix`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName {
    raw: String,
    prefix: String,
    placeholder: String,
    suffix: String,
}

impl TemplateName {
    /// Parses a raw table name; `Ok(None)` means the name is concrete.
    ///
    /// A template carries exactly one `{identifier}`.
    pub fn parse(raw: &str) -> SchemaResult<Option<Self>> {
        let Some(open) = raw.find('{') else {
            if raw.contains('}') {
                return Err(SchemaError::TableName {
                    name: raw.to_string(),
                    reason: "'}' without matching '{'".to_string(),
                });
            }
            return Ok(None);
        };
        let close = match raw[open..].find('}') {
            Some(offset) => open + offset,
            None => {
                return Err(SchemaError::TableName {
                    name: raw.to_string(),
                    reason: "unclosed '{'".to_string(),
                })
            }
        };
        let placeholder = &raw[open + 1..close];
        if placeholder.is_empty()
            || !placeholder
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            return Err(SchemaError::TableName {
                name: raw.to_string(),
                reason: format!("invalid placeholder '{{{}}}'", placeholder),
            });
        }
        let suffix = &raw[close + 1..];
        if suffix.contains('{') || suffix.contains('}') {
            return Err(SchemaError::TableName {
                name: raw.to_string(),
                reason: "more than one placeholder".to_string(),
            });
        }
        Ok(Some(Self {
            raw: raw.to_string(),
            prefix: raw[..open].to_string(),
            placeholder: placeholder.to_string(),
            suffix: suffix.to_string(),
        }))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// The concrete name produced under a bound value.
    pub fn instantiate(&self, value: &str) -> String {
        format!("{}{}{}", self.prefix, value, self.suffix)
    }
}

/// A mapping from placeholder names to concrete values, supplied per run
#[derive(Debug, Clone, Default)]
pub struct TemplateBinding {
    values: BTreeMap<String, String>,
}

impl TemplateBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a placeholder, rejecting a conflicting rebind.
    pub fn bind(
        &mut self,
        placeholder: impl Into<String>,
        value: impl Into<String>,
    ) -> SchemaResult<()> {
        let placeholder = placeholder.into();
        let value = value.into();
        if let Some(existing) = self.values.get(&placeholder) {
            if *existing != value {
                return Err(SchemaError::AmbiguousBinding {
                    placeholder,
                    first: existing.clone(),
                    second: value,
                });
            }
            return Ok(());
        }
        self.values.insert(placeholder, value);
        Ok(())
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.values.get(placeholder).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Substitutes every bound `{placeholder}` occurrence in `text`.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (placeholder, value) in &self.values {
            out = out.replace(&format!("{{{}}}", placeholder), value);
        }
        out
    }
}

/// A concrete table produced by expansion, ready to receive rows
#[derive(Debug, Clone)]
pub struct BoundTable {
    pub name: String,
    pub path: String,
    pub table_type: Option<String>,
    pub columns: Vec<BoundColumn>,
}

impl BoundTable {
    pub fn column(&self, name: &str) -> Option<&BoundColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A column of a bound table; `from` targets are fully concrete
#[derive(Debug, Clone)]
pub struct BoundColumn {
    pub name: String,
    pub nulltype: Option<String>,
    pub datatype: String,
    pub structure: Option<Structure>,
}

/// Instantiates the run's concrete table set.
///
/// Concrete tables appear once; each template table appears once per
/// binding, and instances from different bindings share nothing. Errors:
/// `UnboundPlaceholder` when a template (or a structure target) needs a
/// placeholder no binding covers, `AmbiguousBinding` when a concrete
/// table's structure target needs a placeholder the run's bindings disagree
/// on, `DuplicateKey` when two instantiations collide on one concrete name.
pub fn expand(schema: &Schema, bindings: &[TemplateBinding]) -> SchemaResult<Vec<BoundTable>> {
    // Consensus view across all bindings, for structure targets on concrete
    // tables: a placeholder bound to one value everywhere is usable there;
    // a disagreement only errors if something actually needs it.
    let mut consensus: BTreeMap<String, Result<String, (String, String)>> = BTreeMap::new();
    for binding in bindings {
        for (placeholder, value) in &binding.values {
            match consensus.get(placeholder) {
                None => {
                    consensus.insert(placeholder.clone(), Ok(value.clone()));
                }
                Some(Ok(existing)) if existing != value => {
                    consensus.insert(
                        placeholder.clone(),
                        Err((existing.clone(), value.clone())),
                    );
                }
                _ => {}
            }
        }
    }

    let mut out: Vec<BoundTable> = Vec::new();
    let mut seen: HashMap<String, ()> = HashMap::new();

    for table in schema.tables() {
        match &table.name {
            TableName::Concrete(name) => {
                let consensus_binding = ConsensusLookup {
                    consensus: &consensus,
                };
                let bound = bind_table(table, name.clone(), None, &consensus_binding)?;
                push_unique(&mut out, &mut seen, bound)?;
            }
            TableName::Template(template) => {
                if bindings.is_empty() {
                    return Err(SchemaError::UnboundPlaceholder {
                        placeholder: template.placeholder().to_string(),
                        table: template.raw().to_string(),
                    });
                }
                for binding in bindings {
                    let value = binding.get(template.placeholder()).ok_or_else(|| {
                        SchemaError::UnboundPlaceholder {
                            placeholder: template.placeholder().to_string(),
                            table: template.raw().to_string(),
                        }
                    })?;
                    let name = template.instantiate(value);
                    let bound = bind_table(table, name, Some(binding), &ConsensusLookup {
                        consensus: &consensus,
                    })?;
                    push_unique(&mut out, &mut seen, bound)?;
                }
            }
        }
    }

    resolve_references(&out)?;
    Ok(out)
}

struct ConsensusLookup<'a> {
    consensus: &'a BTreeMap<String, Result<String, (String, String)>>,
}

impl ConsensusLookup<'_> {
    fn get(&self, placeholder: &str) -> SchemaResult<Option<&str>> {
        match self.consensus.get(placeholder) {
            None => Ok(None),
            Some(Ok(value)) => Ok(Some(value.as_str())),
            Some(Err((first, second))) => Err(SchemaError::AmbiguousBinding {
                placeholder: placeholder.to_string(),
                first: first.clone(),
                second: second.clone(),
            }),
        }
    }
}

fn push_unique(
    out: &mut Vec<BoundTable>,
    seen: &mut HashMap<String, ()>,
    bound: BoundTable,
) -> SchemaResult<()> {
    if seen.insert(bound.name.clone(), ()).is_some() {
        return Err(SchemaError::DuplicateKey {
            kind: "bound table",
            key: bound.name,
        });
    }
    out.push(bound);
    Ok(())
}

fn bind_table(
    table: &Table,
    concrete_name: String,
    binding: Option<&TemplateBinding>,
    consensus: &ConsensusLookup<'_>,
) -> SchemaResult<BoundTable> {
    let path = match binding {
        Some(b) => b.substitute(&table.path),
        None => table.path.clone(),
    };

    let mut columns = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let structure = match &column.structure {
            Some(Structure::From {
                table: target_table,
                column: target_column,
            }) => {
                let rewritten =
                    rewrite_target(target_table, binding, consensus, &concrete_name, column)?;
                Some(Structure::From {
                    table: rewritten,
                    column: target_column.clone(),
                })
            }
            other => other.clone(),
        };
        columns.push(BoundColumn {
            name: column.name.clone(),
            nulltype: column.nulltype.clone(),
            datatype: column.datatype.clone(),
            structure,
        });
    }

    Ok(BoundTable {
        name: concrete_name,
        path,
        table_type: table.table_type.clone(),
        columns,
    })
}

/// Rewrites a `from` target table name to its concrete form.
///
/// The instantiating binding wins; placeholders it does not cover fall back
/// to the run-wide consensus. Anything still templated afterwards is
/// unbound.
fn rewrite_target(
    target: &str,
    binding: Option<&TemplateBinding>,
    consensus: &ConsensusLookup<'_>,
    referrer_table: &str,
    referrer_column: &super::types::Column,
) -> SchemaResult<String> {
    let mut rewritten = match binding {
        Some(b) => b.substitute(target),
        None => target.to_string(),
    };
    while let Some(placeholder) = find_placeholder(&rewritten) {
        match consensus.get(&placeholder)? {
            Some(value) => {
                rewritten = rewritten.replace(&format!("{{{}}}", placeholder), value);
            }
            None => {
                return Err(SchemaError::UnboundPlaceholder {
                    placeholder,
                    table: format!("{} (column '{}')", referrer_table, referrer_column.name),
                })
            }
        }
    }
    Ok(rewritten)
}

fn find_placeholder(text: &str) -> Option<String> {
    let open = text.find('{')?;
    let close = text[open..].find('}')?;
    Some(text[open + 1..open + close].to_string())
}

/// Checks every `from`/`tree` target against the expanded table set.
fn resolve_references(tables: &[BoundTable]) -> SchemaResult<()> {
    let by_name: HashMap<&str, &BoundTable> =
        tables.iter().map(|t| (t.name.as_str(), t)).collect();

    for table in tables {
        for column in &table.columns {
            match &column.structure {
                Some(Structure::From {
                    table: target_table,
                    column: target_column,
                }) => {
                    let referrer = format!("column '{}.{}'", table.name, column.name);
                    let target = by_name.get(target_table.as_str()).ok_or_else(|| {
                        SchemaError::UnknownTable {
                            name: target_table.clone(),
                            referrer: referrer.clone(),
                        }
                    })?;
                    if target.column(target_column).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            table: target_table.clone(),
                            column: target_column.clone(),
                            referrer,
                        });
                    }
                }
                Some(Structure::Tree { column: key_column }) => {
                    if table.column(key_column).is_none() {
                        return Err(SchemaError::UnknownColumn {
                            table: table.name.clone(),
                            column: key_column.clone(),
                            referrer: format!("column '{}.{}'", table.name, column.name),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::super::types::{Column, Datatype, Schema, Table, TableName};
    use super::*;

    fn column(table: &str, name: &str, structure: Option<&str>) -> Column {
        Column {
            table: table.to_string(),
            name: name.to_string(),
            nulltype: None,
            datatype: "text".to_string(),
            structure: structure.map(|s| Structure::parse(s).unwrap()),
            description: String::new(),
        }
    }

    fn table(raw_name: &str, columns: Vec<Column>) -> Table {
        Table {
            name: TableName::parse(raw_name).unwrap(),
            path: format!("curation_tables/{}.tsv", raw_name),
            table_type: None,
            description: String::new(),
            columns,
        }
    }

    fn schema(tables: Vec<Table>) -> Schema {
        let mut datatypes = BTreeMap::new();
        datatypes.insert(
            "text".to_string(),
            Datatype {
                name: "text".to_string(),
                parent: None,
                condition: None,
            },
        );
        Schema::build(tables, datatypes).unwrap()
    }

    fn binding(placeholder: &str, value: &str) -> TemplateBinding {
        let mut b = TemplateBinding::new();
        b.bind(placeholder, value).unwrap();
        b
    }

    #[test]
    fn test_template_name_parse() {
        let t = TemplateName::parse("{taxonomy_id}_config").unwrap().unwrap();
        assert_eq!(t.placeholder(), "taxonomy_id");
        assert_eq!(t.instantiate("CCN2020"), "CCN2020_config");
        assert!(TemplateName::parse("prefix").unwrap().is_none());
    }

    #[test]
    fn test_template_name_rejects_malformed() {
        assert!(TemplateName::parse("{unclosed").is_err());
        assert!(TemplateName::parse("stray}").is_err());
        assert!(TemplateName::parse("{a}{b}").is_err());
        assert!(TemplateName::parse("{}").is_err());
    }

    #[test]
    fn test_binding_rejects_conflict() {
        let mut b = TemplateBinding::new();
        b.bind("taxonomy_id", "T1").unwrap();
        b.bind("taxonomy_id", "T1").unwrap();
        let err = b.bind("taxonomy_id", "T2").unwrap_err();
        assert!(matches!(err, SchemaError::AmbiguousBinding { .. }));
    }

    #[test]
    fn test_expand_round_trip() {
        // {taxonomy_id}_config with a from({taxonomy_id}.*) reference becomes
        // T1_config with from(T1.*) under the same binding.
        let s = schema(vec![
            table(
                "{taxonomy_id}",
                vec![column("{taxonomy_id}", "cell_set_accession", Some("primary"))],
            ),
            table(
                "{taxonomy_id}_config",
                vec![column(
                    "{taxonomy_id}_config",
                    "taxonomy_anchor",
                    Some("from({taxonomy_id}.cell_set_accession)"),
                )],
            ),
        ]);
        let bound = s.expand(&[binding("taxonomy_id", "T1")]).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].name, "T1");
        assert_eq!(bound[1].name, "T1_config");
        assert_eq!(
            bound[1].columns[0].structure,
            Some(Structure::From {
                table: "T1".into(),
                column: "cell_set_accession".into()
            })
        );
    }

    #[test]
    fn test_expand_substitutes_path() {
        let s = schema(vec![table(
            "{taxonomy_id}",
            vec![column("{taxonomy_id}", "cell_set_accession", None)],
        )]);
        let bound = s.expand(&[binding("taxonomy_id", "CCN2020")]).unwrap();
        assert_eq!(bound[0].path, "curation_tables/CCN2020.tsv");
    }

    #[test]
    fn test_two_bindings_produce_independent_instances() {
        let s = schema(vec![table(
            "{taxonomy_id}",
            vec![column("{taxonomy_id}", "cell_set_accession", Some("primary"))],
        )]);
        let bound = s
            .expand(&[binding("taxonomy_id", "A1"), binding("taxonomy_id", "B2")])
            .unwrap();
        let names: Vec<&str> = bound.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A1", "B2"]);
    }

    #[test]
    fn test_unbound_placeholder_rejected() {
        let s = schema(vec![table(
            "{taxonomy_id}",
            vec![column("{taxonomy_id}", "cell_set_accession", None)],
        )]);
        let err = s.expand(&[]).unwrap_err();
        assert!(matches!(err, SchemaError::UnboundPlaceholder { .. }));

        let err = s.expand(&[binding("other", "x")]).unwrap_err();
        assert!(matches!(err, SchemaError::UnboundPlaceholder { .. }));
    }

    #[test]
    fn test_concrete_table_referencing_template_uses_consensus() {
        let s = schema(vec![
            table(
                "{taxonomy_id}",
                vec![column("{taxonomy_id}", "cell_set_accession", Some("primary"))],
            ),
            table(
                "cross_taxonomy_mapping",
                vec![column(
                    "cross_taxonomy_mapping",
                    "accession",
                    Some("from({taxonomy_id}.cell_set_accession)"),
                )],
            ),
        ]);
        let bound = s.expand(&[binding("taxonomy_id", "T1")]).unwrap();
        let mapping = bound.iter().find(|t| t.name == "cross_taxonomy_mapping").unwrap();
        assert_eq!(
            mapping.columns[0].structure,
            Some(Structure::From {
                table: "T1".into(),
                column: "cell_set_accession".into()
            })
        );

        // Two disagreeing bindings make that same reference ambiguous.
        let err = s
            .expand(&[binding("taxonomy_id", "T1"), binding("taxonomy_id", "T2")])
            .unwrap_err();
        assert!(matches!(err, SchemaError::AmbiguousBinding { .. }));
    }

    #[test]
    fn test_colliding_instances_rejected() {
        let s = schema(vec![
            table(
                "{taxonomy_id}",
                vec![column("{taxonomy_id}", "cell_set_accession", None)],
            ),
            table("T1", vec![column("T1", "anything", None)]),
        ]);
        let err = s.expand(&[binding("taxonomy_id", "T1")]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::DuplicateKey {
                kind: "bound table",
                ..
            }
        ));
    }

    #[test]
    fn test_dangling_from_target_rejected_at_bind_time() {
        let s = schema(vec![table(
            "notes",
            vec![column("notes", "prefix", Some("from(prefix.prefix)"))],
        )]);
        let err = s.expand(&[]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownTable { .. }));
    }

    #[test]
    fn test_tree_key_column_must_exist() {
        let s = schema(vec![table(
            "t",
            vec![column("t", "parent", Some("tree(accession)"))],
        )]);
        let err = s.expand(&[]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { .. }));
    }
}
