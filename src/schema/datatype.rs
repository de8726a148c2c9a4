//! Datatype inheritance resolution
//!
//! Datatypes form a forest via `parent` links. A datatype with no condition
//! of its own inherits the condition of its nearest ancestor that has one;
//! if no ancestor has one, any value is accepted. Resolution walks each
//! ancestor chain once, memoized, and rejects cycles naming the offending
//! chain.

use std::collections::{BTreeMap, HashMap};

use crate::condition::Condition;

use super::errors::{SchemaError, SchemaResult};
use super::types::Datatype;

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Effective conditions for every declared datatype.
///
/// A `None` entry means the datatype accepts any value.
#[derive(Debug)]
pub struct EffectiveConditions {
    by_datatype: HashMap<String, Option<Condition>>,
}

impl EffectiveConditions {
    /// Resolves every datatype's effective condition.
    ///
    /// Errors: `UnknownDatatype` for a parent that resolves to no declared
    /// datatype, `CyclicDatatype` for a cycle in the parent graph.
    pub fn resolve(datatypes: &BTreeMap<String, Datatype>) -> SchemaResult<Self> {
        let mut marks: HashMap<&str, Mark> = datatypes
            .keys()
            .map(|name| (name.as_str(), Mark::Unvisited))
            .collect();
        let mut resolved: HashMap<String, Option<Condition>> =
            HashMap::with_capacity(datatypes.len());

        for name in datatypes.keys() {
            let mut path = Vec::new();
            Self::resolve_one(name, datatypes, &mut marks, &mut resolved, &mut path)?;
        }

        Ok(Self {
            by_datatype: resolved,
        })
    }

    fn resolve_one<'a>(
        name: &'a str,
        datatypes: &'a BTreeMap<String, Datatype>,
        marks: &mut HashMap<&'a str, Mark>,
        resolved: &mut HashMap<String, Option<Condition>>,
        path: &mut Vec<&'a str>,
    ) -> SchemaResult<()> {
        match marks.get(name).copied() {
            None => {
                let referrer = match path.last() {
                    Some(child) => format!("parent of datatype '{}'", child),
                    None => "datatype table".to_string(),
                };
                return Err(SchemaError::UnknownDatatype {
                    name: name.to_string(),
                    referrer,
                });
            }
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                // Revisit within the current path: report the cycle from its
                // first occurrence.
                let start = path.iter().position(|&n| n == name).unwrap_or(0);
                let mut cycle: Vec<&str> = path[start..].to_vec();
                cycle.push(name);
                return Err(SchemaError::CyclicDatatype {
                    cycle: cycle.join(" -> "),
                });
            }
            Some(Mark::Unvisited) => {}
        }

        marks.insert(name, Mark::Visiting);
        path.push(name);

        let datatype = &datatypes[name];
        let effective = match (&datatype.condition, &datatype.parent) {
            (Some(own), _) => Some(own.clone()),
            (None, Some(parent)) => {
                Self::resolve_one(parent, datatypes, marks, resolved, path)?;
                resolved[parent.as_str()].clone()
            }
            (None, None) => None,
        };
        resolved.insert(name.to_string(), effective);

        path.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    /// The effective condition for a datatype; `None` accepts any value.
    pub fn get(&self, datatype: &str) -> Option<&Condition> {
        self.by_datatype.get(datatype).and_then(|c| c.as_ref())
    }

    /// Evaluates a value against a datatype's effective condition.
    pub fn accepts(&self, datatype: &str, value: &str) -> bool {
        match self.get(datatype) {
            Some(condition) => condition.evaluate(value),
            None => true,
        }
    }
}
