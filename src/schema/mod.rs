//! Meta-schema subsystem
//!
//! The three-level meta-schema (`table`, `column`, `datatype`) describes the
//! shape of the curation tables being validated. This module loads it,
//! resolves the datatype inheritance forest, parses structure constraints,
//! and instantiates template tables per run binding.
//!
//! # Design principles
//!
//! - The schema graph is built once, fails fast, and is immutable afterwards
//! - Templates and their concrete instances are distinct types
//! - Every schema-build error is fatal: no data is checked against a schema
//!   that is not itself consistent

mod datatype;
mod errors;
mod loader;
mod structure;
mod template;
mod types;

pub use datatype::EffectiveConditions;
pub use errors::{SchemaError, SchemaResult};
pub use structure::{Structure, StructureError};
pub use template::{BoundColumn, BoundTable, TemplateBinding, TemplateName};
pub use types::{Column, Datatype, Schema, Table, TableName};
