//! tdt - a strict, deterministic validation engine for tabular taxonomy
//! curation data
//!
//! A three-level meta-schema (`table`, `column`, `datatype`) describes the
//! shape of the curation tables; the engine interprets it to validate any
//! conforming dataset, including table families instantiated per taxonomy
//! from `{placeholder}` templates.

pub mod cli;
pub mod condition;
pub mod data;
pub mod launcher;
pub mod observability;
pub mod schema;
pub mod validate;
