//! CLI module for tdt
//!
//! Provides the command-line interface:
//! - validate: run the engine over a project's curation tables
//! - seed: instantiate a new taxonomy project directory

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, seed, validate, Config, ProjectConfig, SeedOptions};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{print_summary, write_json, write_report_file};
