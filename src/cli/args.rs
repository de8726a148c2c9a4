//! CLI argument definitions using clap
//!
//! Commands:
//! - tdt validate --config <path> [--bind NAME=VALUE ...] [--report <path>]
//! - tdt seed [-C <config>] [-D <outdir>] [-t <title>] [-u <user>] [REPO]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tdt - a validation engine for tabular taxonomy curation data
#[derive(Parser, Debug)]
#[command(name = "tdt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log everything down to trace level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate curation tables against the meta-schema
    Validate {
        /// Path to the run configuration file
        #[arg(long, default_value = "./tdt.json")]
        config: PathBuf,

        /// Extra placeholder bindings as NAME=VALUE, forming one binding
        /// set in addition to those in the configuration
        #[arg(long = "bind", value_name = "NAME=VALUE")]
        bind: Vec<String>,

        /// Write the JSON report to this path instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Seed a new taxonomy project directory
    Seed {
        /// Path to a project configuration file
        #[arg(short = 'C', long)]
        config: Option<PathBuf>,

        /// Output directory (default: target/<repo>)
        #[arg(short = 'D', long)]
        outdir: Option<PathBuf>,

        /// Taxonomy title
        #[arg(short = 't', long)]
        title: Option<String>,

        /// GitHub organization or user the repository will live under
        #[arg(short = 'u', long)]
        user: Option<String>,

        /// Remove the output directory first if it exists
        #[arg(short = 'c', long)]
        clean: bool,

        /// Skip git initialization
        #[arg(short = 'g', long)]
        skipgit: bool,

        /// Git author/committer name for the first commit
        #[arg(short = 'n', long)]
        gitname: Option<String>,

        /// Git author/committer email for the first commit
        #[arg(short = 'e', long)]
        gitemail: Option<String>,

        /// Repository name (also the taxonomy id when none is configured)
        repo: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
