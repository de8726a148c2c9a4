//! CLI command implementations
//!
//! `validate` runs the engine over a project's curation tables and reflects
//! error findings in the exit code. `seed` instantiates a new taxonomy
//! project directory from the packaged meta-schema, binding the project's
//! taxonomy id into the template tables.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as Process;

use serde::{Deserialize, Serialize};

use crate::observability::{Level, Logger};
use crate::schema::{Schema, TemplateBinding};
use crate::validate::ValidationRun;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{print_summary, write_json, write_report_file};

/// Packaged meta-schema and starter tables, bound into seeded projects
const RESOURCE_TABLE: &str = include_str!("../../resources/table.tsv");
const RESOURCE_COLUMN: &str = include_str!("../../resources/column.tsv");
const RESOURCE_DATATYPE: &str = include_str!("../../resources/datatype.tsv");
const RESOURCE_PREFIX: &str = include_str!("../../resources/prefix.tsv");
const RESOURCE_IMPORT: &str = include_str!("../../resources/import.tsv");
const RESOURCE_TAXONOMY_CONFIG: &str = include_str!("../../resources/taxonomy_config.tsv");

/// Validation run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding table.tsv, column.tsv and datatype.tsv (required)
    pub schema_dir: String,

    /// Base directory the schema's table paths are relative to
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Binding sets; each instantiates every template table once
    #[serde(default)]
    pub bindings: Vec<BTreeMap<String, String>>,
}

fn default_data_dir() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.schema_dir.is_empty() {
            return Err(CliError::config_error("schema_dir must not be empty"));
        }
        Ok(())
    }
}

/// A taxonomy project configuration, written into seeded repositories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Taxonomy id, e.g. CCN202002270
    #[serde(default)]
    pub id: String,

    /// Concise descriptive title
    #[serde(default)]
    pub title: String,

    /// Repository name, without the organization
    #[serde(default)]
    pub repo: String,

    /// GitHub organization or user the repository lives under
    #[serde(default)]
    pub github_org: String,

    /// Main branch name
    #[serde(default = "default_main_branch")]
    pub git_main_branch: String,

    /// License IRI
    #[serde(default = "default_license")]
    pub license: String,

    /// Short description of the taxonomy
    #[serde(default)]
    pub description: String,

    /// Single contact for the taxonomy
    #[serde(default)]
    pub author: Option<String>,

    /// Citation or permanent data identifier
    #[serde(default)]
    pub citation: Option<String>,
}

fn default_main_branch() -> String {
    "main".to_string()
}

fn default_license() -> String {
    "https://creativecommons.org/licenses/unspecified".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            title: String::new(),
            repo: String::new(),
            github_org: String::new(),
            git_main_branch: default_main_branch(),
            license: default_license(),
            description: String::new(),
            author: None,
            citation: None,
        }
    }
}

impl ProjectConfig {
    fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("failed to read config: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("invalid config JSON: {}", e)))
    }
}

/// Parse arguments and dispatch; the returned code is the process exit code.
pub fn run() -> CliResult<i32> {
    let cli = Cli::parse_args();
    if cli.verbose {
        Logger::set_level(Level::Trace);
    }

    match cli.command {
        Command::Validate {
            config,
            bind,
            report,
        } => validate(&config, &bind, report.as_deref()),
        Command::Seed {
            config,
            outdir,
            title,
            user,
            clean,
            skipgit,
            gitname,
            gitemail,
            repo,
        } => seed(SeedOptions {
            config,
            outdir,
            title,
            user,
            clean,
            skipgit,
            gitname,
            gitemail,
            repo,
        }),
    }
}

/// Runs one validation: schema build, template expansion, data ingestion,
/// row validation, reference resolution, report.
pub fn validate(
    config_path: &Path,
    bind_args: &[String],
    report_path: Option<&Path>,
) -> CliResult<i32> {
    let config = Config::load(config_path)?;

    let mut bindings = Vec::with_capacity(config.bindings.len() + 1);
    for set in &config.bindings {
        let mut binding = TemplateBinding::new();
        for (placeholder, value) in set {
            binding.bind(placeholder, value)?;
        }
        bindings.push(binding);
    }
    if !bind_args.is_empty() {
        bindings.push(parse_bind_args(bind_args)?);
    }

    let schema = Schema::load(Path::new(&config.schema_dir))?;
    let mut run = ValidationRun::bind(&schema, &bindings)?;
    run.load_data(Path::new(&config.data_dir))?;

    let report = run.execute();
    match report_path {
        Some(path) => write_report_file(path, &report)?,
        None => write_json(&report.to_json()?)?,
    }
    print_summary(&report);

    Ok(if report.is_success() { 0 } else { 1 })
}

/// Parses repeated `NAME=VALUE` arguments into one binding set.
fn parse_bind_args(args: &[String]) -> CliResult<TemplateBinding> {
    let mut binding = TemplateBinding::new();
    for arg in args {
        let (placeholder, value) = arg.split_once('=').ok_or_else(|| {
            CliError::config_error(format!("invalid binding '{}', expected NAME=VALUE", arg))
        })?;
        binding.bind(placeholder, value)?;
    }
    Ok(binding)
}

/// Options for the seed command
pub struct SeedOptions {
    pub config: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub title: Option<String>,
    pub user: Option<String>,
    pub clean: bool,
    pub skipgit: bool,
    pub gitname: Option<String>,
    pub gitemail: Option<String>,
    pub repo: Option<String>,
}

/// Seeds a new taxonomy project directory.
pub fn seed(options: SeedOptions) -> CliResult<i32> {
    let mut project = match &options.config {
        Some(path) => ProjectConfig::load(path)?,
        None => ProjectConfig::default(),
    };
    if let Some(title) = options.title {
        project.title = title;
    }
    if let Some(user) = options.user {
        project.github_org = user;
    }
    if let Some(repo) = options.repo {
        project.repo = repo;
    }
    if project.id.is_empty() {
        project.id = project.repo.clone();
    }
    if project.id.is_empty() {
        return Err(CliError::config_error(
            "a repository name or a configured taxonomy id is required",
        ));
    }

    let outdir = options
        .outdir
        .unwrap_or_else(|| PathBuf::from("target").join(&project.repo));
    if options.clean && outdir.exists() {
        fs::remove_dir_all(&outdir)?;
    }
    fs::create_dir_all(&outdir)?;

    let mut created = Vec::new();

    let project_config_path = outdir.join(format!("{}_project_config.json", project.id));
    match &options.config {
        Some(path) => {
            fs::copy(path, &project_config_path)?;
        }
        None => {
            fs::write(&project_config_path, serde_json::to_string_pretty(&project)?)?;
        }
    }
    created.push(project_config_path);

    create_folder(
        &outdir,
        "input_data",
        "Input Files",
        "Taxonomy data files.",
        &mut created,
    )?;
    create_folder(
        &outdir,
        "curation_tables",
        "Curation Tables",
        "Taxonomy curation tables validated by the packaged meta-schema.",
        &mut created,
    )?;
    create_folder(
        &outdir,
        "purl",
        "PURL Configuration",
        "Permanent URL configuration for the published taxonomy.",
        &mut created,
    )?;

    create_purl_config(&outdir, &project, &mut created)?;
    create_readme(&outdir, &project, &mut created)?;

    // The published artifact placeholder.
    let output_path = outdir.join(format!("{}.json", project.id));
    fs::write(&output_path, "{}")?;
    created.push(output_path);

    create_curation_tables(&outdir, &project, &mut created)?;

    for path in &created {
        Logger::info("seed_created", &[("path", &path.display().to_string())]);
    }

    if options.skipgit {
        println!("Project files created; no git commands have been run.");
        return Ok(0);
    }

    git_init(&outdir, &project, options.gitname, options.gitemail)?;
    print_next_steps(&outdir, &project);
    Ok(0)
}

fn create_folder(
    outdir: &Path,
    name: &str,
    title: &str,
    description: &str,
    created: &mut Vec<PathBuf>,
) -> CliResult<()> {
    let folder = outdir.join(name);
    fs::create_dir_all(&folder)?;
    let readme = folder.join("README.md");
    fs::write(&readme, format!("# {}\n\n{}", title, description))?;
    created.push(readme);
    Ok(())
}

fn create_purl_config(
    outdir: &Path,
    project: &ProjectConfig,
    created: &mut Vec<PathBuf>,
) -> CliResult<()> {
    let path = outdir.join("purl").join(format!("{}.yml", project.id));
    let mut lines = Vec::new();
    lines.push(format!("idspace: {}", project.id));
    lines.push(format!("base_url: /taxonomy/{}", project.id));
    lines.push(String::new());
    lines.push("products:".to_string());
    lines.push(format!(
        "- {id}.json: https://raw.githubusercontent.com/{org}/{repo}/{branch}/{id}.json",
        id = project.id,
        org = project.github_org,
        repo = project.repo,
        branch = project.git_main_branch,
    ));
    lines.push(String::new());
    lines.push(format!(
        "base_redirect: https://github.com/{}/{}",
        project.github_org, project.repo
    ));
    lines.push(String::new());
    lines.push("entries:".to_string());
    lines.push(format!("- exact: /{}.json", project.id));
    lines.push(format!(
        "  replacement: https://raw.githubusercontent.com/{org}/{repo}/{branch}/{id}.json",
        id = project.id,
        org = project.github_org,
        repo = project.repo,
        branch = project.git_main_branch,
    ));
    fs::write(&path, lines.join("\n") + "\n")?;
    created.push(path);
    Ok(())
}

fn create_readme(
    outdir: &Path,
    project: &ProjectConfig,
    created: &mut Vec<PathBuf>,
) -> CliResult<()> {
    let description = if project.description.is_empty() {
        &project.title
    } else {
        &project.description
    };
    let path = outdir.join("README.md");
    fs::write(
        &path,
        format!("# {} ({})\n\n{}.", project.title, project.id, description),
    )?;
    created.push(path);
    Ok(())
}

/// Writes the curation tables: the meta-schema with the project's taxonomy
/// id bound into the template tables, the starter data tables, and a
/// header-only data file for the taxonomy table itself.
fn create_curation_tables(
    outdir: &Path,
    project: &ProjectConfig,
    created: &mut Vec<PathBuf>,
) -> CliResult<()> {
    let tables_dir = outdir.join("curation_tables");

    let mut binding = TemplateBinding::new();
    binding.bind("taxonomy_id", &project.id)?;

    let table_tsv = binding.substitute(RESOURCE_TABLE);
    let column_tsv = binding.substitute(RESOURCE_COLUMN);

    for (name, content) in [
        ("table.tsv", table_tsv.as_str()),
        ("column.tsv", column_tsv.as_str()),
        ("datatype.tsv", RESOURCE_DATATYPE),
        ("prefix.tsv", RESOURCE_PREFIX),
        ("import.tsv", RESOURCE_IMPORT),
    ] {
        let path = tables_dir.join(name);
        fs::write(&path, content)?;
        created.push(path);
    }

    let config_path = tables_dir.join(format!("{}_config.tsv", project.id));
    fs::write(&config_path, RESOURCE_TAXONOMY_CONFIG)?;
    created.push(config_path);

    // Header-only taxonomy table, derived from the substituted schema so
    // the seeded project validates cleanly out of the box.
    let schema = Schema::from_readers(
        table_tsv.as_bytes(),
        column_tsv.as_bytes(),
        RESOURCE_DATATYPE.as_bytes(),
    )?;
    let bound = schema.expand(&[])?;
    let taxonomy = bound
        .iter()
        .find(|t| t.name == project.id)
        .ok_or_else(|| {
            CliError::config_error(format!(
                "packaged meta-schema has no table for taxonomy '{}'",
                project.id
            ))
        })?;
    let header: Vec<&str> = taxonomy.columns.iter().map(|c| c.name.as_str()).collect();
    let path = tables_dir.join(format!("{}.tsv", project.id));
    fs::write(&path, header.join("\t") + "\n")?;
    created.push(path);

    Ok(())
}

fn git_init(
    outdir: &Path,
    project: &ProjectConfig,
    gitname: Option<String>,
    gitemail: Option<String>,
) -> CliResult<()> {
    let mut identity = Vec::new();
    if let Some(name) = gitname {
        identity.push(("GIT_AUTHOR_NAME", name.clone()));
        identity.push(("GIT_COMMITTER_NAME", name));
    }
    if let Some(email) = gitemail {
        identity.push(("GIT_AUTHOR_EMAIL", email.clone()));
        identity.push(("GIT_COMMITTER_EMAIL", email));
    }

    run_git(outdir, &["init"], &identity)?;
    run_git(outdir, &["add", "."], &identity)?;
    run_git(outdir, &["branch", "-M", &project.git_main_branch], &identity)?;
    run_git(outdir, &["commit", "-m", "first release"], &identity)?;
    Ok(())
}

fn run_git(workdir: &Path, args: &[&str], identity: &[(&str, String)]) -> CliResult<()> {
    let mut command = Process::new("git");
    command.current_dir(workdir).args(args);
    for (key, value) in identity {
        command.env(key, value);
    }
    let status = command
        .status()
        .map_err(|e| CliError::git_error(format!("git {}: {}", args.join(" "), e)))?;
    if !status.success() {
        return Err(CliError::git_error(format!(
            "git {} exited with {}",
            args.join(" "),
            status
        )));
    }
    Ok(())
}

fn print_next_steps(outdir: &Path, project: &ProjectConfig) {
    println!("\nNEXT STEPS:");
    println!(
        " 0. Examine {} and check it meets your expectations.",
        outdir.display()
    );
    println!(" 1. Create the repository at https://github.com/new");
    println!(
        "    Owner: {}  Repository name: {}",
        project.github_org, project.repo
    );
    println!(" 2. Do not initialize with a README (you already have one).");
    println!(" 3. Then push the seeded history:");
    println!("    cd {}", outdir.display());
    println!(
        "    git remote add origin https://github.com/{}/{}.git",
        project.github_org, project.repo
    );
    println!("    git push -u origin {}", project.git_main_branch);
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn seed_options(outdir: &Path, repo: &str) -> SeedOptions {
        SeedOptions {
            config: None,
            outdir: Some(outdir.to_path_buf()),
            title: Some("Test taxonomy".to_string()),
            user: Some("example-org".to_string()),
            clean: false,
            skipgit: true,
            gitname: None,
            gitemail: None,
            repo: Some(repo.to_string()),
        }
    }

    #[test]
    fn test_seed_creates_project_layout() {
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("CCN001");
        let code = seed(seed_options(&outdir, "CCN001")).unwrap();
        assert_eq!(code, 0);

        for expected in [
            "README.md",
            "CCN001.json",
            "CCN001_project_config.json",
            "input_data/README.md",
            "purl/CCN001.yml",
            "curation_tables/table.tsv",
            "curation_tables/column.tsv",
            "curation_tables/datatype.tsv",
            "curation_tables/prefix.tsv",
            "curation_tables/import.tsv",
            "curation_tables/CCN001.tsv",
            "curation_tables/CCN001_config.tsv",
        ] {
            assert!(outdir.join(expected).exists(), "missing {}", expected);
        }

        // The template tables were bound to the project id.
        let table_tsv = fs::read_to_string(outdir.join("curation_tables/table.tsv")).unwrap();
        assert!(table_tsv.contains("CCN001_config"));
        assert!(!table_tsv.contains("{taxonomy_id}"));
    }

    #[test]
    fn test_seeded_project_validates_cleanly() {
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("CCN002");
        seed(seed_options(&outdir, "CCN002")).unwrap();

        let schema = Schema::load(&outdir.join("curation_tables")).unwrap();
        let mut run = ValidationRun::bind(&schema, &[]).unwrap();
        run.load_data(&outdir).unwrap();
        let report = run.execute();
        assert!(
            report.error_count() == 0,
            "diagnostics: {:?}",
            report.diagnostics
        );
    }

    #[test]
    fn test_seed_requires_an_id() {
        let dir = TempDir::new().unwrap();
        let mut options = seed_options(&dir.path().join("x"), "ignored");
        options.repo = None;
        let err = seed(options).unwrap_err();
        assert_eq!(err.code().code(), "TDT_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_parse_bind_args() {
        let binding =
            parse_bind_args(&["taxonomy_id=CCN001".to_string()]).unwrap();
        assert_eq!(binding.get("taxonomy_id"), Some("CCN001"));

        let err = parse_bind_args(&["malformed".to_string()]).unwrap_err();
        assert_eq!(err.code().code(), "TDT_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_validate_command_end_to_end() {
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("CCN003");
        seed(seed_options(&outdir, "CCN003")).unwrap();

        let config_path = dir.path().join("tdt.json");
        let config = serde_json::json!({
            "schema_dir": outdir.join("curation_tables").display().to_string(),
            "data_dir": outdir.display().to_string(),
        });
        fs::write(&config_path, config.to_string()).unwrap();

        let report_path = dir.path().join("report.json");
        let code = validate(&config_path, &[], Some(&report_path)).unwrap();
        assert_eq!(code, 0);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["partial"], false);
    }

    #[test]
    fn test_validate_reports_findings_in_exit_code() {
        let dir = TempDir::new().unwrap();
        let outdir = dir.path().join("CCN004");
        seed(seed_options(&outdir, "CCN004")).unwrap();

        // Introduce a dangling ontology_term reference.
        let taxonomy_path = outdir.join("curation_tables/CCN004.tsv");
        let mut content = fs::read_to_string(&taxonomy_path).unwrap();
        content.push_str("CS001\tsome label\t\tCL:9999999\n");
        fs::write(&taxonomy_path, content).unwrap();

        let config_path = dir.path().join("tdt.json");
        let config = serde_json::json!({
            "schema_dir": outdir.join("curation_tables").display().to_string(),
            "data_dir": outdir.display().to_string(),
        });
        fs::write(&config_path, config.to_string()).unwrap();

        let report_path = dir.path().join("report.json");
        let code = validate(&config_path, &[], Some(&report_path)).unwrap();
        assert_eq!(code, 1);
    }

    #[test]
    fn test_config_rejects_empty_schema_dir() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("tdt.json");
        fs::write(&config_path, r#"{"schema_dir": ""}"#).unwrap();
        let err = Config::load(&config_path).unwrap_err();
        assert_eq!(err.code().code(), "TDT_CLI_CONFIG_ERROR");
    }
}
