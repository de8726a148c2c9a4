//! Containerized tool launcher
//!
//! Thin wrapper around the packaged toolchain: resolves the container
//! image/tag and a git identity, then invokes a subcommand inside the
//! container with the working directory mounted. Not part of the validation
//! core; the only contract is `invoke(subcommand, args, workdir) -> exit
//! code`.
//!
//! Resolution order:
//! - image: `TDT_IMAGE`, default `tdt`
//! - tag: `TDT_TAG`, default `latest`
//! - git identity: `TDT_GITNAME`/`TDT_GITEMAIL`, falling back to the local
//!   `git config user.name`/`user.email`

use std::io;
use std::path::Path;
use std::process::Command;

const DEFAULT_IMAGE: &str = "tdt";
const DEFAULT_TAG: &str = "latest";

/// A resolved launcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    pub image: String,
    pub tag: String,
    pub gitname: Option<String>,
    pub gitemail: Option<String>,
}

impl Launcher {
    /// Resolves from the process environment and local git configuration.
    pub fn from_env() -> Self {
        Self::resolve(
            |key| std::env::var(key).ok().filter(|v| !v.is_empty()),
            git_config_value,
        )
    }

    /// Resolution with injected lookups, so tests never touch process env.
    pub fn resolve<E, G>(env: E, git_config: G) -> Self
    where
        E: Fn(&str) -> Option<String>,
        G: Fn(&str) -> Option<String>,
    {
        Self {
            image: env("TDT_IMAGE").unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            tag: env("TDT_TAG").unwrap_or_else(|| DEFAULT_TAG.to_string()),
            gitname: env("TDT_GITNAME").or_else(|| git_config("user.name")),
            gitemail: env("TDT_GITEMAIL").or_else(|| git_config("user.email")),
        }
    }

    /// The fully qualified image reference.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// Runs a subcommand inside the container with `workdir` mounted,
    /// passing remaining arguments through unmodified.
    pub fn invoke(&self, subcommand: &str, args: &[String], workdir: &Path) -> io::Result<i32> {
        let mut command = Command::new("docker");
        command
            .arg("run")
            .arg("--rm")
            .arg("-v")
            .arg(format!("{}:/work", workdir.display()))
            .arg("-w")
            .arg("/work");
        if let Some(name) = &self.gitname {
            command.arg("-e").arg(format!("GIT_AUTHOR_NAME={}", name));
            command.arg("-e").arg(format!("GIT_COMMITTER_NAME={}", name));
        }
        if let Some(email) = &self.gitemail {
            command.arg("-e").arg(format!("GIT_AUTHOR_EMAIL={}", email));
            command
                .arg("-e")
                .arg(format!("GIT_COMMITTER_EMAIL={}", email));
        }
        command.arg(self.image_ref()).arg(subcommand).args(args);

        let status = command.status()?;
        Ok(status.code().unwrap_or(1))
    }
}

/// Reads one value from local git configuration; None when git is absent,
/// errors, or the value is unset.
fn git_config_value(key: &str) -> Option<String> {
    let output = Command::new("git").args(["config", key]).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8(output.stdout).ok()?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
