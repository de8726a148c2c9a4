//! Report output for the CLI
//!
//! The JSON report goes to stdout or a file; the human-readable summary
//! always goes to stderr so piped output stays machine-readable.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::validate::Report;

use super::errors::CliResult;

/// Write a raw JSON string to stdout
pub fn write_json(json_str: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", json_str)?;
    stdout.flush()?;
    Ok(())
}

/// Write the report JSON to a file
pub fn write_report_file(path: &Path, report: &Report) -> CliResult<()> {
    fs::write(path, report.to_json()?)?;
    Ok(())
}

/// One-line human summary of a finished run
pub fn print_summary(report: &Report) {
    let verdict = if report.partial {
        "PARTIAL"
    } else if report.is_success() {
        "PASS"
    } else {
        "FAIL"
    };
    eprintln!(
        "{}: {} error(s), {} warning(s) [run {}]",
        verdict,
        report.error_count(),
        report.warning_count(),
        report.run_id
    );
}
