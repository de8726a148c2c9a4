//! Structured JSON logger
//!
//! - One log line = one event
//! - Deterministic key ordering (event, level, then fields alphabetically)
//! - Synchronous, unbuffered
//! - Global minimum level, settable once by the CLI

use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

/// Log levels, lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Synchronous structured logger; events below the global minimum level are
/// dropped.
pub struct Logger;

impl Logger {
    /// Sets the global minimum level (e.g. from `--verbose`).
    pub fn set_level(level: Level) {
        MIN_LEVEL.store(level as u8, Ordering::Relaxed);
    }

    fn enabled(level: Level) -> bool {
        level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
    }

    pub fn trace(event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(Level::Trace) {
            Self::write(Level::Trace, event, fields, &mut io::stdout());
        }
    }

    pub fn info(event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(Level::Info) {
            Self::write(Level::Info, event, fields, &mut io::stdout());
        }
    }

    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(Level::Warn) {
            Self::write(Level::Warn, event, fields, &mut io::stderr());
        }
    }

    pub fn error(event: &str, fields: &[(&str, &str)]) {
        if Self::enabled(Level::Error) {
            Self::write(Level::Error, event, fields, &mut io::stderr());
        }
    }

    fn write<W: Write>(level: Level, event: &str, fields: &[(&str, &str)], writer: &mut W) {
        let line = Self::render(level, event, fields);
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    /// Renders one event as a single JSON line with deterministic key order.
    fn render(level: Level, event: &str, fields: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("{\"event\":\"");
        escape_into(&mut out, event);
        out.push_str("\",\"level\":\"");
        out.push_str(level.as_str());
        out.push('"');

        let mut sorted: Vec<_> = fields.iter().collect();
        sorted.sort_by_key(|(key, _)| *key);
        for (key, value) in sorted {
            out.push_str(",\"");
            escape_into(&mut out, key);
            out.push_str("\":\"");
            escape_into(&mut out, value);
            out.push('"');
        }
        out.push_str("}\n");
        out
    }
}

fn escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}
