//! Structured JSON logger
//!
//! - One line per event
//! - `event` first, then `severity`, then fields sorted by key
//! - Synchronous, unbuffered, written to stderr so stdout stays free for
//!   command output

use std::fmt;
use std::io::{self, Write};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Per-decision detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stateless JSON line logger
pub struct Logger;

impl Logger {
    /// Log an event with the given severity and fields
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        let line = Self::format_line(severity, event, fields);
        let mut stderr = io::stderr().lock();
        // Logging must never fail the caller
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }

    /// Render one log line, newline included
    pub fn format_line(severity: Severity, event: &str, fields: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("{\"event\":");
        push_json_str(&mut out, event);
        out.push_str(",\"severity\":");
        push_json_str(&mut out, severity.as_str());

        let mut sorted: Vec<&(&str, &str)> = fields.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            out.push(',');
            push_json_str(&mut out, key);
            out.push(':');
            push_json_str(&mut out, value);
        }

        out.push_str("}\n");
        out
    }
}

fn push_json_str(out: &mut String, s: &str) {
    // serde_json handles escaping; a &str always serializes
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}
