// src/exec/diagnostic.rs

//! Compile diagnostics: the structured failure value of a task run.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Where in a source file a compiler reported a problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(line) = self.line {
            write!(f, ":{line}")?;
            if let Some(col) = self.column {
                write!(f, ":{col}")?;
            }
        }
        Ok(())
    }
}

/// A failed task run, as surfaced to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{loc}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Build a diagnostic from raw compiler output, picking up the first
    /// recognisable source location.
    pub fn from_compiler_output(output: &str, exit_code: Option<i32>) -> Self {
        let trimmed = output.trim();
        let message = if trimmed.is_empty() {
            match exit_code {
                Some(code) => format!("compiler exited with status {code} and no output"),
                None => "compiler was terminated by a signal".to_string(),
            }
        } else {
            trimmed.to_string()
        };

        Self {
            location: find_location(trimmed),
            message,
        }
    }
}

fn location_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // lessc: "... in /abs/app.less on line 3, column 5:"
            r"in (?P<file>\S+) on line (?P<line>\d+), column (?P<col>\d+)",
            // tsc / gcc style: "file.ts(3,5)" or "file.ts:3:5"
            r"(?P<file>[\w./\\-]+\.\w+)(?:\((?P<line>\d+),(?P<col>\d+)\)|:(?P<line2>\d+)(?::(?P<col2>\d+))?)",
            // elm: "-- TYPE MISMATCH ------------ app/elm/Main.elm"
            r"(?m)^-- [A-Z ]+ -+ (?P<file>\S+)\s*$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn find_location(output: &str) -> Option<SourceLocation> {
    for re in location_patterns() {
        if let Some(caps) = re.captures(output) {
            let number = |names: &[&str]| {
                names
                    .iter()
                    .find_map(|n| caps.name(n))
                    .and_then(|m| m.as_str().parse::<u32>().ok())
            };
            return Some(SourceLocation {
                file: caps["file"].to_string(),
                line: number(&["line", "line2"]),
                column: number(&["col", "col2"]),
            });
        }
    }
    None
}
