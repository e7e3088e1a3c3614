//! Error types for include resolution

use std::path::{Path, PathBuf};

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Errors raised while expanding `$include` directives
///
/// In soft mode every variant is converted into a placeholder node at the
/// offending directive; in strict mode it aborts the whole resolution call.
#[derive(Error, Debug)]
pub enum IncludeError {
    /// Resolved path escapes the sandbox root
    #[error("include path escapes the UI root: {requested}")]
    SandboxViolation { requested: String, resolved: PathBuf },

    /// File missing, unreadable or not valid JSON
    #[error("failed to load include {}: {message}", path.display())]
    LoadFailure {
        path: PathBuf,
        message: String,
        /// Line and column (1-based) for JSON syntax errors
        position: Option<(usize, usize)>,
    },

    /// Path re-entered within one include chain
    #[error("cyclic include: {}", format_chain(chain))]
    CyclicInclude { chain: Vec<PathBuf> },

    /// Directive value of an unrecognised shape
    #[error("malformed include directive {directive}: {reason}")]
    MalformedDirective { directive: String, reason: String },
}

impl IncludeError {
    pub fn sandbox(requested: impl Into<String>, resolved: PathBuf) -> Self {
        Self::SandboxViolation {
            requested: requested.into(),
            resolved,
        }
    }

    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::LoadFailure {
            path: path.to_path_buf(),
            message: err.to_string(),
            position: None,
        }
    }

    pub fn parse(path: &Path, err: &serde_json::Error) -> Self {
        Self::LoadFailure {
            path: path.to_path_buf(),
            message: err.to_string(),
            position: Some((err.line(), err.column())),
        }
    }

    pub fn cyclic(chain: Vec<PathBuf>) -> Self {
        Self::CyclicInclude { chain }
    }

    pub fn malformed(directive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDirective {
            directive: directive.into(),
            reason: reason.into(),
        }
    }

    /// Format the error, with source context for JSON syntax errors
    ///
    /// Falls back to the plain message when the offending file can no longer
    /// be read.
    pub fn format(&self) -> String {
        let Self::LoadFailure {
            path,
            message,
            position: Some((line, column)),
        } = self
        else {
            return self.to_string();
        };
        let Ok(source) = std::fs::read_to_string(path) else {
            return self.to_string();
        };

        let filename = path.display().to_string();
        let offset = byte_offset(&source, *line, *column);
        let span = offset..(offset + 1).min(source.len().max(offset));

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename.as_str(), offset)
            .with_message("invalid JSON in included file")
            .with_label(
                Label::new((filename.as_str(), span))
                    .with_message(message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename.as_str(), Source::from(source.as_str())), &mut buf);
        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

fn format_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Convert serde_json's 1-based line/column into a byte offset
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}
