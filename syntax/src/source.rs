//! Source-anchored diagnostics.
//!
//! Errors are rendered as `<file>:<line>:<col>: <message>`, followed
//! by the offending source line and a caret/tilde underline. Tabs in
//! the source advance the underline to the same column the scanner
//! counted (next multiple of 8), so the caret lines up.

use colored::Colorize;
use csp_engine::diag::{RuntimeDiag, SourcePos};
use thiserror::Error;

/// A scanner- or parser-level error, positioned in the source.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SyntaxError {
    pub pos: SourcePos,
    pub len: u32,
    pub message: String,
}

impl SyntaxError {
    pub fn new(pos: SourcePos, len: u32, message: impl Into<String>) -> Self {
        Self { pos, len, message: message.into() }
    }
}

/// Collects and prints diagnostics against one source file.
pub struct Diagnostics {
    file: String,
    lines: Vec<String>,
    errors: usize,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>, source: &str) -> Self {
        Self {
            file: file.into(),
            lines: source.lines().map(str::to_string).collect(),
            errors: 0,
        }
    }

    /// Report a fatal-at-end error: counted, printed to stderr.
    pub fn error(&mut self, pos: SourcePos, len: u32, message: &str) {
        self.errors += 1;
        eprint!("{}", self.render(pos, len, message));
    }

    /// Report a runtime diagnostic: printed, but not counted — the
    /// trace continues.
    pub fn runtime(&self, diag: &RuntimeDiag) {
        eprint!("{}", self.render(diag.pos, 1, &diag.message));
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// The rendered diagnostic text (also used by tests).
    pub fn render(&self, pos: SourcePos, len: u32, message: &str) -> String {
        let mut out = format!(
            "{}:{}:{}: {}\n",
            self.file,
            pos.line,
            pos.column,
            message.red()
        );
        let Some(line) = self.lines.get(pos.line.saturating_sub(1) as usize)
        else {
            return out;
        };
        out.push_str(line);
        out.push('\n');
        out.push_str(&underline(line, pos.column, len));
        out.push('\n');
        out
    }
}

/// Build the caret/tilde underline for `line`, pointing at display
/// column `column` for `len` columns. Tabs are copied through so the
/// underline expands exactly like the line above it.
fn underline(line: &str, column: u32, len: u32) -> String {
    let mut out = String::new();
    let mut col = 1u32;
    for ch in line.chars() {
        if col >= column {
            break;
        }
        if ch == '\t' {
            out.push('\t');
            col += 8 - (col - 1) % 8;
        } else {
            out.push(' ');
            col += 1;
        }
    }
    out.push('^');
    for _ in 1..len.max(1) {
        out.push('~');
    }
    out
}
