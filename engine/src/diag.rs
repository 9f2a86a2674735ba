//! Runtime diagnostics as data.
//!
//! The engine reports runtime conditions (a bound variable used in
//! arithmetic that is not an integer literal, division by zero) as
//! positioned records; the driver drains them each step and renders
//! them against the source text. The engine itself never prints.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A position in the script, 1-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A runtime diagnostic. Non-fatal: the trace continues.
#[derive(Clone, Debug)]
pub struct RuntimeDiag {
    pub pos: SourcePos,
    pub message: String,
}

/// Shared sink the process graph hands to expression evaluation.
#[derive(Clone, Debug, Default)]
pub struct DiagSink {
    diags: Rc<RefCell<Vec<RuntimeDiag>>>,
}

impl DiagSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, pos: SourcePos, message: impl Into<String>) {
        self.diags
            .borrow_mut()
            .push(RuntimeDiag { pos, message: message.into() });
    }

    /// Remove and return everything reported since the last drain.
    pub fn drain(&self) -> Vec<RuntimeDiag> {
        self.diags.borrow_mut().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.borrow().is_empty()
    }
}
