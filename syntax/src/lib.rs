//! Front end for the CSP tracer's source language.
//!
//! [`scanner`] tokenises a script, [`parser`] builds a process graph
//! and symbol table from it, and [`source`] renders positioned
//! diagnostics against the original text.

pub mod parser;
pub mod scanner;
pub mod source;

pub use parser::parse_script;
pub use scanner::{Scanner, Tok, Token};
pub use source::{Diagnostics, SyntaxError};
