//! The process algebra core of the CSP tracer.
//!
//! This crate implements Hoare's CSP operators as an executable
//! process graph:
//!
//! - [`alphabet`] — event sets with integer/string wildcards and
//!   templated members, and the `+ − * /` set algebra over them;
//! - [`process`] — the arena of process nodes (one variant per
//!   operator), alphabet inference by monotone fixed-point
//!   propagation, and the non-deterministic stepping semantics
//!   (`acceptable` / `proceed`);
//! - [`status`] — the runtime status threaded through every step:
//!   variable bindings, the shared seeded PRNG, and per-node extended
//!   status;
//! - [`channel`], [`changer`], [`expr`], [`symtab`] — channels,
//!   symbol-renaming functions, message arithmetic, and the scoped
//!   symbol environment the parser populates.
//!
//! The crate is deliberately front-end agnostic: a parser builds a
//! graph and a symbol table, a driver loops over `acceptable` and
//! `proceed`. Runtime diagnostics come back as positioned data
//! ([`diag`]), never as prints.

pub mod alphabet;
pub mod changer;
pub mod channel;
pub mod diag;
pub mod error;
pub mod expr;
pub mod prng;
pub mod process;
pub mod status;
pub mod symtab;

pub use alphabet::{Alphabet, AlphabetKind, SUCCESS};
pub use changer::SymbolChanger;
pub use channel::{ChanId, Channel};
pub use diag::{DiagSink, RuntimeDiag, SourcePos};
pub use error::EngineError;
pub use expr::{BinOp, Expr, Value};
pub use prng::Prng;
pub use process::{Output, ProcId, ProcessGraph, ProcessKind};
pub use status::Status;
pub use symtab::SymTable;
