//! The process graph.
//!
//! All process nodes of a trace live in one arena, addressed by
//! copyable [`ProcId`] indices; sub-processes are shared by index, so
//! the graph is a DAG (cyclic through references, which is fine: the
//! arena owns every node and the dependant back-edges are plain
//! indices). Successor processes created while stepping are appended
//! to the same arena.
//!
//! Each node couples its operator (one [`ProcessKind`] variant per CSP
//! operator) with cached metadata: the inferred alphabet and its
//! initialisation flags, the dependant back-edges used by fixed-point
//! propagation, and the channels the node subscribed to. The metadata
//! is monotone and may be shared freely; every other piece of runtime
//! state lives in the [`Status`](crate::status::Status) threaded
//! through `acceptable` and `proceed` (see `run.rs`).

mod infer;
mod run;

pub use run::CONCEAL_STEP_LIMIT;

use std::fmt;

use crate::alphabet::Alphabet;
use crate::changer::SymbolChanger;
use crate::channel::{ChanId, Channel};
use crate::diag::{DiagSink, SourcePos};
use crate::error::EngineError;
use crate::expr::Expr;

/// Index of a process node in the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcId(u32);

impl ProcId {
    #[cfg(test)]
    pub(crate) fn testing(index: u32) -> Self {
        ProcId(index)
    }
}

/// The payload of an output prefix `c!…`.
#[derive(Clone, Debug)]
pub enum Output {
    /// A bound variable, passed through verbatim.
    Var { name: String, pos: SourcePos },
    /// An arithmetic expression; the written message is its value.
    Expr(Expr),
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Output::Var { name, .. } => write!(f, "{name}"),
            Output::Expr(e) => write!(f, "{e}"),
        }
    }
}

/// One variant per CSP operator.
#[derive(Clone, Debug)]
pub enum ProcessKind {
    /// `STOP α`: accepts nothing.
    Stop { alpha_of: Option<ProcId> },
    /// `RUN α`: accepts its whole alphabet, forever.
    Run { alpha_of: Option<ProcId> },
    /// `SKIP α`: accepts `_success_` and becomes STOP.
    Skip { alpha_of: Option<ProcId> },
    /// `CHAOS α`: accepts a freshly drawn subset each time it is asked.
    Chaos { alpha_of: Option<ProcId> },
    /// `event -> P`.
    Prefixed { event: String, next: ProcId },
    /// `P₁ | P₂ | …` — event-prefixed choice; at least one branch.
    Selection { branches: Vec<ProcId> },
    /// `P; Q`.
    Sequence { first: ProcId, second: ProcId },
    /// `P || Q` — lock-step on the shared alphabet.
    Parallel { left: ProcId, right: ProcId },
    /// `P ||| Q`.
    Interleaving { left: ProcId, right: ProcId },
    /// `P [] Q`.
    ExternalChoice { left: ProcId, right: ProcId },
    /// `P |~| Q`.
    InternalChoice { left: ProcId, right: ProcId },
    /// `P \ A`, |A| > 0.
    Concealed { inner: ProcId, hidden: Alphabet },
    /// `P >> Q`, reduced on first use to a composed expression.
    Pipe { left: ProcId, right: ProcId, reduced: Option<ProcId> },
    /// `P // Q`, reduced on first use to `(P || Q) \ (αP ∩ αQ)`.
    Subordination { left: ProcId, right: ProcId, reduced: Option<ProcId> },
    /// `f(P)` — a process seen through a symbol changer.
    Mapped { inner: ProcId, changer: SymbolChanger },
    /// `c?v -> P`.
    Reading {
        channel: ChanId,
        variable: String,
        next: ProcId,
        /// Name of the enclosing definition, for per-process channel
        /// alphabets.
        owner: Option<String>,
    },
    /// `c!expr -> P`.
    Writing {
        channel: ChanId,
        output: Output,
        next: ProcId,
        owner: Option<String>,
    },
    /// A named, possibly parameterised definition `N(p…) = P`, or a
    /// recursion `mu N . P`.
    Definition {
        name: String,
        params: Vec<String>,
        body: ProcId,
        recursive: bool,
    },
    /// A use of a name, patched to its target on resolution.
    Reference {
        name: String,
        actuals: Vec<String>,
        pos: SourcePos,
        target: Option<ProcId>,
    },
}

/// Cached, monotone node metadata.
#[derive(Debug, Default)]
pub(crate) struct Meta {
    pub(crate) alphabet: Alphabet,
    pub(crate) alphabet_fixed: bool,
    pub(crate) alphabet_initialized: bool,
    pub(crate) dependencies_initialized: bool,
    pub(crate) dependants: Vec<ProcId>,
    pub(crate) channels: Vec<ChanId>,
}

#[derive(Debug)]
struct Node {
    kind: ProcessKind,
    meta: Meta,
}

/// The arena holding every process node and channel of one script.
#[derive(Debug, Default)]
pub struct ProcessGraph {
    nodes: Vec<Node>,
    channels: Vec<Channel>,
    unique_counter: u32,
    diags: DiagSink,
}

impl ProcessGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node and return its index.
    pub fn add(&mut self, kind: ProcessKind) -> ProcId {
        if let ProcessKind::Selection { branches } = &kind {
            debug_assert!(!branches.is_empty());
        }
        let id = ProcId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, meta: Meta::default() });
        id
    }

    pub fn kind(&self, id: ProcId) -> &ProcessKind {
        &self.nodes[id.0 as usize].kind
    }

    pub(crate) fn kind_cloned(&self, id: ProcId) -> ProcessKind {
        self.nodes[id.0 as usize].kind.clone()
    }

    pub(crate) fn meta(&self, id: ProcId) -> &Meta {
        &self.nodes[id.0 as usize].meta
    }

    pub(crate) fn meta_mut(&mut self, id: ProcId) -> &mut Meta {
        &mut self.nodes[id.0 as usize].meta
    }

    /// Install an explicit alphabet and freeze the node.
    pub fn set_alphabet(
        &mut self,
        id: ProcId,
        alphabet: Alphabet,
    ) -> Result<(), EngineError> {
        if !alphabet.is_regular() {
            return Err(EngineError::NonRegularAlphabet);
        }
        if alphabet.cardinality() == 0 {
            return Err(EngineError::EmptyAlphabet);
        }
        self.force_alphabet(id, alphabet);
        Ok(())
    }

    /// Unchecked variant used internally when rewrapping successors
    /// (a concealed alphabet may legitimately be empty).
    pub(crate) fn force_alphabet(&mut self, id: ProcId, alphabet: Alphabet) {
        let meta = self.meta_mut(id);
        meta.alphabet = alphabet;
        meta.alphabet_fixed = true;
        meta.alphabet_initialized = true;
    }

    /// Register `dependant` to be re-propagated when `id` grows.
    pub fn add_dependant(&mut self, id: ProcId, dependant: ProcId) {
        self.meta_mut(id).dependants.push(dependant);
    }

    /// Subscribe node `id` to a channel: the channel's alphabet joins
    /// the node's.
    pub fn add_channel(&mut self, id: ProcId, channel: ChanId) {
        self.meta_mut(id).channels.push(channel);
    }

    /// Register a channel with the graph.
    pub fn new_channel(&mut self, channel: Channel) -> ChanId {
        let id = ChanId(self.channels.len() as u32);
        self.channels.push(channel);
        id
    }

    pub fn channel(&self, id: ChanId) -> &Channel {
        &self.channels[id.0 as usize]
    }

    pub fn channel_mut(&mut self, id: ChanId) -> &mut Channel {
        &mut self.channels[id.0 as usize]
    }

    /// Mint a fresh synthetic name (`$0`, `$1`, …).
    pub fn mint_unique_name(&mut self) -> String {
        let n = self.unique_counter;
        self.unique_counter += 1;
        format!("${n}")
    }

    /// The shared sink runtime diagnostics are reported into.
    pub fn diagnostics(&self) -> DiagSink {
        self.diags.clone()
    }

    /// Create a definition whose body is not yet known: recursion
    /// needs the definition in scope while its body is parsed. The
    /// body starts out as a self-loop and must be patched with
    /// [`set_definition_body`](Self::set_definition_body) before use.
    pub fn add_definition(
        &mut self,
        name: impl Into<String>,
        params: Vec<String>,
        recursive: bool,
    ) -> ProcId {
        let id = ProcId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind: ProcessKind::Definition {
                name: name.into(),
                params,
                body: id,
                recursive,
            },
            meta: Meta::default(),
        });
        id
    }

    /// Patch a definition whose body was not yet known when the node
    /// was created.
    pub fn set_definition_body(&mut self, id: ProcId, new_body: ProcId) {
        match &mut self.nodes[id.0 as usize].kind {
            ProcessKind::Definition { body, .. } => *body = new_body,
            _ => unreachable!("set_definition_body on a non-definition"),
        }
    }

    /// Patch a reference to its resolved target, validating arity.
    pub fn resolve_reference(
        &mut self,
        id: ProcId,
        target: ProcId,
    ) -> Result<(), EngineError> {
        let expected = match self.kind(target) {
            ProcessKind::Definition { params, .. } => params.len(),
            _ => 0,
        };
        match &mut self.nodes[id.0 as usize].kind {
            ProcessKind::Reference { name, actuals, pos, target: slot } => {
                if actuals.len() != expected {
                    return Err(EngineError::ArityMismatch {
                        name: name.clone(),
                        expected,
                        got: actuals.len(),
                        pos: *pos,
                    });
                }
                *slot = Some(target);
                Ok(())
            }
            _ => unreachable!("resolve_reference on a non-reference"),
        }
    }

    /// Render a process in source syntax.
    pub fn display(&self, id: ProcId) -> ProcDisplay<'_> {
        ProcDisplay { graph: self, id, top_level: false }
    }

    /// Render a process at top level: prefixed forms and selections
    /// are parenthesised.
    pub fn display_expanded(&self, id: ProcId) -> ProcDisplay<'_> {
        ProcDisplay { graph: self, id, top_level: true }
    }

    fn fmt_node(&self, id: ProcId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind(id) {
            ProcessKind::Stop { .. } => {
                write!(f, "STOP {}", self.meta(id).alphabet)
            }
            ProcessKind::Run { .. } => {
                write!(f, "RUN {}", self.meta(id).alphabet)
            }
            ProcessKind::Skip { .. } => {
                write!(f, "SKIP {}", self.meta(id).alphabet)
            }
            ProcessKind::Chaos { .. } => {
                write!(f, "CHAOS {}", self.meta(id).alphabet)
            }
            ProcessKind::Prefixed { event, next } => {
                write!(f, "{event} -> ")?;
                self.fmt_node(*next, f)
            }
            ProcessKind::Selection { branches } => {
                for (i, b) in branches.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    self.fmt_node(*b, f)?;
                }
                Ok(())
            }
            ProcessKind::Sequence { first, second } => {
                self.fmt_node(*first, f)?;
                write!(f, "; ")?;
                self.fmt_node(*second, f)
            }
            ProcessKind::Parallel { left, right } => {
                self.fmt_binary(*left, "||", *right, f)
            }
            ProcessKind::Interleaving { left, right } => {
                self.fmt_binary(*left, "|||", *right, f)
            }
            ProcessKind::ExternalChoice { left, right } => {
                self.fmt_binary(*left, "[]", *right, f)
            }
            ProcessKind::InternalChoice { left, right } => {
                self.fmt_binary(*left, "|~|", *right, f)
            }
            ProcessKind::Concealed { inner, hidden } => {
                self.fmt_node(*inner, f)?;
                write!(f, " \\ {hidden}")
            }
            ProcessKind::Pipe { left, right, .. } => {
                self.fmt_binary(*left, ">>", *right, f)
            }
            ProcessKind::Subordination { left, right, .. } => {
                self.fmt_binary(*left, "//", *right, f)
            }
            ProcessKind::Mapped { inner, changer } => {
                let inner = format!("({})", self.display(*inner));
                write!(f, "{}", changer.display_name(&inner))
            }
            ProcessKind::Reading { channel, variable, next, .. } => {
                write!(f, "{}?{variable} -> ", self.channel(*channel).name())?;
                self.fmt_node(*next, f)
            }
            ProcessKind::Writing { channel, output, next, .. } => {
                write!(f, "{}!{output} -> ", self.channel(*channel).name())?;
                self.fmt_node(*next, f)
            }
            ProcessKind::Definition { name, params, body, recursive } => {
                if *recursive {
                    write!(f, "mu {name}")?;
                    if self.meta(id).alphabet_fixed {
                        write!(f, ":{}", self.meta(id).alphabet)?;
                    }
                    write!(f, ".")?;
                    return self.fmt_node(*body, f);
                }
                write!(f, "{name}")?;
                if !params.is_empty() {
                    write!(f, "({})", params.join(", "))?;
                }
                write!(f, " = ")?;
                self.fmt_node(*body, f)
            }
            ProcessKind::Reference { name, actuals, .. } => {
                write!(f, "{name}")?;
                if !actuals.is_empty() {
                    write!(f, "({})", actuals.join(", "))?;
                }
                Ok(())
            }
        }
    }

    fn fmt_binary(
        &self,
        left: ProcId,
        op: &str,
        right: ProcId,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.fmt_node(left, f)?;
        write!(f, " {op} ")?;
        self.fmt_node(right, f)
    }
}

pub struct ProcDisplay<'a> {
    graph: &'a ProcessGraph,
    id: ProcId,
    top_level: bool,
}

impl fmt::Display for ProcDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parenthesise = self.top_level
            && matches!(
                self.graph.kind(self.id),
                ProcessKind::Prefixed { .. }
                    | ProcessKind::Selection { .. }
                    | ProcessKind::Reading { .. }
                    | ProcessKind::Writing { .. }
            );
        if parenthesise {
            write!(f, "(")?;
            self.graph.fmt_node(self.id, f)?;
            write!(f, ")")
        } else {
            self.graph.fmt_node(self.id, f)
        }
    }
}
