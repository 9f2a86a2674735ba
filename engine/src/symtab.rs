//! The symbol environment.
//!
//! Scopes form a spaghetti stack: opening pushes a child scope,
//! closing pops it and retries every pending reference — required for
//! mutual recursion, where a name is used before its equation has been
//! read. References that are still unresolved when the outermost
//! scope closes are fatal. The table also hands out the unique
//! synthetic symbols (`$0`, `$1`, …) pipes use for their middle
//! channels; the counter lives in the graph because pipes keep
//! minting after parsing has finished.

use std::collections::HashMap;

use crate::channel::ChanId;
use crate::diag::SourcePos;
use crate::error::EngineError;
use crate::process::{ProcId, ProcessGraph};

#[derive(Debug, Default)]
struct ScopeFrame {
    processes: HashMap<String, ProcId>,
    channels: HashMap<String, ChanId>,
}

/// A name referenced before its definition was seen.
#[derive(Debug)]
pub struct PendingRef {
    pub name: String,
    pub pos: SourcePos,
    pub node: ProcId,
}

#[derive(Debug, Default)]
pub struct SymTable {
    scopes: Vec<ScopeFrame>,
    pending: Vec<PendingRef>,
}

impl SymTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self) {
        self.scopes.push(ScopeFrame::default());
    }

    /// Close the innermost scope. All pending references are retried;
    /// when the outermost scope closes, the survivors are returned as
    /// fatal errors (arity mismatches surface here too).
    pub fn close(
        &mut self,
        graph: &mut ProcessGraph,
    ) -> Result<(), Vec<EngineError>> {
        assert!(!self.scopes.is_empty());
        let mut errors = Vec::new();
        let mut survivors = Vec::new();
        for pending in self.pending.drain(..) {
            match lookup_in(&self.scopes, &pending.name) {
                Some(target) => {
                    if let Err(e) = graph.resolve_reference(pending.node, target)
                    {
                        errors.push(e);
                    }
                }
                None => survivors.push(pending),
            }
        }
        self.pending = survivors;
        let outermost = self.scopes.len() == 1;
        if outermost {
            for pending in self.pending.drain(..) {
                errors.push(EngineError::Unresolved {
                    name: pending.name,
                    pos: pending.pos,
                });
            }
        }
        self.scopes.pop();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Insert a process definition into the innermost scope.
    pub fn insert_process(
        &mut self,
        name: &str,
        id: ProcId,
    ) -> Result<(), EngineError> {
        let scope = self.scopes.last_mut().expect("no open scope");
        if scope.processes.contains_key(name) {
            return Err(EngineError::Duplicate { name: name.to_string() });
        }
        scope.processes.insert(name.to_string(), id);
        Ok(())
    }

    pub fn insert_channel(
        &mut self,
        name: &str,
        id: ChanId,
    ) -> Result<(), EngineError> {
        let scope = self.scopes.last_mut().expect("no open scope");
        if scope.channels.contains_key(name) {
            return Err(EngineError::Duplicate { name: name.to_string() });
        }
        scope.channels.insert(name.to_string(), id);
        Ok(())
    }

    pub fn lookup_process(&self, name: &str) -> Option<ProcId> {
        lookup_in(&self.scopes, name)
    }

    pub fn lookup_channel(&self, name: &str) -> Option<ChanId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.channels.get(name))
            .copied()
    }

    /// Queue a reference for retry at scope close.
    pub fn add_pending(&mut self, name: &str, pos: SourcePos, node: ProcId) {
        self.pending.push(PendingRef {
            name: name.to_string(),
            pos,
            node,
        });
    }

    /// Mint a unique synthetic symbol.
    pub fn unique_symbol(&mut self, graph: &mut ProcessGraph) -> String {
        graph.mint_unique_name()
    }
}

fn lookup_in(scopes: &[ScopeFrame], name: &str) -> Option<ProcId> {
    scopes.iter().rev().find_map(|s| s.processes.get(name)).copied()
}
