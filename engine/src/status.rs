//! Runtime status threaded through `acceptable` and `proceed`.
//!
//! A status carries the nested name→value scope of bound variables and
//! parameter bindings, a handle to the shared trace PRNG, and the
//! extended-status table: per-node scratch memory for operators that
//! decide something between an `acceptable` query and the `proceed`
//! that consumes the decision (internal choice commitments, chaos
//! draws, concealment decisions, the persistent sub-statuses of
//! parallel composition and its relatives).
//!
//! Statuses are cheap to clone and never mutated across branches that
//! may be abandoned: binding produces a child status with a fresh
//! scope frame, and sibling sub-statuses get independent extended
//! tables. Only the PRNG is genuinely shared, so a single seed
//! determines the whole trace.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::alphabet::Alphabet;
use crate::prng::Prng;
use crate::process::ProcId;

#[derive(Clone, Debug)]
pub struct Status {
    scope: Option<Rc<Frame>>,
    prng: Rc<RefCell<Prng>>,
    extended: Rc<RefCell<HashMap<ProcId, Extended>>>,
}

#[derive(Debug)]
struct Frame {
    parent: Option<Rc<Frame>>,
    bindings: HashMap<String, String>,
}

/// Per-node scratch memory, keyed by node identity in the owning
/// status. Consumed or carried forward by the node that wrote it.
#[derive(Clone, Debug)]
pub(crate) enum Extended {
    /// Internal choice: committed side (`true` = left).
    Side(bool),
    /// Chaos: the subset drawn for the pending step.
    Accepting(Alphabet),
    /// Concealment: the evolving inner status, plus the decided inner
    /// process once the silent-step loop has run (`Some(None)` means
    /// the loop decided STOP).
    Conceal { status: Status, decided: Option<Option<ProcId>> },
    /// Parallel / interleaving / external choice: the persistent
    /// per-branch sub-statuses.
    Branches { left: Status, right: Status },
    /// Parameterised reference: the call status binding formals.
    Call(Status),
}

impl Status {
    /// The root status of a trace.
    pub fn new(prng: Prng) -> Self {
        Self {
            scope: None,
            prng: Rc::new(RefCell::new(prng)),
            extended: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// A child status: same scope and PRNG, fresh extended table.
    /// Sub-statuses of sibling branches must be created this way so
    /// neither can observe the other's scratch state.
    pub fn child(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            prng: Rc::clone(&self.prng),
            extended: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// A child status with additional bindings in a new scope frame.
    pub fn bind<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            scope: Some(Rc::new(Frame {
                parent: self.scope.clone(),
                bindings: bindings.into_iter().collect(),
            })),
            prng: Rc::clone(&self.prng),
            extended: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Look a bound name up through the scope chain.
    pub fn lookup(&self, name: &str) -> Option<String> {
        let mut frame = self.scope.as_deref();
        while let Some(f) = frame {
            if let Some(v) = f.bindings.get(name) {
                return Some(v.clone());
            }
            frame = f.parent.as_deref();
        }
        None
    }

    pub fn flip(&self) -> bool {
        self.prng.borrow_mut().flip()
    }

    pub fn draw(&self, upper_limit: usize) -> usize {
        self.prng.borrow_mut().draw(upper_limit)
    }

    /// Run `f` with the shared generator borrowed mutably.
    pub fn with_prng<T>(&self, f: impl FnOnce(&mut Prng) -> T) -> T {
        f(&mut self.prng.borrow_mut())
    }

    pub(crate) fn peek_extended(&self, id: ProcId) -> Option<Extended> {
        self.extended.borrow().get(&id).cloned()
    }

    pub(crate) fn set_extended(&self, id: ProcId, ext: Extended) {
        self.extended.borrow_mut().insert(id, ext);
    }

    pub(crate) fn take_extended(&self, id: ProcId) -> Option<Extended> {
        self.extended.borrow_mut().remove(&id)
    }
}
