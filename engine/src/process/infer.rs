//! Alphabet inference by monotone fixed-point propagation.
//!
//! A node's alphabet, unless set explicitly, is derived from the set
//! of mutually recursive equations defining it: on first query the
//! node wires itself into its dependencies' dependant lists, computes
//! an initial alphabet from its children (implicitly dropping
//! `_success_`), and installs it via `propagate`. Propagation unions
//! monotonically; whenever a node's alphabet strictly grows, the new
//! alphabet is forwarded to every dependant, which first applies its
//! own inbound mapping (the identity everywhere except mapped
//! processes, which rename through their symbol changer). Explicitly
//! set alphabets are frozen and absorb propagation silently.

use tracing::trace;

use super::{ProcId, ProcessGraph, ProcessKind};
use crate::alphabet::{Alphabet, SUCCESS};

impl ProcessGraph {
    /// The alphabet of a process. Idempotent; the first call per node
    /// triggers dependency wiring and fixed-point propagation.
    pub fn alphabet(&mut self, id: ProcId) -> Alphabet {
        self.ensure_dependencies(id);
        if !self.meta(id).alphabet_initialized {
            // mark first: recursive equations come back around to
            // this node and must read the (partial) cache instead of
            // recursing forever
            self.meta_mut(id).alphabet_initialized = true;
            let initial = self.initial_alphabet(id);
            self.propagate(id, &initial);
        }
        self.meta(id).alphabet.clone()
    }

    /// Monotone union of `new` into the node's alphabet; on strict
    /// growth the updated alphabet is forwarded to all dependants.
    pub fn propagate(&mut self, id: ProcId, new: &Alphabet) {
        if self.meta(id).alphabet_fixed {
            return;
        }
        let current = &self.meta(id).alphabet;
        if new.difference(current).is_empty() {
            return;
        }
        let grown = current.union(new);
        trace!(node = id.0, alphabet = %grown, "alphabet grew");
        self.meta_mut(id).alphabet = grown.clone();
        let dependants = self.meta(id).dependants.clone();
        for d in dependants {
            let inbound = self.inbound_map(d, &grown);
            self.propagate(d, &inbound);
        }
    }

    /// The mapping a node applies to alphabets arriving from its
    /// dependencies: identity except for mapped processes.
    fn inbound_map(&self, id: ProcId, alphabet: &Alphabet) -> Alphabet {
        match self.kind(id) {
            ProcessKind::Mapped { changer, .. } => changer.map(alphabet),
            _ => alphabet.clone(),
        }
    }

    /// First-use wiring: register this node on its dependencies'
    /// dependant lists and subscribe channel links.
    fn ensure_dependencies(&mut self, id: ProcId) {
        if self.meta(id).dependencies_initialized {
            return;
        }
        self.meta_mut(id).dependencies_initialized = true;
        match self.kind_cloned(id) {
            ProcessKind::Stop { alpha_of }
            | ProcessKind::Run { alpha_of }
            | ProcessKind::Skip { alpha_of }
            | ProcessKind::Chaos { alpha_of } => {
                if let Some(p) = alpha_of {
                    self.add_dependant(p, id);
                }
            }
            ProcessKind::Prefixed { next, .. } => {
                self.add_dependant(next, id);
            }
            ProcessKind::Selection { branches } => {
                for b in branches {
                    self.add_dependant(b, id);
                }
            }
            ProcessKind::Sequence { first: a, second: b }
            | ProcessKind::Parallel { left: a, right: b }
            | ProcessKind::Interleaving { left: a, right: b }
            | ProcessKind::ExternalChoice { left: a, right: b }
            | ProcessKind::InternalChoice { left: a, right: b } => {
                self.add_dependant(a, id);
                self.add_dependant(b, id);
            }
            // a concealment recomputes from its inner process and a
            // pipe from its reduced form; neither tracks growth
            ProcessKind::Concealed { .. } | ProcessKind::Pipe { .. } => {}
            ProcessKind::Subordination { left, right, .. } => {
                // the subordinate's alphabet must cover its master's
                self.add_dependant(right, left);
            }
            ProcessKind::Mapped { inner, .. } => {
                self.add_dependant(inner, id);
            }
            ProcessKind::Reading { channel, next, .. } => {
                self.add_channel(id, channel);
                self.add_dependant(next, id);
            }
            ProcessKind::Writing { channel, next, .. } => {
                self.add_channel(id, channel);
                self.add_dependant(next, id);
            }
            ProcessKind::Definition { body, .. } => {
                self.add_dependant(body, id);
            }
            ProcessKind::Reference { target, .. } => {
                if let Some(t) = target {
                    self.add_dependant(t, id);
                }
            }
        }
    }

    /// The node's own contribution: children's alphabets, literal
    /// events it introduces, and subscribed channel alphabets, with
    /// the implicit `_success_` removed.
    fn initial_alphabet(&mut self, id: ProcId) -> Alphabet {
        let mut alphabet = self.internal_alphabet(id);
        let channels = self.meta(id).channels.clone();
        if !channels.is_empty() {
            let owner = self.owner_of(id);
            for c in channels {
                let contributed =
                    self.channel(c).alphabet_for(owner.as_deref()).clone();
                alphabet = alphabet.union(&contributed);
            }
        }
        alphabet.difference(&Alphabet::from_event(SUCCESS))
    }

    fn internal_alphabet(&mut self, id: ProcId) -> Alphabet {
        match self.kind_cloned(id) {
            ProcessKind::Stop { alpha_of }
            | ProcessKind::Run { alpha_of }
            | ProcessKind::Chaos { alpha_of } => match alpha_of {
                Some(p) => self.alphabet(p),
                None => self.meta(id).alphabet.clone(),
            },
            ProcessKind::Skip { alpha_of } => {
                let base = match alpha_of {
                    Some(p) => self.alphabet(p),
                    None => self.meta(id).alphabet.clone(),
                };
                base.union(&Alphabet::from_event(SUCCESS))
            }
            ProcessKind::Prefixed { event, next } => {
                Alphabet::from_event(event).union(&self.alphabet(next))
            }
            ProcessKind::Selection { branches } => branches
                .into_iter()
                .fold(Alphabet::new(), |acc, b| acc.union(&self.alphabet(b))),
            ProcessKind::Sequence { first: a, second: b }
            | ProcessKind::Parallel { left: a, right: b }
            | ProcessKind::Interleaving { left: a, right: b }
            | ProcessKind::ExternalChoice { left: a, right: b }
            | ProcessKind::InternalChoice { left: a, right: b } => {
                self.alphabet(a).union(&self.alphabet(b))
            }
            ProcessKind::Concealed { inner, hidden } => {
                self.alphabet(inner).difference(&hidden)
            }
            ProcessKind::Pipe { left, right, .. } => self
                .alphabet(left)
                .select_prefix("left")
                .union(&self.alphabet(right).select_prefix("right")),
            ProcessKind::Subordination { left, right, .. } => {
                let master = self.alphabet(left);
                self.alphabet(right).difference(&master)
            }
            ProcessKind::Mapped { inner, changer } => {
                changer.map(&self.alphabet(inner))
            }
            ProcessKind::Reading { next, .. }
            | ProcessKind::Writing { next, .. } => self.alphabet(next),
            ProcessKind::Definition { body, .. } => self.alphabet(body),
            ProcessKind::Reference { target, .. } => match target {
                Some(t) => self.alphabet(t),
                None => Alphabet::new(),
            },
        }
    }

    /// The defining process name a channel subscription belongs to,
    /// selecting any per-process channel alphabet.
    fn owner_of(&self, id: ProcId) -> Option<String> {
        match self.kind(id) {
            ProcessKind::Reading { owner, .. }
            | ProcessKind::Writing { owner, .. } => owner.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::channel::Channel;
    use crate::process::ProcessKind;

    fn set(members: &[&str]) -> Alphabet {
        Alphabet::from_events(members.iter().copied())
    }

    /// `P = a -> b -> P` via a definition and a reference back to it.
    fn recursive_pair(graph: &mut ProcessGraph, a: &str, b: &str) -> ProcId {
        let def = graph.add_definition("P", vec![], false);
        let back = graph.add(ProcessKind::Reference {
            name: "P".into(),
            actuals: vec![],
            pos: Default::default(),
            target: Some(def),
        });
        let inner = graph.add(ProcessKind::Prefixed {
            event: b.into(),
            next: back,
        });
        let outer = graph.add(ProcessKind::Prefixed {
            event: a.into(),
            next: inner,
        });
        graph.set_definition_body(def, outer);
        def
    }

    #[test]
    fn recursion_reaches_a_fixed_point() {
        let mut g = ProcessGraph::new();
        let p = recursive_pair(&mut g, "a", "b");
        assert_eq!(g.alphabet(p), set(&["a", "b"]));
        // idempotent
        assert_eq!(g.alphabet(p), set(&["a", "b"]));
    }

    #[test]
    fn propagation_is_monotone() {
        let mut g = ProcessGraph::new();
        let p = recursive_pair(&mut g, "a", "b");
        let before = g.alphabet(p);
        g.propagate(p, &set(&["c"]));
        let after = g.alphabet(p);
        assert!(before.is_subset(&after));
        assert!(after.is_member("c"));
    }

    #[test]
    fn explicit_alphabet_is_frozen() {
        let mut g = ProcessGraph::new();
        let stop = g.add(ProcessKind::Stop { alpha_of: None });
        g.set_alphabet(stop, set(&["tick"])).unwrap();
        g.propagate(stop, &set(&["tock"]));
        assert_eq!(g.alphabet(stop), set(&["tick"]));
    }

    #[test]
    fn non_regular_explicit_alphabet_is_rejected() {
        let mut g = ProcessGraph::new();
        let stop = g.add(ProcessKind::Stop { alpha_of: None });
        assert!(g.set_alphabet(stop, Alphabet::integer()).is_err());
        assert!(g.set_alphabet(stop, Alphabet::new()).is_err());
    }

    #[test]
    fn success_is_not_part_of_skip_alphabet() {
        let mut g = ProcessGraph::new();
        let skip = g.add(ProcessKind::Skip { alpha_of: None });
        g.set_alphabet(skip, set(&["a"])).unwrap();
        let stop = g.add(ProcessKind::Stop { alpha_of: None });
        g.set_alphabet(stop, set(&["a"])).unwrap();
        let seq = g.add(ProcessKind::Sequence { first: skip, second: stop });
        assert_eq!(g.alphabet(seq), set(&["a"]));
    }

    #[test]
    fn constants_can_borrow_an_alphabet() {
        let mut g = ProcessGraph::new();
        let p = recursive_pair(&mut g, "a", "b");
        let run = g.add(ProcessKind::Run { alpha_of: Some(p) });
        assert_eq!(g.alphabet(run), set(&["a", "b"]));
    }

    #[test]
    fn mapped_alphabet_is_renamed_and_stays_renamed() {
        let mut g = ProcessGraph::new();
        let p = recursive_pair(&mut g, "a", "b");
        let mapped = g.add(ProcessKind::Mapped {
            inner: p,
            changer: crate::changer::SymbolChanger::qualifier("l"),
        });
        assert_eq!(g.alphabet(mapped), set(&["l.a", "l.b"]));
        // growth in the inner process arrives mapped
        g.propagate(p, &set(&["c"]));
        assert!(g.alphabet(mapped).is_member("l.c"));
    }

    #[test]
    fn channel_subscription_contributes() {
        let mut g = ProcessGraph::new();
        let mut chan = Channel::new("c");
        assert!(chan.set_alphabet(set(&["0", "1"])));
        let c = g.new_channel(chan);

        let stop = g.add(ProcessKind::Stop { alpha_of: None });
        g.set_alphabet(stop, set(&["done"])).unwrap();
        let read = g.add(ProcessKind::Reading {
            channel: c,
            variable: "x".into(),
            next: stop,
            owner: None,
        });
        assert_eq!(g.alphabet(read), set(&["c.0", "c.1", "done"]));
    }

    #[test]
    fn subordination_widens_the_master() {
        let mut g = ProcessGraph::new();
        let master = recursive_pair(&mut g, "a", "b");
        let servant = recursive_pair(&mut g, "c", "d");
        let sub = g.add(ProcessKind::Subordination {
            left: master,
            right: servant,
            reduced: None,
        });
        // visible alphabet is the servant's minus the master's
        assert_eq!(g.alphabet(sub), set(&["c", "d"]));
        // and the master's alphabet grew to cover the servant's
        assert!(set(&["c", "d"]).is_subset(&g.alphabet(master)));
    }
}
