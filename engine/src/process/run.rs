//! Stepping semantics: `acceptable` and `proceed`.
//!
//! `acceptable(status)` is the set of events a process is currently
//! willing to engage in — empty means deadlock, containing
//! `_success_` means the process is SKIP-equivalent at this point.
//! `proceed(event, status)` yields the successor: the node itself,
//! unchanged, when the event is outside its alphabet (the event is
//! none of its business); `None` when the node refused; otherwise a
//! fresh successor process together with a successor status.
//!
//! Everything an operator needs to remember between an `acceptable`
//! query and the `proceed` that follows — a committed internal choice,
//! a chaos draw, concealment's silently advanced inner process, the
//! sub-statuses of parallel branches — lives in the status's
//! extended-status table, never on the node, so a node shared by two
//! contexts keeps two independent runtime histories.

use tracing::debug;

use super::{Output, ProcId, ProcessGraph, ProcessKind};
use crate::alphabet::{Alphabet, SUCCESS};
use crate::status::{Extended, Status};

/// Concealment is inherently non-deterministic and possibly
/// divergent; its silent-step loop is cut off after this many
/// iterations, turning the process into STOP.
pub const CONCEAL_STEP_LIMIT: usize = 1000;

impl ProcessGraph {
    /// The events this process would engage in next.
    pub fn acceptable(&mut self, id: ProcId, status: &Status) -> Alphabet {
        match self.kind_cloned(id) {
            ProcessKind::Stop { .. } => Alphabet::new(),
            ProcessKind::Run { .. } => self.alphabet(id),
            ProcessKind::Skip { .. } => Alphabet::from_event(SUCCESS),
            ProcessKind::Chaos { .. } => self.chaos_decide(id, status),
            ProcessKind::Prefixed { event, .. } => Alphabet::from_event(event),
            ProcessKind::Selection { branches } => branches
                .into_iter()
                .fold(Alphabet::new(), |acc, b| {
                    acc.union(&self.acceptable(b, status))
                }),
            ProcessKind::Sequence { first, second } => {
                if self.accepts_success(first, status) {
                    self.acceptable(second, status)
                } else {
                    self.acceptable(first, status)
                }
            }
            ProcessKind::Parallel { left, right } => {
                let (ls, rs) = self.branch_statuses(id, status);
                let sd = self
                    .alphabet(left)
                    .symmetric_difference(&self.alphabet(right));
                let pa = self.acceptable(left, &ls);
                let qa = self.acceptable(right, &rs);
                pa.intersection(&qa)
                    .union(&sd.intersection(&pa))
                    .union(&sd.intersection(&qa))
            }
            ProcessKind::Interleaving { left, right }
            | ProcessKind::ExternalChoice { left, right } => {
                let (ls, rs) = self.branch_statuses(id, status);
                self.acceptable(left, &ls)
                    .union(&self.acceptable(right, &rs))
            }
            ProcessKind::InternalChoice { left, right } => {
                if self.internal_choice_side(id, status) {
                    self.acceptable(left, status)
                } else {
                    self.acceptable(right, status)
                }
            }
            ProcessKind::Concealed { inner, hidden } => {
                let (decided, inner_status) =
                    self.conceal_decide(id, inner, &hidden, status);
                match decided {
                    Some(p) => self
                        .acceptable(p, &inner_status)
                        .difference(&hidden),
                    None => Alphabet::new(),
                }
            }
            ProcessKind::Pipe { .. } | ProcessKind::Subordination { .. } => {
                let r = self.reduced(id);
                self.acceptable(r, status)
            }
            ProcessKind::Mapped { inner, changer } => {
                changer.map(&self.acceptable(inner, status))
            }
            ProcessKind::Reading { channel, .. } => {
                let name = self.channel(channel).name().to_string();
                self.alphabet(id).select_prefix(&name)
            }
            ProcessKind::Writing { channel, output, .. } => {
                let message = self.output_message(&output, status);
                let name = self.channel(channel).name();
                Alphabet::from_event(format!("{name}.{message}"))
            }
            ProcessKind::Definition { body, .. } => {
                self.acceptable(body, status)
            }
            ProcessKind::Reference { target, .. } => match target {
                Some(t) => {
                    let call = self.call_status(id, t, status);
                    self.acceptable(t, &call)
                }
                None => Alphabet::new(),
            },
        }
    }

    /// True iff `_success_` is accepted, i.e. the process is
    /// SKIP-equivalent at this point.
    pub fn accepts_success(&mut self, id: ProcId, status: &Status) -> bool {
        self.acceptable(id, status).is_member(SUCCESS)
    }

    /// Attempt to engage in `event`. An event outside the process's
    /// alphabet is none of its business: the process is returned
    /// unchanged. `None` means the process refused the event.
    pub fn proceed(
        &mut self,
        id: ProcId,
        event: &str,
        status: &Status,
    ) -> (Option<ProcId>, Status) {
        if !self.alphabet(id).is_member(event) {
            return (Some(id), status.clone());
        }
        self.step(id, event, status)
    }

    fn step(
        &mut self,
        id: ProcId,
        event: &str,
        status: &Status,
    ) -> (Option<ProcId>, Status) {
        match self.kind_cloned(id) {
            ProcessKind::Stop { .. } => (None, status.clone()),
            ProcessKind::Run { .. } => (Some(id), status.clone()),
            ProcessKind::Skip { .. } => {
                if event == SUCCESS {
                    let alphabet = self.alphabet(id);
                    let stop = self.add(ProcessKind::Stop { alpha_of: None });
                    self.force_alphabet(stop, alphabet);
                    (Some(stop), status.clone())
                } else {
                    (None, status.clone())
                }
            }
            ProcessKind::Chaos { .. } => {
                let accepting = match status.take_extended(id) {
                    Some(Extended::Accepting(a)) => a,
                    _ => self.chaos_draw(id, status),
                };
                if accepting.is_member(event) {
                    (Some(id), status.clone())
                } else {
                    (None, status.clone())
                }
            }
            ProcessKind::Prefixed { event: own, next } => {
                if own == event {
                    (Some(next), status.clone())
                } else {
                    (None, status.clone())
                }
            }
            ProcessKind::Selection { branches } => {
                for b in branches {
                    let (p, st) = self.proceed(b, event, status);
                    if p.is_some() {
                        return (p, st);
                    }
                }
                (None, status.clone())
            }
            ProcessKind::Sequence { first, second } => {
                if self.accepts_success(first, status) {
                    return self.proceed(second, event, status);
                }
                let (p, st) = self.proceed(first, event, status);
                match p {
                    Some(stepped) => {
                        let succ = self.add(ProcessKind::Sequence {
                            first: stepped,
                            second,
                        });
                        (Some(succ), st)
                    }
                    None => (None, status.clone()),
                }
            }
            ProcessKind::Parallel { left, right } => {
                let (ls, rs) = self.branch_statuses(id, status);
                let (lp, ls2) = self.proceed(left, event, &ls);
                let (rp, rs2) = self.proceed(right, event, &rs);
                match (lp, rp) {
                    (Some(l2), Some(r2)) => {
                        let succ = self.add(ProcessKind::Parallel {
                            left: l2,
                            right: r2,
                        });
                        status.set_extended(
                            succ,
                            Extended::Branches { left: ls2, right: rs2 },
                        );
                        (Some(succ), status.clone())
                    }
                    _ => (None, status.clone()),
                }
            }
            ProcessKind::Interleaving { left, right } => {
                let (ls, rs) = self.branch_statuses(id, status);
                let (ok_left, ok_right) =
                    self.tie_break(left, right, event, &ls, &rs, status);
                if ok_left {
                    let (lp, ls2) = self.proceed(left, event, &ls);
                    match lp {
                        Some(l2) => {
                            let succ = self.add(ProcessKind::Interleaving {
                                left: l2,
                                right,
                            });
                            status.set_extended(
                                succ,
                                Extended::Branches { left: ls2, right: rs },
                            );
                            (Some(succ), status.clone())
                        }
                        None => (None, status.clone()),
                    }
                } else if ok_right {
                    let (rp, rs2) = self.proceed(right, event, &rs);
                    match rp {
                        Some(r2) => {
                            let succ = self.add(ProcessKind::Interleaving {
                                left,
                                right: r2,
                            });
                            status.set_extended(
                                succ,
                                Extended::Branches { left: ls, right: rs2 },
                            );
                            (Some(succ), status.clone())
                        }
                        None => (None, status.clone()),
                    }
                } else {
                    (None, status.clone())
                }
            }
            ProcessKind::ExternalChoice { left, right } => {
                let (ls, rs) = self.branch_statuses(id, status);
                let (ok_left, _) =
                    self.tie_break(left, right, event, &ls, &rs, status);
                // the choice resolves: the taken branch's status
                // becomes the status of the whole process
                if ok_left {
                    self.proceed(left, event, &ls)
                } else {
                    self.proceed(right, event, &rs)
                }
            }
            ProcessKind::InternalChoice { left, right } => {
                let side = match status.take_extended(id) {
                    Some(Extended::Side(s)) => s,
                    _ => status.flip(),
                };
                if side {
                    self.proceed(left, event, status)
                } else {
                    self.proceed(right, event, status)
                }
            }
            ProcessKind::Concealed { inner, hidden } => {
                let (decided, inner_status) =
                    self.conceal_decide(id, inner, &hidden, status);
                status.take_extended(id);
                let Some(p) = decided else {
                    return (None, status.clone());
                };
                let (next, st2) = self.proceed(p, event, &inner_status);
                let Some(n) = next else {
                    return (None, status.clone());
                };
                let alphabet = self.alphabet(id);
                let succ = self.add(ProcessKind::Concealed {
                    inner: n,
                    hidden: hidden.clone(),
                });
                self.force_alphabet(succ, alphabet);
                status.set_extended(
                    succ,
                    Extended::Conceal { status: st2, decided: None },
                );
                (Some(succ), status.clone())
            }
            // stepping delegates to the reduced process without
            // rewrapping: the composed form carries the trace onward
            ProcessKind::Pipe { .. } | ProcessKind::Subordination { .. } => {
                let r = self.reduced(id);
                self.proceed(r, event, status)
            }
            ProcessKind::Mapped { inner, changer } => {
                let inner_event = changer.reverse_map_event(event);
                let (p, st) = self.proceed(inner, &inner_event, status);
                match p {
                    Some(p2) => {
                        let succ = self.add(ProcessKind::Mapped {
                            inner: p2,
                            changer,
                        });
                        (Some(succ), st)
                    }
                    None => (None, status.clone()),
                }
            }
            ProcessKind::Reading { channel, variable, next, .. } => {
                let prefix = format!("{}.", self.channel(channel).name());
                match event.strip_prefix(&prefix) {
                    Some(message) => {
                        let st = status
                            .bind([(variable, message.to_string())]);
                        (Some(next), st)
                    }
                    None => (None, status.clone()),
                }
            }
            ProcessKind::Writing { channel, output, next, .. } => {
                let message = self.output_message(&output, status);
                let expected =
                    format!("{}.{message}", self.channel(channel).name());
                if event == expected {
                    (Some(next), status.clone())
                } else {
                    (None, status.clone())
                }
            }
            ProcessKind::Definition { body, .. } => {
                self.proceed(body, event, status)
            }
            ProcessKind::Reference { target, .. } => match target {
                Some(t) => {
                    let call = self.call_status(id, t, status);
                    let result = self.proceed(t, event, &call);
                    status.take_extended(id);
                    result
                }
                None => (None, status.clone()),
            },
        }
    }

    /// Which sides may take `event`, PRNG-tie-broken when both could
    /// (interleaving and external choice share this rule).
    fn tie_break(
        &mut self,
        left: ProcId,
        right: ProcId,
        event: &str,
        ls: &Status,
        rs: &Status,
        status: &Status,
    ) -> (bool, bool) {
        let mut ok_left = self.acceptable(left, ls).is_member(event);
        let mut ok_right = self.acceptable(right, rs).is_member(event);
        if ok_left && ok_right {
            if status.flip() {
                ok_left = false;
            } else {
                ok_right = false;
            }
        }
        (ok_left, ok_right)
    }

    /// The persistent per-branch sub-statuses of a composition node,
    /// materialised the first time the operator is asked.
    fn branch_statuses(&self, id: ProcId, status: &Status) -> (Status, Status) {
        if let Some(Extended::Branches { left, right }) =
            status.peek_extended(id)
        {
            return (left, right);
        }
        let left = status.child();
        let right = status.child();
        status.set_extended(
            id,
            Extended::Branches { left: left.clone(), right: right.clone() },
        );
        (left, right)
    }

    /// Internal choice: commit to a side on first ask; the commitment
    /// binds the following step, which consumes it.
    fn internal_choice_side(&self, id: ProcId, status: &Status) -> bool {
        if let Some(Extended::Side(side)) = status.peek_extended(id) {
            return side;
        }
        let side = status.flip();
        status.set_extended(id, Extended::Side(side));
        side
    }

    /// Chaos: the acceptance set for the pending step, drawn once and
    /// remembered until the step consumes it.
    fn chaos_decide(&mut self, id: ProcId, status: &Status) -> Alphabet {
        if let Some(Extended::Accepting(a)) = status.peek_extended(id) {
            return a;
        }
        let drawn = self.chaos_draw(id, status);
        status.set_extended(id, Extended::Accepting(drawn.clone()));
        drawn
    }

    fn chaos_draw(&mut self, id: ProcId, status: &Status) -> Alphabet {
        let alphabet = self.alphabet(id);
        Alphabet::from_events(
            alphabet.iter().filter(|_| status.flip()).map(str::to_string),
        )
    }

    /// Concealment's silent-step loop: advance the inner process past
    /// concealed events, chosen uniformly among its acceptable ones,
    /// until a non-concealed event surfaces (decide on this inner),
    /// the inner deadlocks (decide STOP), or the iteration cap cuts
    /// off divergence (decide STOP). The decision and the evolved
    /// inner status are kept in extended status until the next step
    /// consumes them.
    fn conceal_decide(
        &mut self,
        id: ProcId,
        inner: ProcId,
        hidden: &Alphabet,
        status: &Status,
    ) -> (Option<ProcId>, Status) {
        let mut st = match status.peek_extended(id) {
            Some(Extended::Conceal { status, decided: Some(d) }) => {
                return (d, status);
            }
            Some(Extended::Conceal { status, decided: None }) => status,
            _ => status.child(),
        };
        let mut current = Some(inner);
        let mut count = 0;
        let decided = loop {
            let Some(p) = current else {
                break None; // the inner process refused: deadlock
            };
            if count >= CONCEAL_STEP_LIMIT {
                debug!(
                    node = ?id,
                    limit = CONCEAL_STEP_LIMIT,
                    "concealment cut off, deciding STOP"
                );
                break None;
            }
            count += 1;
            let acceptable = self.acceptable(p, &st);
            if acceptable.is_empty() {
                break None; // deadlock
            }
            let Some(event) =
                st.with_prng(|prng| acceptable.draw_event(prng))
            else {
                break None;
            };
            if !hidden.is_member(&event) {
                break Some(p);
            }
            let (next, st2) = self.proceed(p, &event, &st);
            st = st2;
            current = next;
        };
        status.set_extended(
            id,
            Extended::Conceal { status: st.clone(), decided: Some(decided) },
        );
        (decided, st)
    }

    /// The composed form a pipe or subordination reduces to, built on
    /// first use and cached on the node.
    fn reduced(&mut self, id: ProcId) -> ProcId {
        match self.kind(id) {
            ProcessKind::Pipe { reduced: Some(r), .. }
            | ProcessKind::Subordination { reduced: Some(r), .. } => *r,
            ProcessKind::Pipe { left, right, .. } => {
                let (l, r) = (*left, *right);
                let built = self.build_pipe(l, r);
                if let ProcessKind::Pipe { reduced, .. } =
                    &mut self.nodes[id.0 as usize].kind
                {
                    *reduced = Some(built);
                }
                built
            }
            ProcessKind::Subordination { left, right, .. } => {
                let (l, r) = (*left, *right);
                let built = self.build_subordination(l, r);
                if let ProcessKind::Subordination { reduced, .. } =
                    &mut self.nodes[id.0 as usize].kind
                {
                    *reduced = Some(built);
                }
                built
            }
            _ => unreachable!("reduced on a non-composite"),
        }
    }

    /// `P >> Q` becomes: rename P's `right` and Q's `left` onto a
    /// fresh middle channel, conceal everything else that is not
    /// `left`/`right` traffic, compose in parallel, and conceal the
    /// middle channel.
    fn build_pipe(&mut self, left: ProcId, right: ProcId) -> ProcId {
        use crate::changer::SymbolChanger;
        let mid = self.mint_unique_name();
        debug!(middle = %mid, "reducing pipe");
        let p = self.add(ProcessKind::Mapped {
            inner: left,
            changer: SymbolChanger::channel_map("right", &mid),
        });
        let p = self.conceal_except(p, "left", &mid);
        let q = self.add(ProcessKind::Mapped {
            inner: right,
            changer: SymbolChanger::channel_map("left", &mid),
        });
        let q = self.conceal_except(q, &mid, "right");
        let par = self.add(ProcessKind::Parallel { left: p, right: q });
        let conceal = self.alphabet(par).select_prefix(&mid);
        if conceal.is_empty() {
            par
        } else {
            self.add(ProcessKind::Concealed { inner: par, hidden: conceal })
        }
    }

    /// `P // Q` becomes `(P || Q) \ (αP ∩ αQ)`.
    fn build_subordination(&mut self, left: ProcId, right: ProcId) -> ProcId {
        let par = self.add(ProcessKind::Parallel { left, right });
        let conceal =
            self.alphabet(left).intersection(&self.alphabet(right));
        if conceal.is_empty() {
            par
        } else {
            self.add(ProcessKind::Concealed { inner: par, hidden: conceal })
        }
    }

    /// Conceal every event of `p` that is on neither of two channels.
    fn conceal_except(
        &mut self,
        p: ProcId,
        keep_a: &str,
        keep_b: &str,
    ) -> ProcId {
        let hidden = self
            .alphabet(p)
            .exclude_prefix(keep_a)
            .exclude_prefix(keep_b);
        if hidden.is_empty() {
            p
        } else {
            self.add(ProcessKind::Concealed { inner: p, hidden })
        }
    }

    /// The call status of a parameterised reference: a child status
    /// binding formals to actuals, the actuals themselves dereferenced
    /// from the caller's bindings when already bound. Plain references
    /// delegate with the caller's status unchanged.
    fn call_status(
        &mut self,
        id: ProcId,
        target: ProcId,
        status: &Status,
    ) -> Status {
        let params = match self.kind(target) {
            ProcessKind::Definition { params, .. } => params.clone(),
            _ => Vec::new(),
        };
        if params.is_empty() {
            return status.clone();
        }
        if let Some(Extended::Call(st)) = status.peek_extended(id) {
            return st;
        }
        let actuals = match self.kind(id) {
            ProcessKind::Reference { actuals, .. } => actuals.clone(),
            _ => Vec::new(),
        };
        let bindings = params.into_iter().zip(actuals).map(|(p, a)| {
            let value = status.lookup(&a).unwrap_or(a);
            (p, value)
        });
        let st = status.bind(bindings);
        status.set_extended(id, Extended::Call(st.clone()));
        st
    }

    /// The message an output prefix writes with the given bindings.
    fn output_message(&self, output: &Output, status: &Status) -> String {
        match output {
            Output::Var { name, pos } => match status.lookup(name) {
                Some(value) => value,
                None => {
                    self.diags.report(*pos, format!("{name} is not bound"));
                    name.clone()
                }
            },
            Output::Expr(e) => e.eval(status, &self.diags).to_string(),
        }
    }
}
