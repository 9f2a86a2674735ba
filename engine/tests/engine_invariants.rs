//! Engine-level invariants, exercised on hand-built process graphs.

use csp_engine::{
    Alphabet, Prng, ProcId, ProcessGraph, ProcessKind, Status, SUCCESS,
};
use proptest::prelude::*;

fn set(members: &[&str]) -> Alphabet {
    Alphabet::from_events(members.iter().copied())
}

fn status(seed: u64) -> Status {
    Status::new(Prng::seeded(seed))
}

fn stop(g: &mut ProcessGraph, alphabet: &[&str]) -> ProcId {
    let id = g.add(ProcessKind::Stop { alpha_of: None });
    g.set_alphabet(id, set(alphabet)).unwrap();
    id
}

fn prefixed(g: &mut ProcessGraph, event: &str, next: ProcId) -> ProcId {
    g.add(ProcessKind::Prefixed { event: event.to_string(), next })
}

/// `NAME = e₁ -> e₂ -> … -> NAME`.
fn cycle(g: &mut ProcessGraph, name: &str, events: &[&str]) -> ProcId {
    let def = g.add_definition(name, vec![], false);
    let back = g.add(ProcessKind::Reference {
        name: name.to_string(),
        actuals: vec![],
        pos: Default::default(),
        target: Some(def),
    });
    let body = events
        .iter()
        .rev()
        .fold(back, |next, event| prefixed(g, event, next));
    g.set_definition_body(def, body);
    def
}

/// `VM = coin -> (choc -> VM | toffee -> VM)`.
fn vending(g: &mut ProcessGraph) -> ProcId {
    let def = g.add_definition("VM", vec![], false);
    let back = |g: &mut ProcessGraph| {
        g.add(ProcessKind::Reference {
            name: "VM".to_string(),
            actuals: vec![],
            pos: Default::default(),
            target: Some(def),
        })
    };
    let b1 = back(g);
    let b1 = prefixed(g, "choc", b1);
    let b2 = back(g);
    let b2 = prefixed(g, "toffee", b2);
    let select = g.add(ProcessKind::Selection { branches: vec![b1, b2] });
    let body = prefixed(g, "coin", select);
    g.set_definition_body(def, body);
    def
}

#[test]
fn constants_accept_what_they_should() {
    let mut g = ProcessGraph::new();
    let st = status(0);

    let stop = stop(&mut g, &["a", "b"]);
    assert!(g.acceptable(stop, &st).is_empty());
    assert_eq!(g.proceed(stop, "a", &st).0, None);

    let run = g.add(ProcessKind::Run { alpha_of: None });
    g.set_alphabet(run, set(&["a", "b"])).unwrap();
    assert_eq!(g.acceptable(run, &st), set(&["a", "b"]));
    assert_eq!(g.proceed(run, "a", &st).0, Some(run));

    let skip = g.add(ProcessKind::Skip { alpha_of: None });
    g.set_alphabet(skip, set(&["a"])).unwrap();
    assert_eq!(g.acceptable(skip, &st), set(&[SUCCESS]));
    assert!(g.accepts_success(skip, &st));
}

#[test]
fn chaos_decision_binds_the_following_step() {
    let mut g = ProcessGraph::new();
    let chaos = g.add(ProcessKind::Chaos { alpha_of: None });
    g.set_alphabet(chaos, set(&["a", "b", "c"])).unwrap();

    for seed in 0..32 {
        let st = status(seed);
        let accepted = g.acceptable(chaos, &st);
        // the drawn set is remembered until consumed
        assert_eq!(g.acceptable(chaos, &st), accepted);
        for event in ["a", "b", "c"] {
            if accepted.is_member(event) {
                let (next, _) = g.proceed(chaos, event, &st);
                assert_eq!(next, Some(chaos));
                break;
            }
        }
    }
}

#[test]
fn out_of_alphabet_events_are_none_of_our_business() {
    let mut g = ProcessGraph::new();
    let vm = vending(&mut g);
    let st = status(1);
    let (next, _) = g.proceed(vm, "kettle", &st);
    assert_eq!(next, Some(vm));
}

#[test]
fn vending_machine_walk() {
    let mut g = ProcessGraph::new();
    let vm = vending(&mut g);
    let st = status(1);

    assert_eq!(g.alphabet(vm), set(&["coin", "choc", "toffee"]));
    assert_eq!(g.acceptable(vm, &st), set(&["coin"]));

    let (p, st) = g.proceed(vm, "coin", &st);
    let p = p.unwrap();
    assert_eq!(g.acceptable(p, &st), set(&["choc", "toffee"]));

    let (p, st) = g.proceed(p, "choc", &st);
    let p = p.unwrap();
    assert_eq!(g.acceptable(p, &st), set(&["coin"]));
}

#[test]
fn composition_alphabets_are_unions() {
    let mut g = ProcessGraph::new();
    let p = cycle(&mut g, "P", &["a", "b"]);
    let q = cycle(&mut g, "Q", &["b", "c"]);
    let expected = set(&["a", "b", "c"]);

    for kind in [
        ProcessKind::Parallel { left: p, right: q },
        ProcessKind::Interleaving { left: p, right: q },
        ProcessKind::ExternalChoice { left: p, right: q },
        ProcessKind::InternalChoice { left: p, right: q },
    ] {
        let id = g.add(kind);
        assert_eq!(g.alphabet(id), expected);
    }
}

#[test]
fn concealment_subtracts_from_the_alphabet() {
    let mut g = ProcessGraph::new();
    let p = cycle(&mut g, "P", &["a", "b"]);
    let hidden = set(&["a"]);
    let c = g.add(ProcessKind::Concealed { inner: p, hidden });
    assert_eq!(g.alphabet(c), set(&["b"]));
}

#[test]
fn parallel_synchronises_on_the_shared_alphabet() {
    let mut g = ProcessGraph::new();
    let p = cycle(&mut g, "P", &["a", "b"]);
    let q = cycle(&mut g, "Q", &["b", "c"]);
    let r = g.add(ProcessKind::Parallel { left: p, right: q });
    let st = status(3);

    // b is shared but Q is not ready for it until after its own a…
    // — initially only a (P-only, P ready) is acceptable
    assert_eq!(g.acceptable(r, &st), set(&["a"]));
    let (r1, st) = g.proceed(r, "a", &st);
    let r1 = r1.unwrap();
    assert_eq!(g.acceptable(r1, &st), set(&["b"]));

    // stepping the shared b requires both sides; before a it refuses
    let st2 = status(3);
    let (refused, _) = g.proceed(r, "b", &st2);
    assert_eq!(refused, None);

    let (r2, st) = g.proceed(r1, "b", &st);
    let r2 = r2.unwrap();
    assert_eq!(g.acceptable(r2, &st), set(&["a", "c"]));
}

#[test]
fn interleaved_branches_step_independently() {
    let mut g = ProcessGraph::new();
    let s1 = stop(&mut g, &["tick"]);
    let p1 = prefixed(&mut g, "tick", s1);
    let s2 = stop(&mut g, &["tick"]);
    let p2 = prefixed(&mut g, "tick", s2);
    let t = g.add(ProcessKind::Interleaving { left: p1, right: p2 });
    let st = status(7);

    assert_eq!(g.acceptable(t, &st), set(&["tick"]));
    let (t1, st) = g.proceed(t, "tick", &st);
    let t1 = t1.unwrap();
    assert_eq!(g.acceptable(t1, &st), set(&["tick"]));
    let (t2, st) = g.proceed(t1, "tick", &st);
    let t2 = t2.unwrap();
    assert!(g.acceptable(t2, &st).is_empty());
}

#[test]
fn internal_choice_commitment_binds_acceptable_and_step() {
    let mut g = ProcessGraph::new();
    let sa = stop(&mut g, &["a"]);
    let pa = prefixed(&mut g, "a", sa);
    let sb = stop(&mut g, &["b"]);
    let pb = prefixed(&mut g, "b", sb);
    let choice = g.add(ProcessKind::InternalChoice { left: pa, right: pb });

    for seed in 0..32 {
        let st = status(seed);
        let committed = g.acceptable(choice, &st);
        assert!(committed == set(&["a"]) || committed == set(&["b"]));
        // the committed side answers the step
        let event = committed.iter().next().unwrap().to_string();
        let (next, _) = g.proceed(choice, &event, &st);
        assert!(next.is_some());
    }
}

#[test]
fn concealment_skips_hidden_events_silently() {
    // P = (a -> b -> P) \ {a}: the a is consumed internally
    let mut g = ProcessGraph::new();
    let p = cycle(&mut g, "P", &["a", "b"]);
    let c = g.add(ProcessKind::Concealed { inner: p, hidden: set(&["a"]) });
    let st = status(11);

    assert_eq!(g.alphabet(c), set(&["b"]));
    assert_eq!(g.acceptable(c, &st), set(&["b"]));
    let (c1, st) = g.proceed(c, "b", &st);
    let c1 = c1.unwrap();
    // observable behaviour is unchanged
    assert_eq!(g.alphabet(c1), set(&["b"]));
    assert_eq!(g.acceptable(c1, &st), set(&["b"]));
}

#[test]
fn divergent_concealment_is_cut_off_as_stop() {
    // RUN {a} \ {a} would diverge; the cap decides STOP instead
    let mut g = ProcessGraph::new();
    let run = g.add(ProcessKind::Run { alpha_of: None });
    g.set_alphabet(run, set(&["a"])).unwrap();
    let c = g.add(ProcessKind::Concealed { inner: run, hidden: set(&["a"]) });
    let st = status(13);
    assert!(g.acceptable(c, &st).is_empty());
    assert_eq!(g.proceed(c, "a", &st).0, Some(c)); // a is not in α(c)
}

#[test]
fn sequence_hands_over_on_success() {
    let mut g = ProcessGraph::new();
    let skip = g.add(ProcessKind::Skip { alpha_of: None });
    g.set_alphabet(skip, set(&["a"])).unwrap();
    let sa = stop(&mut g, &["a"]);
    let first = prefixed(&mut g, "a", skip);
    let second = prefixed(&mut g, "a", sa);
    let seq = g.add(ProcessKind::Sequence { first, second });
    let st = status(0);

    // first is not yet successful: it answers
    assert_eq!(g.acceptable(seq, &st), set(&["a"]));
    let (s1, st) = g.proceed(seq, "a", &st);
    let s1 = s1.unwrap();
    // now the first is SKIP: the second answers
    assert_eq!(g.acceptable(s1, &st), set(&["a"]));
    let (s2, st) = g.proceed(s1, "a", &st);
    let s2 = s2.unwrap();
    assert!(g.acceptable(s2, &st).is_empty());
}

#[test]
fn fixed_seed_fixed_trace() {
    // the same seed and event sequence reproduce the same successors
    let run = |seed: u64| -> Vec<String> {
        let mut g = ProcessGraph::new();
        let s1 = stop(&mut g, &["tick", "tock"]);
        let p1 = prefixed(&mut g, "tick", s1);
        let s2 = stop(&mut g, &["tick", "tock"]);
        let p2 = prefixed(&mut g, "tick", s2);
        let t = g.add(ProcessKind::Interleaving { left: p1, right: p2 });
        let st = status(seed);
        let (t1, st) = g.proceed(t, "tick", &st);
        let t1 = t1.unwrap();
        let successor = format!("{}", g.display(t1));
        let acceptable = format!("{}", g.acceptable(t1, &st));
        vec![successor, acceptable]
    };
    assert_eq!(run(99), run(99));
    assert_eq!(run(7), run(7));
}

proptest! {
    #[test]
    fn acceptable_is_bounded_by_the_alphabet(seed in any::<u64>()) {
        let mut g = ProcessGraph::new();
        let p = cycle(&mut g, "P", &["a", "b"]);
        let q = cycle(&mut g, "Q", &["b", "c"]);
        let chaos = g.add(ProcessKind::Chaos { alpha_of: Some(p) });
        let nodes = vec![
            g.add(ProcessKind::Parallel { left: p, right: q }),
            g.add(ProcessKind::Interleaving { left: p, right: q }),
            g.add(ProcessKind::InternalChoice { left: p, right: q }),
            chaos,
        ];
        let bound = set(&["a", "b", "c", SUCCESS]);
        for id in nodes {
            let st = status(seed);
            let acceptable = g.acceptable(id, &st);
            prop_assert!(acceptable.is_subset(&bound));
            let alpha = g.alphabet(id).union(&set(&[SUCCESS]));
            prop_assert!(acceptable.is_subset(&alpha));
        }
    }

    #[test]
    fn propagation_never_shrinks(events in proptest::collection::btree_set("[a-z]{1,3}", 0..6)) {
        let mut g = ProcessGraph::new();
        let p = cycle(&mut g, "P", &["a", "b"]);
        let before = g.alphabet(p);
        let extra = Alphabet::from_events(events.iter().cloned());
        g.propagate(p, &extra);
        let after = g.alphabet(p);
        prop_assert!(before.is_subset(&after));
        prop_assert!(extra.is_subset(&after));
    }
}
