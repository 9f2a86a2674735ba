//! Event sets with wildcard support.
//!
//! An [`Alphabet`] is a set of events. Most alphabets are *regular*:
//! explicit, finite sets of event names. Two further kinds stand for
//! the infinite families a channel of numbers or strings induces:
//! the *integer* kind contains every non-empty digit string, the
//! *string* kind every quoted literal. A regular alphabet may in turn
//! carry *templated* members such as `c.*integer*` which match every
//! concrete event with that prefix and payload kind.
//!
//! Set operations are defined across kinds. Intersection and subset
//! tests are decided by element-wise membership probes so that a
//! template and a literal it covers can meet correctly, e.g.
//! `{c.1} * {c.*integer*} = {c.1}`.

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

use itertools::Itertools;

use crate::prng::Prng;

/// The distinguished event signalling successful termination (SKIP).
pub const SUCCESS: &str = "_success_";

/// Templated member tail standing for any non-empty digit string.
pub const INTEGER_TEMPLATE: &str = "*integer*";

/// Templated member tail standing for any quoted string literal.
pub const STRING_TEMPLATE: &str = "*string*";

/// Which family of events an alphabet denotes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlphabetKind {
    /// An explicit finite set (possibly containing templated members).
    #[default]
    Regular,
    /// Every non-empty digit string.
    Integer,
    /// Every quoted string literal.
    String,
}

/// A set of events.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Alphabet {
    kind: AlphabetKind,
    events: BTreeSet<String>,
}

fn is_integer_literal(event: &str) -> bool {
    !event.is_empty() && event.bytes().all(|b| b.is_ascii_digit())
}

fn is_string_literal(event: &str) -> bool {
    event.len() >= 2 && event.starts_with('"') && event.ends_with('"')
}

fn is_template(member: &str) -> bool {
    member == INTEGER_TEMPLATE
        || member == STRING_TEMPLATE
        || member.ends_with(".*integer*")
        || member.ends_with(".*string*")
}

/// Does the templated `member` cover the concrete `event`?
fn template_matches(member: &str, event: &str) -> bool {
    if let Some(prefix) = member.strip_suffix(INTEGER_TEMPLATE) {
        event
            .strip_prefix(prefix)
            .is_some_and(is_integer_literal)
    } else if let Some(prefix) = member.strip_suffix(STRING_TEMPLATE) {
        event.strip_prefix(prefix).is_some_and(is_string_literal)
    } else {
        false
    }
}

impl Alphabet {
    /// The empty regular alphabet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The alphabet of all non-empty digit strings.
    pub fn integer() -> Self {
        Self { kind: AlphabetKind::Integer, events: BTreeSet::new() }
    }

    /// The alphabet of all quoted string literals.
    pub fn string() -> Self {
        Self { kind: AlphabetKind::String, events: BTreeSet::new() }
    }

    /// A regular alphabet holding a single event.
    pub fn from_event(event: impl Into<String>) -> Self {
        let mut events = BTreeSet::new();
        events.insert(event.into());
        Self { kind: AlphabetKind::Regular, events }
    }

    /// A regular alphabet built from the given members.
    pub fn from_events<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: AlphabetKind::Regular,
            events: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn kind(&self) -> AlphabetKind {
        self.kind
    }

    pub fn is_regular(&self) -> bool {
        self.kind == AlphabetKind::Regular
    }

    /// Add a member to a regular alphabet.
    pub fn add(&mut self, member: impl Into<String>) {
        debug_assert!(self.is_regular());
        self.events.insert(member.into());
    }

    /// Number of explicit members. Zero for the bare non-regular kinds
    /// even though they are conceptually infinite.
    pub fn cardinality(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        match self.kind {
            AlphabetKind::Regular => self.events.is_empty(),
            // conceptually infinite
            AlphabetKind::Integer | AlphabetKind::String => false,
        }
    }

    /// Iterate over the explicit members (literals and templates).
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(String::as_str)
    }

    /// Is the concrete `event` in this alphabet?
    pub fn is_member(&self, event: &str) -> bool {
        match self.kind {
            AlphabetKind::Integer => is_integer_literal(event),
            AlphabetKind::String => is_string_literal(event),
            AlphabetKind::Regular => {
                self.events.contains(event)
                    || self
                        .events
                        .iter()
                        .any(|m| template_matches(m, event))
            }
        }
    }

    /// Membership probe for a *member* (possibly a template) of another
    /// alphabet. A template is accepted when this alphabet carries the
    /// identical template or its kind generates the template's events;
    /// a literal is accepted by ordinary membership.
    fn accepts_member(&self, member: &str) -> bool {
        if is_template(member) {
            match self.kind {
                AlphabetKind::Integer => member == INTEGER_TEMPLATE,
                AlphabetKind::String => member == STRING_TEMPLATE,
                AlphabetKind::Regular => self.events.contains(member),
            }
        } else {
            self.is_member(member)
        }
    }

    /// The explicit members of a set, with non-regular kinds collapsed
    /// to their bare template so they survive a merge into a regular
    /// set with membership intact.
    fn members_as_regular(&self) -> BTreeSet<String> {
        match self.kind {
            AlphabetKind::Regular => self.events.clone(),
            AlphabetKind::Integer => {
                let mut s = self.events.clone();
                s.insert(INTEGER_TEMPLATE.to_string());
                s
            }
            AlphabetKind::String => {
                let mut s = self.events.clone();
                s.insert(STRING_TEMPLATE.to_string());
                s
            }
        }
    }

    /// Union.
    pub fn union(&self, other: &Alphabet) -> Alphabet {
        if self.kind == other.kind {
            return Alphabet {
                kind: self.kind,
                events: self.events.union(&other.events).cloned().collect(),
            };
        }
        Alphabet {
            kind: AlphabetKind::Regular,
            events: self
                .members_as_regular()
                .union(&other.members_as_regular())
                .cloned()
                .collect(),
        }
    }

    /// Difference: members of `self` not covered by `other`.
    pub fn difference(&self, other: &Alphabet) -> Alphabet {
        Alphabet {
            kind: self.kind,
            events: self
                .events
                .iter()
                .filter(|m| !other.accepts_member(m))
                .cloned()
                .collect(),
        }
    }

    /// Intersection, decided by element-wise membership probes so
    /// templated members expand correctly.
    pub fn intersection(&self, other: &Alphabet) -> Alphabet {
        if self.kind == other.kind && self.kind != AlphabetKind::Regular {
            return Alphabet {
                kind: self.kind,
                events: self.events.union(&other.events).cloned().collect(),
            };
        }
        let mut events: BTreeSet<String> = self
            .members_as_regular()
            .into_iter()
            .filter(|m| other.accepts_member(m))
            .collect();
        events.extend(
            other
                .members_as_regular()
                .into_iter()
                .filter(|m| self.accepts_member(m)),
        );
        Alphabet { kind: AlphabetKind::Regular, events }
    }

    /// Symmetric difference.
    pub fn symmetric_difference(&self, other: &Alphabet) -> Alphabet {
        self.difference(other).union(&other.difference(self))
    }

    /// Is every member of `self` covered by `other`?
    pub fn is_subset(&self, other: &Alphabet) -> bool {
        match (self.kind, other.kind) {
            (a, b) if a == b && a != AlphabetKind::Regular => true,
            (AlphabetKind::Regular, _) => {
                self.events.iter().all(|m| other.accepts_member(m))
            }
            // an infinite kind never fits into a finite set of other shape
            _ => false,
        }
    }

    /// Members beginning with `prefix.` (channel selection, used by
    /// pipes and reading processes).
    pub fn select_prefix(&self, prefix: &str) -> Alphabet {
        let p = format!("{prefix}.");
        Alphabet {
            kind: AlphabetKind::Regular,
            events: self
                .events
                .iter()
                .filter(|m| m.starts_with(&p))
                .cloned()
                .collect(),
        }
    }

    /// Members *not* beginning with `prefix.`.
    pub fn exclude_prefix(&self, prefix: &str) -> Alphabet {
        let p = format!("{prefix}.");
        Alphabet {
            kind: self.kind,
            events: self
                .events
                .iter()
                .filter(|m| !m.starts_with(&p))
                .cloned()
                .collect(),
        }
    }

    /// The member at position `index` in sorted order.
    pub fn nth(&self, index: usize) -> Option<&str> {
        self.events.iter().nth(index).map(String::as_str)
    }

    /// Draw a uniformly random concrete event. Templated members are
    /// instantiated with a drawn payload so the result can be fed back
    /// into `proceed`.
    pub fn draw_event(&self, prng: &mut Prng) -> Option<String> {
        match self.kind {
            AlphabetKind::Integer => Some(prng.draw(10).to_string()),
            AlphabetKind::String => Some("\"\"".to_string()),
            AlphabetKind::Regular => {
                if self.events.is_empty() {
                    return None;
                }
                let member = self
                    .events
                    .iter()
                    .nth(prng.draw(self.events.len()))
                    .cloned()?;
                Some(instantiate(&member, prng))
            }
        }
    }
}

/// Replace a template tail with a drawn payload; literals pass through.
fn instantiate(member: &str, prng: &mut Prng) -> String {
    if let Some(prefix) = member.strip_suffix(INTEGER_TEMPLATE) {
        format!("{prefix}{}", prng.draw(10))
    } else if let Some(prefix) = member.strip_suffix(STRING_TEMPLATE) {
        format!("{prefix}\"\"")
    } else {
        member.to_string()
    }
}

impl ops::Add for &Alphabet {
    type Output = Alphabet;
    fn add(self, other: &Alphabet) -> Alphabet {
        self.union(other)
    }
}

impl ops::Sub for &Alphabet {
    type Output = Alphabet;
    fn sub(self, other: &Alphabet) -> Alphabet {
        self.difference(other)
    }
}

impl ops::Mul for &Alphabet {
    type Output = Alphabet;
    fn mul(self, other: &Alphabet) -> Alphabet {
        self.intersection(other)
    }
}

impl ops::Div for &Alphabet {
    type Output = Alphabet;
    fn div(self, other: &Alphabet) -> Alphabet {
        self.symmetric_difference(other)
    }
}

impl fmt::Display for Alphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlphabetKind::Integer if self.events.is_empty() => {
                return write!(f, "integer");
            }
            AlphabetKind::String if self.events.is_empty() => {
                return write!(f, "string");
            }
            _ => {}
        }
        write!(f, "{{{}}}", self.events.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(members: &[&str]) -> Alphabet {
        Alphabet::from_events(members.iter().copied())
    }

    #[test]
    fn union_difference_intersection() {
        let a = set(&["a", "b", "c"]);
        let b = set(&["b", "c", "d"]);
        assert_eq!(a.union(&b), set(&["a", "b", "c", "d"]));
        assert_eq!(a.difference(&b), set(&["a"]));
        assert_eq!(a.intersection(&b), set(&["b", "c"]));
        assert_eq!(a.symmetric_difference(&b), set(&["a", "d"]));
    }

    #[test]
    fn subset_and_equality() {
        let a = set(&["a", "b"]);
        assert!(a.is_subset(&set(&["a", "b", "c"])));
        assert!(!set(&["a", "x"]).is_subset(&a));
        assert_eq!(set(&["a", "b"]), set(&["b", "a"]));
    }

    #[test]
    fn integer_kind_membership() {
        let ints = Alphabet::integer();
        assert!(ints.is_member("0"));
        assert!(ints.is_member("1234"));
        assert!(!ints.is_member(""));
        assert!(!ints.is_member("12a"));
        assert!(!ints.is_member("c.12"));
    }

    #[test]
    fn string_kind_membership() {
        let strs = Alphabet::string();
        assert!(strs.is_member("\"hello\""));
        assert!(strs.is_member("\"\""));
        assert!(!strs.is_member("hello"));
    }

    #[test]
    fn template_membership() {
        let a = set(&["c.*integer*", "done"]);
        assert!(a.is_member("c.0"));
        assert!(a.is_member("c.42"));
        assert!(a.is_member("done"));
        assert!(!a.is_member("c.x"));
        assert!(!a.is_member("d.42"));

        let s = set(&["log.*string*"]);
        assert!(s.is_member("log.\"msg\""));
        assert!(!s.is_member("log.msg"));
    }

    #[test]
    fn template_intersection_expands() {
        let literal = set(&["c.1"]);
        let templated = set(&["c.*integer*"]);
        assert_eq!(literal.intersection(&templated), set(&["c.1"]));
        assert_eq!(templated.intersection(&literal), set(&["c.1"]));
    }

    #[test]
    fn literal_and_covering_template_coexist() {
        let a = set(&["c.1", "c.*integer*"]);
        let b = set(&["c.*integer*"]);
        // the literal survives the probe against the template,
        // the template survives against its twin
        assert_eq!(a.intersection(&b), set(&["c.1", "c.*integer*"]));
    }

    #[test]
    fn mixed_kind_union_keeps_membership() {
        let u = set(&["a"]).union(&Alphabet::integer());
        assert!(u.is_member("a"));
        assert!(u.is_member("17"));
        assert!(!u.is_member("b"));
    }

    #[test]
    fn prefix_selection() {
        let a = set(&["c.0", "c.1", "d.0", "x"]);
        assert_eq!(a.select_prefix("c"), set(&["c.0", "c.1"]));
        assert_eq!(a.exclude_prefix("c"), set(&["d.0", "x"]));
    }

    #[test]
    fn drawn_events_are_members() {
        let mut prng = Prng::seeded(7);
        let a = set(&["c.*integer*", "done"]);
        for _ in 0..32 {
            let e = a.draw_event(&mut prng).unwrap();
            assert!(a.is_member(&e), "{e} not a member");
        }
    }
}
