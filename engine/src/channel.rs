//! Channels: named families of `chan.msg` events.
//!
//! A channel owns a default alphabet plus optional per-process
//! overrides (`alpha c(P) = {…}`). Messages are encoded into events by
//! prefixing the channel name; the default alphabet is frozen by the
//! first explicit assignment.

use crate::alphabet::{Alphabet, AlphabetKind, INTEGER_TEMPLATE, STRING_TEMPLATE};
use std::collections::HashMap;

/// Index of a channel in the process graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChanId(pub(crate) u32);

#[derive(Debug)]
pub struct Channel {
    name: String,
    alphabet: Alphabet,
    alphabet_fixed: bool,
    /// Per-process alphabets, already event-encoded.
    alphabets: HashMap<String, Alphabet>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alphabet: Alphabet::new(),
            alphabet_fixed: false,
            alphabets: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a single message to the default alphabet.
    pub fn add_symbol(&mut self, symbol: &str) {
        self.alphabet.add(self.message_to_event(symbol));
    }

    /// Install the default alphabet; returns false once frozen.
    pub fn set_alphabet(&mut self, messages: Alphabet) -> bool {
        if self.alphabet_fixed {
            return false;
        }
        self.alphabet = self.messages_to_events(&messages);
        self.alphabet_fixed = true;
        true
    }

    /// Install a per-process alphabet; returns false on a duplicate.
    /// As long as the default alphabet is not frozen, the override
    /// also widens it.
    pub fn set_process_alphabet(&mut self, process: &str, messages: Alphabet) -> bool {
        let encoded = self.messages_to_events(&messages);
        if self.alphabets.contains_key(process) {
            return false;
        }
        if !self.alphabet_fixed {
            self.alphabet = self.alphabet.union(&encoded);
        }
        self.alphabets.insert(process.to_string(), encoded);
        true
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// The alphabet a subscribing process sees: its override if one
    /// was declared, the default otherwise.
    pub fn alphabet_for(&self, process: Option<&str>) -> &Alphabet {
        process
            .and_then(|name| self.alphabets.get(name))
            .unwrap_or(&self.alphabet)
    }

    fn message_to_event(&self, message: &str) -> String {
        format!("{}.{message}", self.name)
    }

    /// Encode a message alphabet into events. The non-regular kinds
    /// become templated members, e.g. `channel c : integer` yields
    /// `{c.*integer*}`.
    fn messages_to_events(&self, messages: &Alphabet) -> Alphabet {
        match messages.kind() {
            AlphabetKind::Integer => {
                Alphabet::from_event(self.message_to_event(INTEGER_TEMPLATE))
            }
            AlphabetKind::String => {
                Alphabet::from_event(self.message_to_event(STRING_TEMPLATE))
            }
            AlphabetKind::Regular => Alphabet::from_events(
                messages.iter().map(|m| self.message_to_event(m)),
            ),
        }
    }
}
