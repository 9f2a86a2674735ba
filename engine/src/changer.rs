//! Symbol changers: event-renaming functions.
//!
//! Used by mapped processes (`l:P` labelling) and by the internal
//! rewiring that pipes perform (channel maps onto a minted middle
//! channel). Events beginning with `_` are infrastructure
//! (`_success_`) and always pass through unchanged.

use crate::alphabet::Alphabet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolChanger {
    /// The identity function.
    Identity,
    /// Qualification: prefix every event with `label.`.
    Qualifier(String),
    /// Rewire one channel onto another: `from.msg` becomes `to.msg`.
    ChannelMap { from: String, to: String },
    /// The inverse of another changer.
    Inverse(Box<SymbolChanger>),
}

impl SymbolChanger {
    pub fn qualifier(label: impl Into<String>) -> Self {
        SymbolChanger::Qualifier(label.into())
    }

    pub fn channel_map(from: impl Into<String>, to: impl Into<String>) -> Self {
        SymbolChanger::ChannelMap { from: from.into(), to: to.into() }
    }

    pub fn inverse(self) -> Self {
        match self {
            SymbolChanger::Inverse(inner) => *inner,
            other => SymbolChanger::Inverse(Box::new(other)),
        }
    }

    /// Map a single event.
    pub fn map_event(&self, event: &str) -> String {
        if event.starts_with('_') {
            return event.to_string();
        }
        self.forward(event)
    }

    /// Map an event backwards (used when stepping a mapped process:
    /// the outside event is translated into the inner process's name).
    pub fn reverse_map_event(&self, event: &str) -> String {
        if event.starts_with('_') {
            return event.to_string();
        }
        self.backward(event)
    }

    /// Map a whole alphabet, member by member. Templated members keep
    /// their payload tails, so `c.*integer*` rewires to `to.*integer*`.
    pub fn map(&self, alphabet: &Alphabet) -> Alphabet {
        if !alphabet.is_regular() {
            // the infinite kinds carry no channel structure to rename
            return alphabet.clone();
        }
        Alphabet::from_events(alphabet.iter().map(|e| self.map_event(e)))
    }

    /// Render the name of a mapped process for display.
    pub fn display_name(&self, inner: &str) -> String {
        match self {
            SymbolChanger::Identity => inner.to_string(),
            SymbolChanger::Qualifier(label) => format!("{label}:{inner}"),
            SymbolChanger::ChannelMap { from, to } => {
                format!("{inner}[{from}={to}]")
            }
            SymbolChanger::Inverse(f) => format!("{}~", f.display_name(inner)),
        }
    }

    fn forward(&self, event: &str) -> String {
        match self {
            SymbolChanger::Identity => event.to_string(),
            SymbolChanger::Qualifier(label) => format!("{label}.{event}"),
            SymbolChanger::ChannelMap { from, to } => {
                match event.strip_prefix(&format!("{from}.")) {
                    Some(tail) => format!("{to}.{tail}"),
                    None => event.to_string(),
                }
            }
            SymbolChanger::Inverse(f) => f.backward(event),
        }
    }

    fn backward(&self, event: &str) -> String {
        match self {
            SymbolChanger::Identity => event.to_string(),
            SymbolChanger::Qualifier(label) => event
                .strip_prefix(&format!("{label}."))
                .unwrap_or(event)
                .to_string(),
            SymbolChanger::ChannelMap { from, to } => {
                match event.strip_prefix(&format!("{to}.")) {
                    Some(tail) => format!("{from}.{tail}"),
                    None => event.to_string(),
                }
            }
            SymbolChanger::Inverse(f) => f.forward(event),
        }
    }
}
