//! Resolution of a requested polarity against the voter's existing vote.

use serde::{Deserialize, Serialize};
use unimarket_core::{CounterDelta, CounterField, Polarity};

/// What a cast does to the voter's vote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// No prior vote; a new one was created.
    Created,
    /// The prior vote had the opposite polarity and was flipped.
    Switched {
        /// Polarity before the switch.
        from: Polarity,
    },
    /// The prior vote had the requested polarity and was removed.
    Removed,
}

impl Resolution {
    /// Short name for logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Switched { .. } => "switched",
            Self::Removed => "removed",
        }
    }

    /// Counter adjustments implied by this resolution, decrements first.
    pub fn adjustments(&self, requested: Polarity) -> Vec<(CounterField, CounterDelta)> {
        match self {
            Self::Created => vec![(requested.counter_field(), CounterDelta::Increment)],
            Self::Removed => vec![(requested.counter_field(), CounterDelta::Decrement)],
            Self::Switched { from } => vec![
                (from.counter_field(), CounterDelta::Decrement),
                (requested.counter_field(), CounterDelta::Increment),
            ],
        }
    }
}

/// Decide the resolution for `requested` given the voter's current polarity.
pub fn resolve(existing: Option<Polarity>, requested: Polarity) -> Resolution {
    match existing {
        None => Resolution::Created,
        Some(current) if current == requested => Resolution::Removed,
        Some(current) => Resolution::Switched { from: current },
    }
}
