//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally interchanging a [`StepName`]
//! with an [`AgentId`] even though both are strings under the hood.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: String-backed (configuration names)
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a step within the configured step list.
    ///
    /// Taken from the step's `name` field, or synthesised positionally as
    /// `agent_<i>` (1-based) when the field is absent or empty. Output keys,
    /// dependency references, and output-agent names all use this type.
    StepName
}

impl StepName {
    /// Positional fallback name for the step at 1-based `position`.
    pub fn positional(position: usize) -> Self {
        Self(format!("agent_{position}"))
    }
}

string_id! {
    /// The stable sender identifier attached to every outbound message.
    AgentId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single chain execution (one dequeued payload).
///
/// Generated fresh for every payload; recorded on the `chain` span so all log
/// events from one run can be correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainRunId(Uuid);

impl ChainRunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ChainRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_names_are_rejected() {
        assert!(StepName::new("").is_none());
        assert_eq!(StepName::new("s1").unwrap().as_str(), "s1");
    }

    #[test]
    fn positional_names_use_agent_prefix() {
        assert_eq!(StepName::positional(1).as_str(), "agent_1");
        assert_eq!(StepName::positional(12).to_string(), "agent_12");
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(ChainRunId::new_random(), ChainRunId::new_random());
    }
}
