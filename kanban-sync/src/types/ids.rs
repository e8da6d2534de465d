//! Identifier newtypes
//!
//! Boards, columns and cards are keyed by the remote store's integer primary keys.
//! Suggestion agents are keyed by their slug.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! define_numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw identifier
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

define_numeric_id!(
    /// Identifies a board (a project's full set of columns and cards)
    BoardId
);
define_numeric_id!(
    /// Identifies a column within a board
    ColumnId
);
define_numeric_id!(
    /// Identifies a card
    CardId
);

/// Identifies a suggestion agent by slug (e.g. `bug-hunter`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// The slug
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentId {
    fn from(slug: &str) -> Self {
        Self(slug.to_string())
    }
}

impl From<String> for AgentId {
    fn from(slug: String) -> Self {
        Self(slug)
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
