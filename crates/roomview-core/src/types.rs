//! Identifier newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Raw identifier text.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_owned())
            }
        }
    };
}

string_id!(
    /// Canonical room identifier (`!opaque:server`).
    RoomId
);

string_id!(
    /// Human readable room alias (`#name:server`).
    RoomAlias
);

string_id!(
    /// Matrix user identifier (`@name:server`).
    UserId
);

string_id!(
    /// Event identifier, unique within a room.
    EventId
);

string_id!(
    /// Identifier of an ongoing call.
    CallId
);

/// Identity of one live timeline generation.
///
/// A server-forced discontinuity replaces the live timeline with a new one,
/// which carries a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimelineId(pub u64);

/// What the user asked to view: a room id or an alias still to be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RoomTarget {
    /// Already a room id
    Id(RoomId),
    /// Alias that must be resolved through the directory
    Alias(RoomAlias),
}

impl RoomTarget {
    /// Parses an alias-or-id string. A leading `#` marks an alias.
    pub fn parse(alias_or_id: &str) -> Self {
        if alias_or_id.starts_with('#') {
            Self::Alias(RoomAlias::from(alias_or_id))
        } else {
            Self::Id(RoomId::from(alias_or_id))
        }
    }
}

impl fmt::Display for RoomTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => id.fmt(f),
            Self::Alias(alias) => alias.fmt(f),
        }
    }
}
