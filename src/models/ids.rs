//! Strongly-typed ID wrappers
//!
//! Log entries and hook subscriptions are both keyed by UUIDs; the newtypes
//! keep them from being mixed up.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Macro to generate ID newtype wrappers
macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse an ID from a string, with or without the display prefix
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                s.parse()
            }

            /// Whether `query` names this ID: the full UUID, the short
            /// display form, or a UUID prefix.
            pub fn matches(&self, query: &str) -> bool {
                let query = query.strip_prefix($display_prefix).unwrap_or(query);
                !query.is_empty() && self.0.to_string().starts_with(query)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, &self.0.to_string()[..8])
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix($display_prefix).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(LogEntryId, "log-");
define_id!(SubscriptionId, "sub-");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = LogEntryId::new();
        let display = format!("{}", id);
        assert!(display.starts_with("log-"));
        assert_eq!(display.len(), 12); // "log-" + 8 chars
    }

    #[test]
    fn test_id_serialization() {
        let id = LogEntryId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: LogEntryId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_id_parse_with_prefix() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id = LogEntryId::parse(uuid_str).unwrap();
        assert_eq!(id.as_uuid().to_string(), uuid_str);

        let prefixed = LogEntryId::parse(&format!("log-{}", uuid_str)).unwrap();
        assert_eq!(id, prefixed);
    }

    #[test]
    fn test_short_form_matches() {
        let id = LogEntryId::parse("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert!(id.matches("log-550e8400"));
        assert!(id.matches("550e8400-e29b"));
        assert!(!id.matches("log-deadbeef"));
        assert!(!id.matches(""));
    }
}
