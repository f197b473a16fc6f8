//! Opaque identity newtypes.
//!
//! Every identifier in Townsquare is a string minted by the server (or
//! by the channel provider, for [`ChannelKey`]). Wrapping each in its own
//! type keeps a `TownId` from being passed where a `PlayerId` is expected,
//! while `#[serde(transparent)]` keeps the wire form a plain JSON string.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the raw string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns `true` for the empty string, which is never a
            /// valid identifier.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }

            /// Consumes the wrapper and returns the raw string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies a player for the lifetime of their session.
    PlayerId
);

string_id!(
    /// Identifies a town. Also used as the stable key of the town's
    /// provider-side chat channel.
    TownId
);

string_id!(
    /// Secret bearer token binding a live connection to a player session.
    SessionToken
);

string_id!(
    /// Key of a channel provisioned by the external chat provider.
    ChannelKey
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("p-1")).unwrap();
        assert_eq!(json, "\"p-1\"");
    }

    #[test]
    fn test_town_id_deserializes_from_plain_string() {
        let id: TownId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id, TownId::from("abc"));
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn test_is_empty_detects_blank_id() {
        assert!(PlayerId::new("").is_empty());
        assert!(!PlayerId::new("x").is_empty());
    }

    #[test]
    fn test_ids_of_different_kinds_keep_their_value() {
        let key = ChannelKey::from(String::from("CH123"));
        assert_eq!(key.as_str(), "CH123");
        assert_eq!(key.into_inner(), "CH123");
    }
}
