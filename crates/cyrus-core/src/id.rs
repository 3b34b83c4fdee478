// SPDX-License-Identifier: MIT

//! ID generation abstractions.
//!
//! Two families of identifier exist in this crate:
//!
//! - Externally-assigned ids (the tracker's session/issue UUIDs) are plain
//!   string newtypes — see [`crate::session::AgentSessionId`] and
//!   [`crate::issue::IssueId`]. We never generate these ourselves.
//! - Locally-generated ids (entries, pending selections, runner handles)
//!   use [`define_id!`], which produces a `{prefix}{nanoid}` identifier.

/// Define a newtype id wrapper with a type prefix and random generation.
///
/// The id format is `{prefix}{nanoid}` where `prefix` is a short literal
/// type tag and the nanoid suffix is 16 random URL-safe characters.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random id with the type prefix.
            pub fn new() -> Self {
                Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(16)))
            }

            /// Wrap an existing string (for parsing/deserialization/tests).
            pub fn from_string(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }
    };
}
