//! Opaque row identifiers.
//!
//! IDs are `<prefix>-<12 hex digits>`, generated from the thread RNG. They
//! are never shown in issue keys; those come from the sequence allocator.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix every generated ID of this kind starts with.
            pub const PREFIX: &'static str = $prefix;

            /// Generate a fresh random ID.
            #[must_use]
            pub fn generate() -> Self {
                let bits: u64 = rand::random::<u64>() & 0xffff_ffff_ffff;
                Self(format!("{}-{bits:012x}", Self::PREFIX))
            }

            /// Wrap an ID read back from storage.
            #[must_use]
            pub fn from_stored(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw string form.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// Identifier of a workspace (tenant).
    WorkspaceId,
    "ws"
);
opaque_id!(
    /// Identifier of a team within a workspace.
    TeamId,
    "tm"
);
opaque_id!(
    /// Identifier of an issue. Stable across team key renames.
    IssueId,
    "is"
);
opaque_id!(
    /// Identifier of a workspace label.
    LabelId,
    "lb"
);
opaque_id!(
    /// Identifier of an issue comment.
    CommentId,
    "cm"
);
