//! Metadata scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Partition of an entity's metadata. The two scopes are independently
/// transacted; a cross-scope read is a non-atomic union of two views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Client-writable metadata.
    User,
    /// Platform-derived metadata.
    System,
}

impl Scope {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
