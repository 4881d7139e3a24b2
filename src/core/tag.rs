//! Tag identifiers for slot groups.
//!
//! A tag names a group of reserved execution slots. The [`Tag::Generic`]
//! variant is the overflow group: every named group may borrow from it once
//! its own reservation is saturated. In serialized form the generic tag is
//! `null` and named tags are plain strings, so reservation maps read
//! naturally in JSON.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier for a slot group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum Tag {
    /// The shared overflow group, drawn on when a named group is saturated.
    Generic,
    /// A named group with its own reservation.
    Named(Arc<str>),
}

impl Tag {
    /// Build a named tag.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Named(Arc::from(name.as_ref()))
    }

    /// Returns true for the generic overflow tag.
    #[must_use]
    pub const fn is_generic(&self) -> bool {
        matches!(self, Self::Generic)
    }
}

impl Default for Tag {
    fn default() -> Self {
        Self::Generic
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic => write!(f, "<generic>"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Tag {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name.as_str()))
    }
}

impl From<Option<String>> for Tag {
    fn from(name: Option<String>) -> Self {
        name.map_or(Self::Generic, Self::from)
    }
}

impl From<Tag> for Option<String> {
    fn from(tag: Tag) -> Self {
        match tag {
            Tag::Generic => None,
            Tag::Named(name) => Some(name.to_string()),
        }
    }
}
