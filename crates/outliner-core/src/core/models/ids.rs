use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

new_key_type! {
    pub struct ItemKey;
}

/// Stable, user-facing identifier of an outliner item.
///
/// Ids are plain strings so that UI rows, scenario files and log lines can refer to items
/// directly. An id is never handed out twice by the same tree, even after the item it named
/// has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wraps a string as an item id.
    ///
    /// # Arguments
    ///
    /// * `id` - Any string-like value; no format is enforced.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the id of the display-only row mirroring `member` inside `group`.
    ///
    /// # Arguments
    ///
    /// * `group` - The group owning the reference row.
    /// * `member` - The real item being mirrored.
    ///
    /// # Return
    ///
    /// `"{group}_ref_{member}"`, unique per (group, member) pair.
    pub fn proxy_for(group: &ItemId, member: &ItemId) -> Self {
        Self(format!("{}_ref_{}", group.0, member.0))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for ItemId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ItemId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for ItemId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ItemId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
