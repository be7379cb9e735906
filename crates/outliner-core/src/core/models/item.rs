use super::ids::ItemId;
use crate::core::scene::handle::ObjectHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Protein,
    Chain,
    Domain,
    Group,
    ReferenceProxy,
}

impl ItemKind {
    /// The kind an item of this kind must hang under, `None` for roots.
    pub fn structural_parent(self) -> Option<ItemKind> {
        match self {
            ItemKind::Protein | ItemKind::Group => None,
            ItemKind::Chain => Some(ItemKind::Protein),
            ItemKind::Domain => Some(ItemKind::Chain),
            ItemKind::ReferenceProxy => Some(ItemKind::Group),
        }
    }

    /// Whether items of this kind may be listed in a group's `member_ids`.
    pub fn can_join_group(self) -> bool {
        matches!(self, ItemKind::Protein | ItemKind::Chain | ItemKind::Domain)
    }
}

#[derive(Debug, Error)]
#[error("Invalid item kind string: '{0}'")]
pub struct ParseItemKindError(pub String);

impl FromStr for ItemKind {
    type Err = ParseItemKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "protein" => Ok(ItemKind::Protein),
            "chain" => Ok(ItemKind::Chain),
            "domain" => Ok(ItemKind::Domain),
            "group" | "puppet" => Ok(ItemKind::Group),
            "reference" | "reference-proxy" => Ok(ItemKind::ReferenceProxy),
            _ => Err(ParseItemKindError(s.to_string())),
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ItemKind::Protein => "Protein",
                ItemKind::Chain => "Chain",
                ItemKind::Domain => "Domain",
                ItemKind::Group => "Group",
                ItemKind::ReferenceProxy => "Reference",
            }
        )
    }
}

/// Inclusive residue span of a chain or domain.
///
/// Always satisfies `start <= end`; deserialized bounds go through [`ResidueRange::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawRange")]
pub struct ResidueRange {
    pub start: i32,
    pub end: i32,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRange {
    start: i32,
    end: i32,
}

impl From<RawRange> for ResidueRange {
    fn from(raw: RawRange) -> Self {
        ResidueRange::new(raw.start, raw.end)
    }
}

impl ResidueRange {
    /// Builds a range, swapping the bounds when given in reverse.
    pub fn new(start: i32, end: i32) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// Returns the number of residues in the span, bounds included.
    pub fn residue_count(&self) -> usize {
        self.end.abs_diff(self.start) as usize + 1
    }

    /// Checks whether a residue number lies within the span.
    ///
    /// # Arguments
    ///
    /// * `residue` - The residue number to test.
    pub fn contains(&self, residue: i32) -> bool {
        (self.start..=self.end).contains(&residue)
    }

    /// Checks whether `other` lies entirely within this span.
    ///
    /// # Arguments
    ///
    /// * `other` - The candidate sub-range.
    pub fn covers(&self, other: &ResidueRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Checks whether the two spans share at least one residue.
    ///
    /// # Arguments
    ///
    /// * `other` - The range to compare against.
    pub fn overlaps(&self, other: &ResidueRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Checks whether the two ranges touch end-to-start without overlapping, in either order.
    ///
    /// # Arguments
    ///
    /// * `other` - The range to compare against.
    pub fn is_adjacent_to(&self, other: &ResidueRange) -> bool {
        self.end.checked_add(1) == Some(other.start)
            || other.end.checked_add(1) == Some(self.start)
    }

    /// Returns the smallest span covering both ranges.
    ///
    /// # Arguments
    ///
    /// * `other` - The range to join with.
    pub fn union(&self, other: &ResidueRange) -> ResidueRange {
        ResidueRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Splits so that `at` becomes the first residue of the second half.
    ///
    /// # Arguments
    ///
    /// * `at` - The first residue of the second half.
    ///
    /// # Return
    ///
    /// Returns `None` unless `start < at <= end`.
    pub fn split_at(&self, at: i32) -> Option<(ResidueRange, ResidueRange)> {
        if at <= self.start || at > self.end {
            return None;
        }
        Some((
            ResidueRange {
                start: self.start,
                end: at - 1,
            },
            ResidueRange { start: at, end: self.end },
        ))
    }
}

impl fmt::Display for ResidueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A single row of the outliner hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlinerItem {
    pub id: ItemId,
    pub kind: ItemKind,
    pub parent_id: Option<ItemId>,
    pub display_name: String,
    pub is_selected: bool,
    pub is_visible: bool,
    /// Host object this item mirrors. Looked up by name, never owned.
    pub bound_object: Option<ObjectHandle>,
    /// Group members; empty for every other kind.
    pub member_ids: Vec<ItemId>,
    pub range: Option<ResidueRange>,
    /// The real item a reference proxy mirrors.
    pub referent: Option<ItemId>,
}

impl OutlinerItem {
    fn bare(id: impl Into<ItemId>, kind: ItemKind, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            parent_id: None,
            display_name: name.into(),
            is_selected: false,
            is_visible: true,
            bound_object: None,
            member_ids: Vec::new(),
            range: None,
            referent: None,
        }
    }

    /// Creates a root protein row.
    ///
    /// # Arguments
    ///
    /// * `id` - The protein's id, usually the structure identifier.
    /// * `name` - The label shown in the outliner.
    pub fn protein(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self::bare(id, ItemKind::Protein, name)
    }

    /// Creates a chain row under a protein.
    ///
    /// # Arguments
    ///
    /// * `id` - The chain's id.
    /// * `protein` - The id of the owning protein.
    /// * `name` - The label shown in the outliner.
    /// * `range` - The residues the chain spans.
    pub fn chain(
        id: impl Into<ItemId>,
        protein: impl Into<ItemId>,
        name: impl Into<String>,
        range: ResidueRange,
    ) -> Self {
        let mut item = Self::bare(id, ItemKind::Chain, name);
        item.parent_id = Some(protein.into());
        item.range = Some(range);
        item
    }

    /// Creates a domain row under a chain.
    ///
    /// # Arguments
    ///
    /// * `id` - The domain's id.
    /// * `chain` - The id of the owning chain.
    /// * `name` - The label shown in the outliner.
    /// * `range` - The residues the domain covers; must lie within the chain's range.
    pub fn domain(
        id: impl Into<ItemId>,
        chain: impl Into<ItemId>,
        name: impl Into<String>,
        range: ResidueRange,
    ) -> Self {
        let mut item = Self::bare(id, ItemKind::Domain, name);
        item.parent_id = Some(chain.into());
        item.range = Some(range);
        item
    }

    /// Creates a plain group row. Bind an object with [`OutlinerItem::with_object`] to make
    /// it a puppet.
    ///
    /// # Arguments
    ///
    /// * `id` - The group's id.
    /// * `name` - The label shown in the outliner.
    /// * `members` - Ids of the proteins, chains or domains the group collects.
    pub fn group(id: impl Into<ItemId>, name: impl Into<String>, members: Vec<ItemId>) -> Self {
        let mut item = Self::bare(id, ItemKind::Group, name);
        item.member_ids = members;
        item
    }

    /// Creates a display row under `group` mirroring `referent`.
    ///
    /// # Arguments
    ///
    /// * `group` - The group the row is shown under.
    /// * `referent` - The real item whose flags the row copies.
    ///
    /// # Return
    ///
    /// A reference proxy whose id is [`ItemId::proxy_for`] the pair.
    pub fn reference(group: &OutlinerItem, referent: &OutlinerItem) -> Self {
        let mut item = Self::bare(
            ItemId::proxy_for(&group.id, &referent.id),
            ItemKind::ReferenceProxy,
            referent.display_name.clone(),
        );
        item.parent_id = Some(group.id.clone());
        item.referent = Some(referent.id.clone());
        item.is_selected = referent.is_selected;
        item.is_visible = referent.is_visible;
        item.range = referent.range;
        item
    }

    /// Binds the item to a scene object by name.
    pub fn with_object(mut self, object_name: impl Into<String>) -> Self {
        self.bound_object = Some(ObjectHandle::new(object_name));
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.is_selected = selected;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.is_visible = visible;
        self
    }

    /// A group bound to a transform controller.
    pub fn is_puppet(&self) -> bool {
        self.kind == ItemKind::Group && self.bound_object.is_some()
    }

    pub fn is_proxy(&self) -> bool {
        self.kind == ItemKind::ReferenceProxy
    }

    /// The name of the bound scene object, if any.
    pub fn object_name(&self) -> Option<&str> {
        self.bound_object.as_ref().map(ObjectHandle::name)
    }
}
