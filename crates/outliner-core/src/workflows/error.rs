use crate::core::models::ids::ItemId;
use crate::core::models::item::{ItemKind, ResidueRange};
use crate::core::models::tree::TreeError;
use thiserror::Error;

/// Why a structural action (split, merge, grouping, deletion) was refused.
///
/// The `Display` text is meant to be shown to the user as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StructureError {
    #[error("Item not found: '{0}'")]
    NotFound(ItemId),

    #[error("Item '{id}' is a {found}, expected a {expected}")]
    WrongKind {
        id: ItemId,
        expected: ItemKind,
        found: ItemKind,
    },

    #[error("Cannot split {range} at residue {at}: both parts must be non-empty")]
    InvalidSplit { at: i32, range: ResidueRange },

    #[error("Range {range} lies outside chain '{chain}' ({chain_range})")]
    OutOfChainBounds {
        range: ResidueRange,
        chain: ItemId,
        chain_range: ResidueRange,
    },

    #[error("Range {range} overlaps domain '{domain}'")]
    Overlap { range: ResidueRange, domain: ItemId },

    #[error("Cannot merge: domains '{a}' and '{b}' are not adjacent")]
    NotAdjacent { a: ItemId, b: ItemId },

    #[error("Cannot merge: domains '{a}' and '{b}' belong to different chains")]
    DifferentChains { a: ItemId, b: ItemId },

    #[error("Cannot merge domain '{0}' with itself")]
    SameItem(ItemId),

    #[error("A group needs at least one member")]
    EmptyGroup,

    #[error("Item '{0}' cannot be a group member")]
    NotGroupable(ItemId),

    #[error("Item '{0}' has no residue range")]
    MissingRange(ItemId),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Why a pose library action was refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoseError {
    #[error("A pose needs at least one group")]
    NoGroups,

    #[error("Group not found: '{0}'")]
    GroupNotFound(ItemId),

    #[error("Item '{id}' is a {found}, not a group")]
    NotAGroup { id: ItemId, found: ItemKind },

    #[error("No pose at index {index} (the library holds {len})")]
    InvalidIndex { index: usize, len: usize },
}
