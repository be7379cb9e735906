//! # Models Module
//!
//! Data structures describing the outliner hierarchy.
//!
//! - [`ids`] - stable string ids and slot map keys
//! - [`item`] - item kinds, residue ranges and the [`item::OutlinerItem`] row
//! - [`tree`] - the ordered [`tree::OutlinerTree`] with its structural invariants
//!
//! The hierarchy is fixed: Protein → Chain → Domain, with Groups (and Puppets, groups bound to
//! a controller object) as independent roots whose members are listed by id and displayed
//! through ReferenceProxy rows.

pub mod ids;
pub mod item;
pub mod tree;
