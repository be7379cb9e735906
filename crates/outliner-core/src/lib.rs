//! # Protein Outliner Core Library
//!
//! State management for a protein-structure outliner: a Protein → Chain → Domain hierarchy plus
//! user groups and puppets, kept consistent with a host 3D scene in both directions.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** The outliner data model (`OutlinerTree`, `OutlinerItem`) and
//!   the boundary to the host scene (`SceneObjects`, `ObjectHandle`), together with an in-memory
//!   host usable in tests and tools.
//!
//! - **[`engine`]: The Sync Logic.** The selection and visibility engines that propagate UI
//!   actions into the tree and scene, reconcile the tree from host changes, and guard against
//!   re-entrant notifications.
//!
//! - **[`workflows`]: The Public API.** Structural actions (import, domain split and merge,
//!   groups, puppets, deletion), the pose library, and `OutlinerSession`, which ties the tree
//!   and both engines to a host's event loop.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
mod testing;
