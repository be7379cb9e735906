//! # Core Module
//!
//! Stateless building blocks: the outliner data model and the host scene contract.
//!
//! - **Outliner Representation** ([`models`]) - items, ids and the ordered tree
//! - **Host Scene** ([`scene`]) - traits through which the host scene is read and mutated,
//!   plus an in-memory implementation
//!
//! Nothing in this module decides how selection or visibility propagate; that policy lives in
//! [`crate::engine`].

pub mod models;
pub mod scene;
