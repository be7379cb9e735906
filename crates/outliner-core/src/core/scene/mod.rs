//! # Scene Module
//!
//! The contract between the outliner and the host 3D scene.
//!
//! - [`traits`] - [`traits::SceneObjects`] (object lookup, selection, visibility, active object)
//!   and [`traits::SceneEventSource`] (post-update notifications)
//! - [`handle`] - weak by-name [`handle::ObjectHandle`]s and the [`handle::LiveObject`] tokens
//!   they resolve to
//! - [`memory`] - [`memory::InMemoryScene`], a complete host stand-in used by the CLI and tests
//! - [`transform`] - object [`transform::Transform`]s captured and restored by poses

pub mod handle;
pub mod memory;
pub mod traits;
pub mod transform;
