//! The public entry points: structural actions on the outliner, the pose library over groups
//! and puppets, and the session object that binds a tree to a host scene.

pub mod error;
pub mod pose;
pub mod session;
pub mod structure;
