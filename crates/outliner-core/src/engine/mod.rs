//! Synchronisation between the outliner tree and the host scene.
//!
//! Both engines share one [`guard::SyncLock`], so a selection pass and a visibility pass can
//! never nest inside each other through host callbacks.

pub mod config;
pub mod events;
pub mod guard;
pub mod query;
pub mod selection;
pub mod state;
pub mod visibility;
