#![forbid(unsafe_code)]
//! Store-facing abstractions for the Zonix mutation engine.
//!
//! The engine mutates directories and reclaims file storage; everything it
//! needs from the surrounding filesystem comes through four seams defined
//! here:
//!
//! | Seam | Concern |
//! |------|---------|
//! | [`NodeCache`] | admit nodes into core, hand out counted [`NodeRef`] handles |
//! | [`DirIndex`] | directory entries: lookup, insert, remove, emptiness, descent |
//! | [`ZoneMap`] | per-node data placement: block mapping and zone release |
//! | [`SuperParams`] | mount-time volume facts: geometry, root, read-only |
//!
//! A [`NodeRef`] is the unit of node access. Holds are counted: the owning
//! cache is told when the last handle drops ([`CacheOwner::note_idle`]) and
//! can then evict the node or reclaim an unlinked one. Handle release is
//! purely drop-driven, so no engine path can forget one on an error return.
//!
//! [`memory`] ships a whole-filesystem in-memory implementation of all four
//! seams for tests and the scenario harness.

mod cache;
mod dir;
mod handle;
mod inode;
mod map;
mod params;

pub mod memory;

pub use cache::NodeCache;
pub use dir::{DescendError, DirIndex};
pub use handle::{CacheOwner, NodeKey, NodeRef, NodeSlot};
pub use inode::Inode;
pub use map::{MappedBlock, ZoneMap};
pub use params::SuperParams;
