#![forbid(unsafe_code)]
//! Zonix public API facade.
//!
//! Re-exports the mutation engine, its storage seams, and the shared value
//! types through one stable interface. This is the crate downstream
//! consumers (the scenario harness included) depend on.

pub use zonix_engine::Volume;
pub use zonix_error::{FsError, Result};
pub use zonix_store::{
    memory, CacheOwner, DescendError, DirIndex, Inode, MappedBlock, NodeCache, NodeKey, NodeRef,
    NodeSlot, SuperParams, ZoneMap,
};
pub use zonix_types::*;
