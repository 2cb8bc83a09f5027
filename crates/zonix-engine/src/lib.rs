#![forbid(unsafe_code)]
//! Directory mutation and space reclamation engine.
//!
//! [`Volume`] is the write side of a mounted filesystem's namespace: hard
//! links, unlink and rmdir (with per-directory deletion policies), rename
//! (with cycle prevention and `..` rewriting), truncation and hole
//! punching, and symlink target reads. It owns no storage itself —
//! directory entries, node admission, and zone placement come through the
//! `zonix-store` seams, so the same engine drives the in-memory store in
//! tests and a real backing store in production.
//!
//! Ordering over atomicity: multi-step operations are sequenced so that a
//! failure partway through leaves at worst a harmless residual (an extra
//! link, a surviving name), never a dangling reference. Secondary cleanup
//! failures are swallowed and logged at `warn`; primary failures propagate
//! to the caller untouched.
//!
//! Node access is guard-based: every acquired [`NodeRef`] is released by
//! `Drop` on every exit path, and operations that juggle aliased handles
//! (rename, the `.`/`..` cleanup in rmdir) take explicit duplicates.

use std::sync::Arc;
use zonix_error::{FsError, Result};
use zonix_store::{DirIndex, NodeCache, NodeKey, NodeRef, SuperParams, ZoneMap};
use zonix_types::InodeNumber;

mod hole;
mod policy;
mod readlink;
mod rename;
mod unlink;

#[cfg(test)]
mod testutil;

/// Mutation engine for one mounted volume.
///
/// All operations are synchronous and run to completion; the surrounding
/// system serializes requests per volume.
pub struct Volume {
    params: SuperParams,
    cache: Arc<dyn NodeCache>,
    dir: Arc<dyn DirIndex>,
    zones: Arc<dyn ZoneMap>,
}

impl Volume {
    #[must_use]
    pub fn new(
        params: SuperParams,
        cache: Arc<dyn NodeCache>,
        dir: Arc<dyn DirIndex>,
        zones: Arc<dyn ZoneMap>,
    ) -> Self {
        Self {
            params,
            cache,
            dir,
            zones,
        }
    }

    #[must_use]
    pub fn params(&self) -> SuperParams {
        self.params
    }

    pub(crate) fn key(&self, number: InodeNumber) -> NodeKey {
        NodeKey {
            device: self.params.device,
            number,
        }
    }

    /// Acquire a node named directly by the request.
    ///
    /// A miss means the caller handed us a stale or invalid reference, not
    /// that a path component was absent, hence invalid-argument rather
    /// than not-found.
    pub(crate) fn acquire(&self, number: InodeNumber) -> Result<NodeRef> {
        self.cache
            .acquire(self.key(number))
            .ok_or(FsError::InvalidArgument)
    }
}
