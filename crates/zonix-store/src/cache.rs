use crate::handle::{NodeKey, NodeRef};

/// Node admission interface of the metadata cache.
///
/// Both methods return `None` when the node does not exist; callers decide
/// whether that means a stale directory entry or a caller error. A returned
/// handle counts as a hold until dropped.
pub trait NodeCache: Send + Sync {
    /// Acquire a handle on `key`, loading the node from the store if it is
    /// not resident.
    fn acquire(&self, key: NodeKey) -> Option<NodeRef>;

    /// Acquire a handle only if the node is already resident.
    ///
    /// Truncation serves open files, which are pinned in the cache for the
    /// life of the open; it uses this variant so it can never fault a node
    /// in on behalf of a stale reference.
    fn acquire_cached(&self, key: NodeKey) -> Option<NodeRef>;
}
