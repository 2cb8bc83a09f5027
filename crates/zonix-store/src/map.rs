use zonix_error::Result;
use zonix_types::ZoneNumber;

use crate::handle::NodeRef;

/// Borrowed view of one mapped block of file data.
///
/// Dropping the guard releases the block; implementations write dirty
/// contents back at that point.
pub trait MappedBlock {
    fn bytes(&self) -> &[u8];

    /// Mutable contents. Pair writes with [`MappedBlock::mark_dirty`].
    fn bytes_mut(&mut self) -> &mut [u8];

    /// Record that the contents changed and must reach the store.
    fn mark_dirty(&mut self);
}

/// Zone-granular view of one node's data placement.
pub trait ZoneMap: Send + Sync {
    /// Map the block covering byte `pos` of `node`.
    ///
    /// `Ok(None)` means `pos` falls in a hole: no zone backs it. Writers
    /// treat that as "nothing stored here", never as a fault, and this call
    /// never allocates to fill the hole.
    fn map_block(&self, node: &NodeRef, pos: u64) -> Result<Option<Box<dyn MappedBlock + '_>>>;

    /// Release zone `zone` of `node` back to the free pool.
    ///
    /// Unmapping a zone that is already a hole is not an error.
    fn unmap_zone(&self, node: &NodeRef, zone: ZoneNumber) -> Result<()>;
}
