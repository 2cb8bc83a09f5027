//! Symlink target reads.

use zonix_error::{FsError, Result};
use zonix_types::InodeNumber;

use crate::Volume;

impl Volume {
    /// Copy the symlink's target into `buf`, returning the byte count.
    ///
    /// The copy is the shorter of the buffer and the recorded target
    /// length; a longer buffer is not zero-padded. Reading any other node
    /// kind through this path is an access error.
    pub fn read_link(&self, node: InodeNumber, buf: &mut [u8]) -> Result<usize> {
        let rip = self.acquire(node)?;
        if !rip.kind().is_symlink() {
            return Err(FsError::AccessDenied);
        }
        match self.zones.map_block(&rip, 0)? {
            // A symlink with no backing block has lost its target.
            None => Err(FsError::Io),
            Some(block) => {
                // Targets never span blocks; the size clamp keeps a
                // corrupt length field from reading past block 0.
                let len = buf
                    .len()
                    .min(rip.size() as usize)
                    .min(block.bytes().len());
                buf[..len].copy_from_slice(&block.bytes()[..len]);
                Ok(len)
            }
        }
    }
}
