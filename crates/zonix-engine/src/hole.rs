//! Truncation and hole punching.
//!
//! Zones are the unit of reclamation: a freed byte range gives back every
//! zone it fully covers and zero-fills the partial zones at its edges, so
//! a later read sees zeros whether the underlying zone went away or not.
//! File size only ever changes through [`Volume::truncate`]; punching
//! leaves it alone.

use zonix_error::{FsError, Result};
use zonix_store::NodeRef;
use zonix_types::{InodeNumber, TimeFlags, ZoneNumber};

use crate::Volume;

impl Volume {
    /// Set the file's size, freeing zones on shrink.
    ///
    /// Growth is sparse: no zones are allocated, but garbage after the old
    /// end of the last partial zone is zeroed so it cannot resurface. The
    /// size is updated only once reclamation succeeded; a same-size call
    /// still counts as a change.
    pub fn truncate(&self, node: InodeNumber, new_size: u64) -> Result<()> {
        let rip = self.acquire_resident(node)?;
        if self.params.read_only {
            return Err(FsError::ReadOnly);
        }
        self.truncate_to(&rip, new_size)
    }

    /// Free the byte range `[start, end)` without changing the file size.
    ///
    /// `end` is clamped to the current size; an empty range after
    /// clamping, including any range at or past the end of the file, is
    /// invalid.
    pub fn punch_hole(&self, node: InodeNumber, start: u64, end: u64) -> Result<()> {
        let rip = self.acquire_resident(node)?;
        if self.params.read_only {
            return Err(FsError::ReadOnly);
        }
        self.free_hole(&rip, start, end)?;
        tracing::debug!(
            target: "zonix::hole",
            node = rip.number().0,
            start,
            end,
            "hole_punched"
        );
        Ok(())
    }

    /// Truncation applies to an open file, so the node must already be
    /// resident.
    fn acquire_resident(&self, number: InodeNumber) -> Result<NodeRef> {
        self.cache
            .acquire_cached(self.key(number))
            .ok_or(FsError::InvalidArgument)
    }

    pub(crate) fn truncate_to(&self, rip: &NodeRef, new_size: u64) -> Result<()> {
        if rip.kind().is_device() {
            return Err(FsError::InvalidArgument);
        }
        if new_size > self.params.max_file_size {
            return Err(FsError::FileTooLarge);
        }

        let old_size = rip.size();
        if new_size < old_size {
            self.free_hole(rip, new_size, old_size)?;
        } else if new_size > old_size {
            let zone_size = self.params.geometry.zone_size();
            let tail = old_size % zone_size;
            if tail != 0 {
                self.zero_range(rip, old_size, zone_size - tail)?;
            }
        }

        rip.update(|ino| {
            ino.size = new_size;
            ino.touch(TimeFlags::CTIME | TimeFlags::MTIME);
        });
        tracing::debug!(
            target: "zonix::hole",
            node = rip.number().0,
            from = old_size,
            to = new_size,
            "truncated"
        );
        Ok(())
    }

    /// Reclaim `[start, end)`: zero the partial zones at the edges, unmap
    /// every zone the range covers in full.
    ///
    /// The final partial zone belongs entirely to the range when `end` is
    /// the end of the file, so it is unmapped rather than zeroed. An unmap
    /// failure propagates mid-loop; zones already freed stay freed and the
    /// node's times are left unstamped.
    fn free_hole(&self, rip: &NodeRef, start: u64, end: u64) -> Result<()> {
        let size = rip.size();
        let end = end.min(size);
        if end <= start {
            return Err(FsError::InvalidArgument);
        }

        let geometry = self.params.geometry;
        let zone_size = geometry.zone_size();
        let zero_last = start % zone_size != 0;
        let zero_first = end % zone_size != 0 && end < size;

        if start / zone_size == (end - 1) / zone_size && (zero_last || zero_first) {
            // The hole lives inside one zone which stays mapped.
            self.zero_range(rip, start, end - start)?;
        } else {
            if zero_last {
                self.zero_range(rip, start, zone_size - start % zone_size)?;
            }
            if zero_first {
                let head = end - end % zone_size;
                self.zero_range(rip, head, end - head)?;
            }

            let mut limit = end / zone_size;
            if end == size && end % zone_size != 0 {
                limit += 1;
            }
            for zone in geometry.zone_ceil(start).0..limit {
                self.zones.unmap_zone(rip, ZoneNumber(zone))?;
            }
        }

        rip.update(|ino| ino.touch(TimeFlags::CTIME | TimeFlags::MTIME));
        Ok(())
    }

    /// Zero `len` bytes from `pos`, one block at a time.
    ///
    /// Never allocates: hitting an unmapped block ends the walk quietly,
    /// since a hole already reads as zeros.
    fn zero_range(&self, rip: &NodeRef, pos: u64, len: u64) -> Result<()> {
        let mut pos = pos;
        let mut remaining = len;
        while remaining > 0 {
            let Some(mut block) = self.zones.map_block(rip, pos)? else {
                return Ok(());
            };
            let offset = self.params.geometry.offset_in_block(pos);
            let bytes = block.bytes_mut();
            let step = remaining.min((bytes.len() - offset) as u64) as usize;
            bytes[offset..offset + step].fill(0);
            block.mark_dirty();
            drop(block);
            pos += step as u64;
            remaining -= step as u64;
        }
        Ok(())
    }
}
