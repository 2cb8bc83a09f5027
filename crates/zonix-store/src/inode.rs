use zonix_types::{FileKind, TimeFlags};

/// In-core metadata for one filesystem node.
///
/// This is the slice of the on-disk inode the mutation engine works with.
/// Whole-inode encode/decode belongs to the backing store; the engine only
/// ever reads and writes these fields under the slot lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub kind: FileKind,
    /// Number of directory entries referencing this node.
    pub link_count: u16,
    /// File size in bytes.
    pub size: u64,
    /// Two-step deletion protection: set by the first delete request,
    /// cleared by the second (or by an overwriting rename of the same name).
    pub unlink_armed: bool,
    /// Timestamp refreshes owed to this node at the next write-back.
    pub update: TimeFlags,
    /// Node differs from its on-disk image.
    pub dirty: bool,
}

impl Inode {
    /// Fresh metadata for a node of `kind`: zero links, zero size, clean.
    #[must_use]
    pub fn new(kind: FileKind) -> Self {
        Self {
            kind,
            link_count: 0,
            size: 0,
            unlink_armed: false,
            update: TimeFlags::NONE,
            dirty: false,
        }
    }

    /// Record a timestamp refresh and mark the node dirty.
    pub fn touch(&mut self, flags: TimeFlags) {
        self.update |= flags;
        self.dirty = true;
    }
}
