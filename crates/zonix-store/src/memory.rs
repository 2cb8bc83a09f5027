//! In-memory store backing the engine's unit tests and the scenario
//! harness.
//!
//! One [`MemFs`] implements every store trait against a single locked node
//! table, so a test can build a tree, run engine operations against it,
//! and inspect the aftermath without any on-disk format in the way.
//!
//! Behavioral notes:
//!
//! - Reclaim mirrors a real cache: when the last handle on a node drops
//!   and its link count is zero, the node is deleted from the table.
//! - `unmap_zone` only forgets the mapping; the byte store is not
//!   scrubbed. Reads consult the zone map first, so unmapped positions
//!   read as zero regardless of what the bytes once were.
//! - Directory mutations stamp content and status times on the directory;
//!   lookups leave it untouched.
//! - Each `inject_*` knob arms exactly one failure of the matching
//!   operation, for exercising partial-failure paths.
//!
//! Lock order: the table lock, then a slot lock. [`NodeRef`] accessors
//! take slot locks with the table lock unheld, never the reverse.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};
use zonix_error::{FsError, Result};
use zonix_types::{DeviceId, FileKind, InodeNumber, Name, TimeFlags, ZoneGeometry, ZoneNumber};

use crate::cache::NodeCache;
use crate::dir::{DescendError, DirIndex};
use crate::handle::{CacheOwner, NodeKey, NodeRef, NodeSlot};
use crate::inode::Inode;
use crate::map::{MappedBlock, ZoneMap};
use crate::params::SuperParams;

/// Inode number of the root directory in every [`MemFs`].
pub const ROOT: InodeNumber = InodeNumber(1);

/// `max_file_size` reported by [`MemFs::params`].
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug)]
struct NodeBody {
    slot: Arc<NodeSlot>,
    entries: BTreeMap<Name, InodeNumber>,
    data: Vec<u8>,
    /// Zone indexes with storage mapped.
    zones: BTreeSet<u64>,
    /// Another filesystem is mounted on this directory.
    mount_point: bool,
}

#[derive(Debug, Default)]
struct Faults {
    lookup: Option<FsError>,
    insert: Option<FsError>,
    remove: Option<FsError>,
    descend: Option<FsError>,
    /// Fails `unmap_zone` once, when asked for this zone index.
    unmap: Option<(u64, FsError)>,
}

#[derive(Debug)]
struct Inner {
    nodes: BTreeMap<InodeNumber, NodeBody>,
    next: u32,
    faults: Faults,
}

/// Whole-filesystem in-memory store.
#[derive(Debug)]
pub struct MemFs {
    device: DeviceId,
    geometry: ZoneGeometry,
    inner: Mutex<Inner>,
    weak: Weak<MemFs>,
}

impl MemFs {
    /// Store with an empty root directory at inode [`ROOT`].
    pub fn new(device: DeviceId, geometry: ZoneGeometry) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let mut inode = Inode::new(FileKind::Directory);
            inode.link_count = 2;
            let mut entries = BTreeMap::new();
            entries.insert(Name::dot(), ROOT);
            entries.insert(Name::dot_dot(), ROOT);
            let body = NodeBody {
                slot: NodeSlot::new(
                    NodeKey {
                        device,
                        number: ROOT,
                    },
                    inode,
                ),
                entries,
                data: Vec::new(),
                zones: BTreeSet::new(),
                mount_point: false,
            };
            let mut nodes = BTreeMap::new();
            nodes.insert(ROOT, body);
            MemFs {
                device,
                geometry,
                inner: Mutex::new(Inner {
                    nodes,
                    next: ROOT.0 + 1,
                    faults: Faults::default(),
                }),
                weak: weak.clone(),
            }
        })
    }

    /// Volume parameters for mounting this store writable.
    #[must_use]
    pub fn params(&self) -> SuperParams {
        SuperParams {
            device: self.device,
            geometry: self.geometry,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            read_only: false,
            root: ROOT,
        }
    }

    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.device
    }

    fn owner(&self) -> Weak<dyn CacheOwner> {
        self.weak.clone()
    }

    // ── tree building ────────────────────────────────────────────────────

    /// Create a regular file under `parent`, sized `size` and filled with a
    /// nonzero byte pattern, with every covering zone mapped.
    pub fn create_file(&self, parent: InodeNumber, name: &str, size: u64) -> Result<InodeNumber> {
        self.create_node(parent, name, FileKind::Regular, pattern(size))
    }

    /// Create an empty directory under `parent`, wiring `.` and `..` and
    /// bumping the parent's link count.
    pub fn create_dir(&self, parent: InodeNumber, name: &str) -> Result<InodeNumber> {
        self.create_node(parent, name, FileKind::Directory, Vec::new())
    }

    /// Create a symlink under `parent` whose data is `target`.
    pub fn create_symlink(
        &self,
        parent: InodeNumber,
        name: &str,
        target: &str,
    ) -> Result<InodeNumber> {
        self.create_node(parent, name, FileKind::Symlink, target.as_bytes().to_vec())
    }

    /// Create a node of some other `kind` (device, fifo, socket) under
    /// `parent`.
    pub fn create_special(
        &self,
        parent: InodeNumber,
        name: &str,
        kind: FileKind,
    ) -> Result<InodeNumber> {
        self.create_node(parent, name, kind, Vec::new())
    }

    fn create_node(
        &self,
        parent: InodeNumber,
        name: &str,
        kind: FileKind,
        data: Vec<u8>,
    ) -> Result<InodeNumber> {
        let name = Name::new(name)?;
        let mut guard = self.inner.lock();
        let number = InodeNumber(guard.next);

        let parent_body = guard.nodes.get_mut(&parent).ok_or(FsError::NotFound)?;
        if !parent_body.slot.lock().kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if parent_body.entries.contains_key(&name) {
            return Err(FsError::Exists);
        }
        parent_body.entries.insert(name, number);
        if kind.is_dir() {
            parent_body.slot.lock().link_count += 1;
        }

        guard.next += 1;
        let size = data.len() as u64;
        let zones: BTreeSet<u64> = if size == 0 {
            BTreeSet::new()
        } else {
            (0..=self.geometry.zone_floor(size - 1).0).collect()
        };
        let mut entries = BTreeMap::new();
        let mut inode = Inode::new(kind);
        inode.size = size;
        inode.link_count = if kind.is_dir() {
            entries.insert(Name::dot(), number);
            entries.insert(Name::dot_dot(), parent);
            2
        } else {
            1
        };
        let body = NodeBody {
            slot: NodeSlot::new(
                NodeKey {
                    device: self.device,
                    number,
                },
                inode,
            ),
            entries,
            data,
            zones,
            mount_point: false,
        };
        guard.nodes.insert(number, body);
        Ok(number)
    }

    // ── inspection ───────────────────────────────────────────────────────

    /// Snapshot of a node's metadata, or `None` if it was reclaimed.
    #[must_use]
    pub fn inode_of(&self, node: InodeNumber) -> Option<Inode> {
        let guard = self.inner.lock();
        guard.nodes.get(&node).map(|body| body.slot.lock().clone())
    }

    /// What `name` maps to in `dir`, bypassing mount handling.
    #[must_use]
    pub fn resolve(&self, dir: InodeNumber, name: &str) -> Option<InodeNumber> {
        let name = Name::new(name).ok()?;
        let guard = self.inner.lock();
        guard.nodes.get(&dir)?.entries.get(&name).copied()
    }

    /// File bytes as a reader sees them: zero wherever no zone is mapped.
    #[must_use]
    pub fn read_bytes(&self, node: InodeNumber, pos: u64, len: usize) -> Vec<u8> {
        let guard = self.inner.lock();
        let Some(body) = guard.nodes.get(&node) else {
            return vec![0; len];
        };
        (0..len)
            .map(|i| {
                let at = pos + i as u64;
                if !body.zones.contains(&self.geometry.zone_floor(at).0) {
                    return 0;
                }
                usize::try_from(at)
                    .ok()
                    .and_then(|at| body.data.get(at).copied())
                    .unwrap_or(0)
            })
            .collect()
    }

    #[must_use]
    pub fn zone_mapped(&self, node: InodeNumber, zone: u64) -> bool {
        let guard = self.inner.lock();
        guard
            .nodes
            .get(&node)
            .map_or(false, |body| body.zones.contains(&zone))
    }

    /// Live handle count on `node`, zero if absent.
    #[must_use]
    pub fn live_holds(&self, node: InodeNumber) -> u32 {
        let guard = self.inner.lock();
        guard.nodes.get(&node).map_or(0, |body| body.slot.holds())
    }

    /// Entry names of `dir` in index order, `.` and `..` included.
    #[must_use]
    pub fn entry_names(&self, dir: InodeNumber) -> Vec<String> {
        let guard = self.inner.lock();
        guard.nodes.get(&dir).map_or_else(Vec::new, |body| {
            body.entries.keys().map(|name| String::from(*name)).collect()
        })
    }

    // ── test seams ───────────────────────────────────────────────────────

    /// Force a link count, for ceiling and zombie scenarios.
    pub fn set_link_count(&self, node: InodeNumber, count: u16) {
        let guard = self.inner.lock();
        if let Some(body) = guard.nodes.get(&node) {
            body.slot.lock().link_count = count;
        }
    }

    /// Mark `node` as having a filesystem mounted on it.
    pub fn set_mount_point(&self, node: InodeNumber, mounted: bool) {
        let mut guard = self.inner.lock();
        if let Some(body) = guard.nodes.get_mut(&node) {
            body.mount_point = mounted;
        }
    }

    /// Drop accumulated timestamp flags and the dirty bit so the next
    /// operation's stamps show up alone.
    pub fn clear_update_flags(&self, node: InodeNumber) {
        let guard = self.inner.lock();
        if let Some(body) = guard.nodes.get(&node) {
            let mut ino = body.slot.lock();
            ino.update = TimeFlags::NONE;
            ino.dirty = false;
        }
    }

    /// Fail the next `lookup` with `err`.
    pub fn inject_lookup_error(&self, err: FsError) {
        self.inner.lock().faults.lookup = Some(err);
    }

    /// Fail the next `insert` with `err`.
    pub fn inject_insert_error(&self, err: FsError) {
        self.inner.lock().faults.insert = Some(err);
    }

    /// Fail the next `remove` with `err`.
    pub fn inject_remove_error(&self, err: FsError) {
        self.inner.lock().faults.remove = Some(err);
    }

    /// Fail the next `descend` with a storage error `err`.
    pub fn inject_descend_error(&self, err: FsError) {
        self.inner.lock().faults.descend = Some(err);
    }

    /// Fail the next `unmap_zone` of zone index `zone` with `err`.
    pub fn inject_unmap_error(&self, zone: u64, err: FsError) {
        self.inner.lock().faults.unmap = Some((zone, err));
    }
}

impl CacheOwner for MemFs {
    fn note_idle(&self, key: NodeKey) {
        if key.device != self.device {
            return;
        }
        let mut guard = self.inner.lock();
        let Some(body) = guard.nodes.get(&key.number) else {
            return;
        };
        if body.slot.holds() == 0 && body.slot.lock().link_count == 0 {
            guard.nodes.remove(&key.number);
            tracing::debug!(
                target: "zonix::memfs",
                node = key.number.0,
                "reclaimed_unlinked_node"
            );
        }
    }
}

impl NodeCache for MemFs {
    fn acquire(&self, key: NodeKey) -> Option<NodeRef> {
        if key.device != self.device {
            return None;
        }
        let guard = self.inner.lock();
        let body = guard.nodes.get(&key.number)?;
        Some(NodeRef::new(Arc::clone(&body.slot), self.owner()))
    }

    // Every resident node counts as cached here; a real store would
    // distinguish pinned-in-core from loadable.
    fn acquire_cached(&self, key: NodeKey) -> Option<NodeRef> {
        self.acquire(key)
    }
}

impl DirIndex for MemFs {
    fn lookup(&self, dir: &NodeRef, name: &Name) -> Result<InodeNumber> {
        let mut guard = self.inner.lock();
        if let Some(err) = guard.faults.lookup.take() {
            return Err(err);
        }
        let body = guard.nodes.get(&dir.number()).ok_or(FsError::Io)?;
        if !body.slot.lock().kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        body.entries.get(name).copied().ok_or(FsError::NotFound)
    }

    fn insert(&self, dir: &NodeRef, name: &Name, node: InodeNumber) -> Result<()> {
        let mut guard = self.inner.lock();
        if let Some(err) = guard.faults.insert.take() {
            return Err(err);
        }
        let body = guard.nodes.get_mut(&dir.number()).ok_or(FsError::Io)?;
        if !body.slot.lock().kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if body.entries.contains_key(name) {
            return Err(FsError::Exists);
        }
        body.entries.insert(*name, node);
        body.slot.lock().touch(TimeFlags::CTIME | TimeFlags::MTIME);
        Ok(())
    }

    fn remove(&self, dir: &NodeRef, name: &Name) -> Result<()> {
        let mut guard = self.inner.lock();
        if let Some(err) = guard.faults.remove.take() {
            return Err(err);
        }
        let body = guard.nodes.get_mut(&dir.number()).ok_or(FsError::Io)?;
        if body.entries.remove(name).is_none() {
            return Err(FsError::NotFound);
        }
        body.slot.lock().touch(TimeFlags::CTIME | TimeFlags::MTIME);
        Ok(())
    }

    fn is_empty(&self, dir: &NodeRef) -> Result<bool> {
        let guard = self.inner.lock();
        let body = guard.nodes.get(&dir.number()).ok_or(FsError::Io)?;
        if !body.slot.lock().kind.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok(body
            .entries
            .keys()
            .all(|name| name.is_dot() || name.is_dot_dot()))
    }

    fn descend(&self, dir: &NodeRef, name: &Name) -> std::result::Result<NodeRef, DescendError> {
        let mut guard = self.inner.lock();
        if let Some(err) = guard.faults.descend.take() {
            return Err(DescendError::Fs(err));
        }
        if dir.number() == ROOT && name.is_dot_dot() {
            return Err(DescendError::LeaveMount);
        }
        let body = guard
            .nodes
            .get(&dir.number())
            .ok_or(DescendError::Fs(FsError::Io))?;
        let target = *body.entries.get(name).ok_or(DescendError::NotFound)?;
        let target_body = guard
            .nodes
            .get(&target)
            .ok_or(DescendError::Fs(FsError::Io))?;
        if target_body.mount_point {
            return Err(DescendError::EnterMount);
        }
        Ok(NodeRef::new(Arc::clone(&target_body.slot), self.owner()))
    }
}

impl ZoneMap for MemFs {
    fn map_block(&self, node: &NodeRef, pos: u64) -> Result<Option<Box<dyn MappedBlock + '_>>> {
        let guard = self.inner.lock();
        let body = guard.nodes.get(&node.number()).ok_or(FsError::Io)?;
        if !body.zones.contains(&self.geometry.zone_floor(pos).0) {
            return Ok(None);
        }
        let start = self.geometry.block_floor(pos);
        let mut bytes = vec![0_u8; self.geometry.block_size() as usize];
        if let Ok(from) = usize::try_from(start) {
            for (i, out) in bytes.iter_mut().enumerate() {
                if let Some(b) = body.data.get(from + i) {
                    *out = *b;
                }
            }
        }
        Ok(Some(Box::new(MemBlock {
            fs: self.weak.clone(),
            node: node.number(),
            start,
            bytes,
            dirty: false,
        })))
    }

    fn unmap_zone(&self, node: &NodeRef, zone: ZoneNumber) -> Result<()> {
        let mut guard = self.inner.lock();
        if let Some((armed, err)) = guard.faults.unmap {
            if armed == zone.0 {
                guard.faults.unmap = None;
                return Err(err);
            }
        }
        let body = guard.nodes.get_mut(&node.number()).ok_or(FsError::Io)?;
        body.zones.remove(&zone.0);
        Ok(())
    }
}

/// Block guard over a copied-out block; dirty contents land back in the
/// table when the guard drops.
struct MemBlock {
    fs: Weak<MemFs>,
    node: InodeNumber,
    /// Byte offset of the block start within the file.
    start: u64,
    bytes: Vec<u8>,
    dirty: bool,
}

impl MappedBlock for MemBlock {
    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Drop for MemBlock {
    fn drop(&mut self) {
        if !self.dirty {
            return;
        }
        let Some(fs) = self.fs.upgrade() else {
            return;
        };
        let mut guard = fs.inner.lock();
        let Some(body) = guard.nodes.get_mut(&self.node) else {
            return;
        };
        let Ok(start) = usize::try_from(self.start) else {
            return;
        };
        let end = body.data.len().min(start.saturating_add(self.bytes.len()));
        if start < end {
            body.data[start..end].copy_from_slice(&self.bytes[..end - start]);
        }
    }
}

/// Nonzero fill so zeroed ranges are distinguishable from untouched ones.
fn pattern(len: u64) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 + 1).collect()
}
