use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use zonix_types::{DeviceId, FileKind, InodeNumber};

use crate::inode::Inode;

/// Identity of a node: the device it lives on plus its inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub device: DeviceId,
    pub number: InodeNumber,
}

/// One resident node: identity, locked metadata, and a hold count.
///
/// The hold count tracks live [`NodeRef`] handles on this slot. The cache
/// that owns the slot learns when it drops to zero through
/// [`CacheOwner::note_idle`] and may then evict the node or, if its link
/// count is also zero, reclaim its storage.
#[derive(Debug)]
pub struct NodeSlot {
    key: NodeKey,
    state: Mutex<Inode>,
    holds: AtomicU32,
}

impl NodeSlot {
    #[must_use]
    pub fn new(key: NodeKey, inode: Inode) -> Arc<Self> {
        Arc::new(Self {
            key,
            state: Mutex::new(inode),
            holds: AtomicU32::new(0),
        })
    }

    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// Number of live handles on this slot.
    #[must_use]
    pub fn holds(&self) -> u32 {
        self.holds.load(Ordering::Acquire)
    }

    /// Lock the node metadata directly.
    ///
    /// For cache implementations making admission and reclaim decisions;
    /// engine code goes through [`NodeRef`] accessors instead.
    pub fn lock(&self) -> MutexGuard<'_, Inode> {
        self.state.lock()
    }
}

/// Cache-side view of handle lifecycle.
pub trait CacheOwner: Send + Sync {
    /// The last handle on `key` was dropped.
    fn note_idle(&self, key: NodeKey);
}

/// Counted handle on a resident node.
///
/// Creating a handle (or calling [`NodeRef::duplicate`]) increments the
/// slot's hold count; dropping one decrements it and notifies the owning
/// cache when the count reaches zero. There is deliberately no `Clone`
/// impl: taking an extra hold is always an explicit act, so every
/// increment has a visible matching release.
///
/// The scalar accessors each take and release the slot lock internally,
/// which keeps two handles on the same node (a common aliasing case in
/// rename) deadlock-free. [`NodeRef::update`] is the only way to hold the
/// lock across a read-modify-write.
#[derive(Debug)]
pub struct NodeRef {
    slot: Arc<NodeSlot>,
    owner: Weak<dyn CacheOwner>,
}

impl NodeRef {
    #[must_use]
    pub fn new(slot: Arc<NodeSlot>, owner: Weak<dyn CacheOwner>) -> Self {
        slot.holds.fetch_add(1, Ordering::AcqRel);
        Self { slot, owner }
    }

    /// Take an additional hold on the same node.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        Self::new(Arc::clone(&self.slot), Weak::clone(&self.owner))
    }

    #[must_use]
    pub fn key(&self) -> NodeKey {
        self.slot.key()
    }

    #[must_use]
    pub fn number(&self) -> InodeNumber {
        self.slot.key().number
    }

    #[must_use]
    pub fn device(&self) -> DeviceId {
        self.slot.key().device
    }

    /// Whether two handles refer to the same in-core node.
    #[must_use]
    pub fn same_as(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.slot.state.lock().kind
    }

    #[must_use]
    pub fn link_count(&self) -> u16 {
        self.slot.state.lock().link_count
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.slot.state.lock().size
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.slot.state.lock().unlink_armed
    }

    /// Run `f` with the node metadata locked.
    pub fn update<R>(&self, f: impl FnOnce(&mut Inode) -> R) -> R {
        let mut guard = self.slot.state.lock();
        f(&mut guard)
    }
}

impl Drop for NodeRef {
    fn drop(&mut self) {
        if self.slot.holds.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(owner) = self.owner.upgrade() {
                owner.note_idle(self.slot.key());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use zonix_types::TimeFlags;

    struct IdleLog {
        calls: AtomicUsize,
        last: Mutex<Option<NodeKey>>,
    }

    impl IdleLog {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    impl CacheOwner for IdleLog {
        fn note_idle(&self, key: NodeKey) {
            self.calls.fetch_add(1, Ordering::AcqRel);
            *self.last.lock() = Some(key);
        }
    }

    fn slot(number: u32) -> Arc<NodeSlot> {
        NodeSlot::new(
            NodeKey {
                device: DeviceId(7),
                number: InodeNumber(number),
            },
            Inode::new(FileKind::Regular),
        )
    }

    #[test]
    fn holds_track_handles_and_duplicates() {
        let owner = IdleLog::new();
        let slot = slot(10);
        assert_eq!(slot.holds(), 0);

        let a = NodeRef::new(Arc::clone(&slot), Arc::downgrade(&owner) as Weak<dyn CacheOwner>);
        assert_eq!(slot.holds(), 1);

        let b = a.duplicate();
        assert_eq!(slot.holds(), 2);
        assert!(a.same_as(&b));

        drop(b);
        assert_eq!(slot.holds(), 1);
        assert_eq!(owner.calls.load(Ordering::Acquire), 0);

        drop(a);
        assert_eq!(slot.holds(), 0);
        assert_eq!(owner.calls.load(Ordering::Acquire), 1);
        assert_eq!(
            *owner.last.lock(),
            Some(NodeKey {
                device: DeviceId(7),
                number: InodeNumber(10),
            })
        );
    }

    #[test]
    fn only_the_last_drop_notifies() {
        let owner = IdleLog::new();
        let slot = slot(3);
        let a = NodeRef::new(Arc::clone(&slot), Arc::downgrade(&owner) as Weak<dyn CacheOwner>);
        let b = a.duplicate();
        let c = b.duplicate();
        drop(a);
        drop(c);
        assert_eq!(owner.calls.load(Ordering::Acquire), 0);
        drop(b);
        assert_eq!(owner.calls.load(Ordering::Acquire), 1);
    }

    #[test]
    fn drop_after_owner_is_gone_is_harmless() {
        let owner = IdleLog::new();
        let handle = NodeRef::new(slot(4), Arc::downgrade(&owner) as Weak<dyn CacheOwner>);
        drop(owner);
        drop(handle);
    }

    #[test]
    fn update_and_accessors_agree() {
        let owner = IdleLog::new();
        let handle = NodeRef::new(slot(9), Arc::downgrade(&owner) as Weak<dyn CacheOwner>);

        handle.update(|ino| {
            ino.link_count = 5;
            ino.size = 4096;
            ino.unlink_armed = true;
            ino.touch(TimeFlags::CTIME);
        });

        assert_eq!(handle.link_count(), 5);
        assert_eq!(handle.size(), 4096);
        assert!(handle.is_armed());
        assert_eq!(handle.kind(), FileKind::Regular);
    }

    #[test]
    fn same_as_distinguishes_slots() {
        let owner = IdleLog::new();
        let weak = Arc::downgrade(&owner) as Weak<dyn CacheOwner>;
        let a = NodeRef::new(slot(1), Weak::clone(&weak));
        let b = NodeRef::new(slot(2), weak);
        assert!(!a.same_as(&b));
    }
}
