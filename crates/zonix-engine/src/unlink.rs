//! Hard links, unlink, and rmdir.
//!
//! [`Volume::unlink_file`] is the one single-entry removal routine; unlink,
//! rmdir's entry and dot cleanup, and rename's destination removal all go
//! through it, so the deletion policy gate inside applies to every way an
//! entry can disappear.

use zonix_error::{FsError, Result};
use zonix_store::{DescendError, NodeRef};
use zonix_types::{InodeNumber, Name, TimeFlags, Uid, LINK_MAX};

use crate::policy::{self, DeletePolicy, BACKUP_SUFFIX};
use crate::Volume;

impl Volume {
    /// Add a directory entry for an existing node (hard link).
    pub fn link(
        &self,
        caller: Uid,
        target: InodeNumber,
        dir: InodeNumber,
        name: &Name,
    ) -> Result<()> {
        let target = self.acquire(target)?;

        if target.link_count() >= LINK_MAX {
            return Err(FsError::TooManyLinks);
        }
        // Linking directories is how loops are made; only root gets to.
        if target.kind().is_dir() && !caller.is_root() {
            return Err(FsError::NotPermitted);
        }

        let dirp = self.acquire(dir)?;
        if dirp.link_count() == 0 {
            // Unlinked while the caller still held its number.
            return Err(FsError::NotFound);
        }

        // The name must be free; a probe that stops at a mount boundary
        // counts as taken.
        match self.dir.descend(&dirp, name) {
            Ok(_) => return Err(FsError::Exists),
            Err(DescendError::EnterMount | DescendError::LeaveMount) => {
                return Err(FsError::Exists);
            }
            Err(DescendError::NotFound) => {}
            Err(DescendError::Fs(err)) => return Err(err),
        }

        self.dir.insert(&dirp, name, target.number())?;
        target.update(|ino| {
            ino.link_count += 1;
            ino.touch(TimeFlags::CTIME);
        });

        tracing::debug!(
            target: "zonix::unlink",
            node = target.number().0,
            dir = dirp.number().0,
            name = %name,
            "link_added"
        );
        Ok(())
    }

    /// Remove a non-directory entry, subject to the directory's deletion
    /// policy.
    pub fn unlink(&self, dir: InodeNumber, name: &Name) -> Result<()> {
        let dirp = self.acquire(dir)?;
        let node = self.resolve_victim(&dirp, name)?;

        if self.params.read_only {
            return Err(FsError::ReadOnly);
        }
        if node.kind().is_dir() {
            return Err(FsError::NotPermitted);
        }
        self.unlink_file(&dirp, Some(&node), name)
    }

    /// Remove an empty directory.
    pub fn rmdir(&self, dir: InodeNumber, name: &Name) -> Result<()> {
        let dirp = self.acquire(dir)?;
        let node = self.resolve_victim(&dirp, name)?;

        if self.params.read_only {
            return Err(FsError::ReadOnly);
        }
        self.remove_dir(&dirp, &node, name)
    }

    /// Resolve the target of an unlink or rmdir; a mount crossing in
    /// either direction means the name is in use by another filesystem.
    fn resolve_victim(&self, dirp: &NodeRef, name: &Name) -> Result<NodeRef> {
        match self.dir.descend(dirp, name) {
            Ok(node) => Ok(node),
            Err(DescendError::EnterMount | DescendError::LeaveMount) => Err(FsError::Busy),
            Err(DescendError::NotFound) => Err(FsError::NotFound),
            Err(DescendError::Fs(err)) => Err(err),
        }
    }

    /// Remove the directory `rip`, known to be `dirp`'s entry `name`.
    pub(crate) fn remove_dir(&self, dirp: &NodeRef, rip: &NodeRef, name: &Name) -> Result<()> {
        if !rip.kind().is_dir() {
            return Err(FsError::NotDirectory);
        }
        if !self.dir.is_empty(rip)? {
            return Err(FsError::NotEmpty);
        }
        if name.is_dot() || name.is_dot_dot() {
            return Err(FsError::InvalidArgument);
        }
        if rip.number() == self.params.root {
            return Err(FsError::Busy);
        }

        self.unlink_file(dirp, Some(rip), name)?;

        // The directory is unreachable from here on; a failed dot removal
        // costs a stale link count at worst.
        for dot in [Name::dot(), Name::dot_dot()] {
            if let Err(err) = self.unlink_file(rip, None, &dot) {
                tracing::warn!(
                    target: "zonix::unlink",
                    dir = rip.number().0,
                    name = %dot,
                    error = %err,
                    "dot_cleanup_failed"
                );
            }
        }

        tracing::debug!(
            target: "zonix::unlink",
            dir = rip.number().0,
            parent = dirp.number().0,
            name = %name,
            "directory_removed"
        );
        Ok(())
    }

    /// Remove one entry from `dirp`, honoring its deletion policy.
    ///
    /// `rip` is the already-resolved target when the caller holds one;
    /// with `None` the name is resolved here. The policy gate engages only
    /// for regular files that are not themselves policy markers; all other
    /// targets take the plain path.
    pub(crate) fn unlink_file(
        &self,
        dirp: &NodeRef,
        rip: Option<&NodeRef>,
        name: &Name,
    ) -> Result<()> {
        let rip = match rip {
            Some(rip) => rip.duplicate(),
            None => {
                let number = self.dir.lookup(dirp, name)?;
                self.cache
                    .acquire(self.key(number))
                    .ok_or(FsError::NotFound)?
            }
        };

        if !policy::is_marker(name) && rip.kind().is_regular() {
            match self.current_policy(dirp) {
                DeletePolicy::Deny => return Err(FsError::NotPermitted),
                DeletePolicy::TwoStep => {
                    if rip.is_armed() {
                        // Second request: disarm and fall through. The
                        // disarm sticks even if the delete below fails.
                        rip.update(|ino| {
                            ino.unlink_armed = false;
                            ino.touch(TimeFlags::CTIME);
                        });
                        tracing::debug!(
                            target: "zonix::policy",
                            node = rip.number().0,
                            "twostep_disarmed"
                        );
                    } else {
                        rip.update(|ino| {
                            ino.unlink_armed = true;
                            ino.touch(TimeFlags::CTIME);
                        });
                        tracing::debug!(
                            target: "zonix::policy",
                            node = rip.number().0,
                            "twostep_armed"
                        );
                        return Err(FsError::InProgress);
                    }
                }
                DeletePolicy::Backup => {
                    // A name already carrying the suffix deletes normally;
                    // backups of backups would never terminate.
                    if !name.ends_with(BACKUP_SUFFIX) {
                        return self.backup_aside(dirp, &rip, name);
                    }
                }
                DeletePolicy::Unrestricted => {}
            }
        }

        self.dir.remove(dirp, name)?;
        rip.update(|ino| {
            ino.link_count = ino.link_count.saturating_sub(1);
            ino.touch(TimeFlags::CTIME);
        });
        tracing::debug!(
            target: "zonix::unlink",
            node = rip.number().0,
            dir = dirp.number().0,
            name = %name,
            "entry_removed"
        );
        Ok(())
    }

    /// Backup policy: re-point the entry at `<name>.bak` instead of
    /// deleting it. The link count is untouched; the file merely changes
    /// name.
    fn backup_aside(&self, dirp: &NodeRef, rip: &NodeRef, name: &Name) -> Result<()> {
        let backup = name.with_suffix(BACKUP_SUFFIX)?;

        match self.dir.lookup(dirp, &backup) {
            Ok(number) => {
                // Never overwrite an existing backup.
                return Err(match self.cache.acquire(self.key(number)) {
                    Some(existing) if !existing.kind().is_regular() => FsError::IsDirectory,
                    _ => FsError::Exists,
                });
            }
            Err(FsError::NotFound) => {}
            Err(err) => return Err(err),
        }

        // Insert before remove: a failure in between leaves two names on
        // the node, never zero.
        self.dir.insert(dirp, &backup, rip.number())?;
        self.dir.remove(dirp, name)?;
        rip.update(|ino| ino.touch(TimeFlags::CTIME));

        tracing::debug!(
            target: "zonix::policy",
            node = rip.number().0,
            dir = dirp.number().0,
            name = %name,
            backup = %backup,
            "backed_up_aside"
        );
        Ok(())
    }
}
