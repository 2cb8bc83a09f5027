//! Rename: move or retitle an entry, replacing a removable destination.
//!
//! After both ends are resolved the flow switches from early returns to an
//! accumulated status, because two side effects must run regardless of
//! where validation stopped: the commit halves are individually
//! best-effort, and an in-place same-name rename clears two-step
//! protection even when the rename itself failed.

use zonix_error::{FsError, Result};
use zonix_store::{DescendError, NodeRef};
use zonix_types::{InodeNumber, Name, LINK_MAX};

use crate::Volume;

impl Volume {
    /// Move the entry `old_dir/old_name` to `new_dir/new_name`.
    ///
    /// An existing destination is removed first through the same
    /// policy-aware path as unlink/rmdir; directories may only replace
    /// empty directories, non-directories only non-directories. Renaming
    /// a node onto itself succeeds without touching anything.
    pub fn rename(
        &self,
        old_dir: InodeNumber,
        old_name: &Name,
        new_dir: InodeNumber,
        new_name: &Name,
    ) -> Result<()> {
        let old_dirp = self.acquire(old_dir)?;

        let old_ip = match self.dir.descend(&old_dirp, old_name) {
            Ok(node) => node,
            Err(DescendError::EnterMount) => return Err(FsError::CrossDevice),
            Err(DescendError::LeaveMount) => return Err(FsError::InvalidArgument),
            Err(DescendError::NotFound) => return Err(FsError::NotFound),
            Err(DescendError::Fs(err)) => return Err(err),
        };

        let new_dirp = self.acquire(new_dir)?;
        if new_dirp.link_count() == 0 {
            return Err(FsError::NotFound);
        }

        // The destination entry is optional. Only entering a mounted
        // filesystem is an error; every other outcome reads as "absent".
        let mut status = Ok(());
        let new_ip = match self.dir.descend(&new_dirp, new_name) {
            Ok(node) => Some(node),
            Err(DescendError::EnterMount) => {
                status = Err(FsError::Busy);
                None
            }
            Err(_) => None,
        };

        let odir = old_ip.kind().is_dir();
        let same_pdir = old_dirp.same_as(&new_dirp);
        let mut same_node = false;

        if status.is_ok()
            && (old_name.is_dot()
                || old_name.is_dot_dot()
                || new_name.is_dot()
                || new_name.is_dot_dot())
        {
            status = Err(FsError::InvalidArgument);
        }

        if status.is_ok() && odir && !same_pdir {
            status = self.assert_not_ancestor(&new_dirp, &old_ip);
        }

        match &new_ip {
            None => {
                // Moving a directory under a new parent adds a `..` link
                // there.
                if status.is_ok() && odir && !same_pdir && new_dirp.link_count() >= LINK_MAX {
                    status = Err(FsError::TooManyLinks);
                }
            }
            Some(new_ip) => {
                if status.is_ok() {
                    if new_ip.same_as(&old_ip) {
                        same_node = true;
                    } else if odir && !new_ip.kind().is_dir() {
                        status = Err(FsError::NotDirectory);
                    } else if !odir && new_ip.kind().is_dir() {
                        status = Err(FsError::IsDirectory);
                    }
                }
            }
        }

        // An existing destination goes through the regular removal paths,
        // deletion policy included; a policy refusal aborts the rename.
        if status.is_ok() && !same_node {
            if let Some(new_ip) = &new_ip {
                status = if new_ip.kind().is_dir() {
                    self.remove_dir(&new_dirp, new_ip, new_name)
                } else {
                    self.unlink_file(&new_dirp, Some(new_ip), new_name)
                };
            }
        }

        if status.is_ok() && !same_node {
            status = if same_pdir {
                // Within one directory the old entry goes first and the
                // insert is best-effort: its failure loses the name but
                // never the node's last link elsewhere.
                let removed = self.dir.remove(&old_dirp, old_name);
                if removed.is_ok() {
                    if let Err(err) = self.dir.insert(&old_dirp, new_name, old_ip.number()) {
                        tracing::warn!(
                            target: "zonix::rename",
                            node = old_ip.number().0,
                            dir = old_dirp.number().0,
                            name = %new_name,
                            error = %err,
                            "rename_reinsert_failed"
                        );
                    }
                }
                removed
            } else {
                // Across directories the new entry goes first; a failed
                // cleanup leaves an extra name, never a dangling one.
                let inserted = self.dir.insert(&new_dirp, new_name, old_ip.number());
                if inserted.is_ok() {
                    if let Err(err) = self.dir.remove(&old_dirp, old_name) {
                        tracing::warn!(
                            target: "zonix::rename",
                            node = old_ip.number().0,
                            dir = old_dirp.number().0,
                            name = %old_name,
                            error = %err,
                            "rename_source_cleanup_failed"
                        );
                    }
                }
                inserted
            };
        }

        // A directory that changed parents points its `..` at the new one.
        if status.is_ok() && !same_node && odir && !same_pdir {
            if let Err(err) = self.unlink_file(&old_ip, None, &Name::dot_dot()) {
                tracing::warn!(
                    target: "zonix::rename",
                    dir = old_ip.number().0,
                    error = %err,
                    "old_dotdot_removal_failed"
                );
            }
            match self.dir.insert(&old_ip, &Name::dot_dot(), new_dirp.number()) {
                Ok(()) => {
                    new_dirp.update(|ino| {
                        ino.link_count += 1;
                        ino.dirty = true;
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        target: "zonix::rename",
                        dir = old_ip.number().0,
                        parent = new_dirp.number().0,
                        error = %err,
                        "new_dotdot_insert_failed"
                    );
                }
            }
        }

        // Renaming a name onto itself clears any two-step protection left
        // on the destination node, even when the rename failed.
        if same_pdir && old_name == new_name {
            if let Some(new_ip) = &new_ip {
                if new_ip.is_armed() {
                    new_ip.update(|ino| {
                        ino.unlink_armed = false;
                        ino.dirty = true;
                    });
                    tracing::debug!(
                        target: "zonix::rename",
                        node = new_ip.number().0,
                        "self_rename_disarmed"
                    );
                }
            }
        }

        if same_node {
            return Ok(());
        }
        if status.is_ok() {
            tracing::debug!(
                target: "zonix::rename",
                node = old_ip.number().0,
                old_dir = old_dirp.number().0,
                new_dir = new_dirp.number().0,
                old = %old_name,
                new = %new_name,
                "renamed"
            );
        }
        status
    }

    /// Refuse to move `old` under one of its own descendants: walk from
    /// `new_dirp` upward via `..` and fail if the walk meets `old`.
    ///
    /// The ascent is iterative and holds at most two handles. Reaching the
    /// filesystem root ends it: either `..` resolves to the directory
    /// itself or the descent reports leaving the filesystem. Any other
    /// resolution failure is treated as the worst case.
    fn assert_not_ancestor(&self, new_dirp: &NodeRef, old: &NodeRef) -> Result<()> {
        let mut cursor = new_dirp.duplicate();
        loop {
            if cursor.same_as(old) {
                return Err(FsError::InvalidArgument);
            }
            match self.dir.descend(&cursor, &Name::dot_dot()) {
                Ok(next) => {
                    if next.same_as(&cursor) {
                        return Ok(());
                    }
                    cursor = next;
                }
                Err(DescendError::LeaveMount) => return Ok(()),
                Err(_) => return Err(FsError::InvalidArgument),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::volume;
    use zonix_store::memory::ROOT;

    fn name(s: &str) -> Name {
        Name::new(s).unwrap()
    }

    #[test]
    fn same_dir_rename_moves_the_entry_only() {
        let (fs, vol) = volume();
        let file = fs.create_file(ROOT, "a", 0).unwrap();
        fs.clear_update_flags(file);

        vol.rename(ROOT, &name("a"), ROOT, &name("b")).unwrap();

        assert_eq!(fs.resolve(ROOT, "a"), None);
        assert_eq!(fs.resolve(ROOT, "b"), Some(file));
        let ino = fs.inode_of(file).unwrap();
        assert_eq!(ino.link_count, 1);
        // The moved node's own metadata is untouched.
        assert!(ino.update.is_empty());
        assert!(!ino.dirty);
    }

    #[test]
    fn rename_onto_itself_is_a_no_op() {
        let (fs, vol) = volume();
        let file = fs.create_file(ROOT, "a", 0).unwrap();
        fs.clear_update_flags(ROOT);

        vol.rename(ROOT, &name("a"), ROOT, &name("a")).unwrap();

        assert_eq!(fs.resolve(ROOT, "a"), Some(file));
        assert_eq!(fs.inode_of(file).unwrap().link_count, 1);
        // Not even the directory was touched.
        assert!(fs.inode_of(ROOT).unwrap().update.is_empty());
    }

    #[test]
    fn hard_link_alias_counts_as_the_same_node() {
        let (fs, vol) = volume();
        let file = fs.create_file(ROOT, "a", 0).unwrap();
        vol.link(zonix_types::Uid(7), file, ROOT, &name("b"))
            .unwrap();

        // Renaming one alias onto the other short-circuits; both stay.
        vol.rename(ROOT, &name("a"), ROOT, &name("b")).unwrap();
        assert_eq!(fs.resolve(ROOT, "a"), Some(file));
        assert_eq!(fs.resolve(ROOT, "b"), Some(file));
        assert_eq!(fs.inode_of(file).unwrap().link_count, 2);
    }

    #[test]
    fn cross_dir_move_keeps_counts_for_files() {
        let (fs, vol) = volume();
        let sub = fs.create_dir(ROOT, "sub").unwrap();
        let file = fs.create_file(ROOT, "a", 0).unwrap();

        vol.rename(ROOT, &name("a"), sub, &name("b")).unwrap();

        assert_eq!(fs.resolve(ROOT, "a"), None);
        assert_eq!(fs.resolve(sub, "b"), Some(file));
        assert_eq!(fs.inode_of(file).unwrap().link_count, 1);
        assert_eq!(fs.inode_of(ROOT).unwrap().link_count, 3);
        assert_eq!(fs.inode_of(sub).unwrap().link_count, 2);
    }

    #[test]
    fn moving_a_directory_rewrites_dot_dot_and_counts() {
        let (fs, vol) = volume();
        let a = fs.create_dir(ROOT, "a").unwrap();
        let b = fs.create_dir(ROOT, "b").unwrap();
        assert_eq!(fs.inode_of(ROOT).unwrap().link_count, 4);

        vol.rename(ROOT, &name("a"), b, &name("a")).unwrap();

        assert_eq!(fs.resolve(ROOT, "a"), None);
        assert_eq!(fs.resolve(b, "a"), Some(a));
        assert_eq!(fs.resolve(a, ".."), Some(b));
        assert_eq!(fs.inode_of(ROOT).unwrap().link_count, 3);
        assert_eq!(fs.inode_of(b).unwrap().link_count, 3);
        assert_eq!(fs.inode_of(a).unwrap().link_count, 2);
    }

    #[test]
    fn directory_cannot_move_into_its_own_subtree() {
        let (fs, vol) = volume();
        let a = fs.create_dir(ROOT, "a").unwrap();
        let b = fs.create_dir(a, "b").unwrap();
        let c = fs.create_dir(b, "c").unwrap();

        assert_eq!(
            vol.rename(ROOT, &name("a"), c, &name("x")),
            Err(FsError::InvalidArgument)
        );
        // Nothing moved anywhere.
        assert_eq!(fs.resolve(ROOT, "a"), Some(a));
        assert_eq!(fs.resolve(c, "x"), None);
        assert_eq!(fs.resolve(a, ".."), Some(ROOT));
    }

    #[test]
    fn moving_between_unrelated_directories_passes_the_walk() {
        let (fs, vol) = volume();
        let a = fs.create_dir(ROOT, "a").unwrap();
        let deep = fs.create_dir(fs.create_dir(ROOT, "x").unwrap(), "y").unwrap();

        vol.rename(ROOT, &name("a"), deep, &name("a")).unwrap();
        assert_eq!(fs.resolve(deep, "a"), Some(a));
    }

    #[test]
    fn replacing_an_existing_file_unlinks_it() {
        let (fs, vol) = volume();
        let keep = fs.create_file(ROOT, "a", 0).unwrap();
        let gone = fs.create_file(ROOT, "b", 0).unwrap();

        vol.rename(ROOT, &name("a"), ROOT, &name("b")).unwrap();

        assert_eq!(fs.resolve(ROOT, "a"), None);
        assert_eq!(fs.resolve(ROOT, "b"), Some(keep));
        assert!(fs.inode_of(gone).is_none());
    }

    #[test]
    fn kind_mismatch_is_rejected_both_ways() {
        let (fs, vol) = volume();
        fs.create_dir(ROOT, "d").unwrap();
        fs.create_file(ROOT, "f", 0).unwrap();

        assert_eq!(
            vol.rename(ROOT, &name("d"), ROOT, &name("f")),
            Err(FsError::NotDirectory)
        );
        assert_eq!(
            vol.rename(ROOT, &name("f"), ROOT, &name("d")),
            Err(FsError::IsDirectory)
        );
    }

    #[test]
    fn replacing_a_non_empty_directory_fails() {
        let (fs, vol) = volume();
        fs.create_dir(ROOT, "a").unwrap();
        let b = fs.create_dir(ROOT, "b").unwrap();
        fs.create_file(b, "x", 0).unwrap();

        assert_eq!(
            vol.rename(ROOT, &name("a"), ROOT, &name("b")),
            Err(FsError::NotEmpty)
        );
    }

    #[test]
    fn dir_move_respects_the_link_ceiling() {
        let (fs, vol) = volume();
        fs.create_dir(ROOT, "a").unwrap();
        let crowded = fs.create_dir(ROOT, "crowded").unwrap();
        fs.set_link_count(crowded, LINK_MAX);

        assert_eq!(
            vol.rename(ROOT, &name("a"), crowded, &name("a")),
            Err(FsError::TooManyLinks)
        );
        // Files are not subject to it.
        fs.set_link_count(crowded, LINK_MAX);
        fs.create_file(ROOT, "f", 0).unwrap();
        vol.rename(ROOT, &name("f"), crowded, &name("f")).unwrap();
    }

    #[test]
    fn dot_names_are_rejected() {
        let (fs, vol) = volume();
        let sub = fs.create_dir(ROOT, "sub").unwrap();

        assert_eq!(
            vol.rename(sub, &name("."), ROOT, &name("x")),
            Err(FsError::InvalidArgument)
        );
        assert_eq!(
            vol.rename(ROOT, &name("sub"), sub, &name(".")),
            Err(FsError::InvalidArgument)
        );
    }

    #[test]
    fn mount_boundaries_translate_per_end() {
        let (fs, vol) = volume();
        let sub = fs.create_dir(ROOT, "sub").unwrap();
        fs.create_file(ROOT, "f", 0).unwrap();
        fs.set_mount_point(sub, true);

        // Source under a mount point.
        assert_eq!(
            vol.rename(ROOT, &name("sub"), ROOT, &name("x")),
            Err(FsError::CrossDevice)
        );
        // Source leaving the filesystem.
        assert_eq!(
            vol.rename(ROOT, &name(".."), ROOT, &name("x")),
            Err(FsError::InvalidArgument)
        );
        // Destination on a mount point.
        assert_eq!(
            vol.rename(ROOT, &name("f"), ROOT, &name("sub")),
            Err(FsError::Busy)
        );
    }

    #[test]
    fn same_dir_commit_tolerates_a_lost_insert() {
        let (fs, vol) = volume();
        let file = fs.create_file(ROOT, "a", 0).unwrap();

        fs.inject_insert_error(FsError::Io);
        vol.rename(ROOT, &name("a"), ROOT, &name("b")).unwrap();

        // The name is gone; the node survives with its link count.
        assert_eq!(fs.resolve(ROOT, "a"), None);
        assert_eq!(fs.resolve(ROOT, "b"), None);
        assert_eq!(fs.inode_of(file).unwrap().link_count, 1);
    }

    #[test]
    fn cross_dir_commit_tolerates_a_surviving_source() {
        let (fs, vol) = volume();
        let sub = fs.create_dir(ROOT, "sub").unwrap();
        let file = fs.create_file(ROOT, "a", 0).unwrap();

        fs.inject_remove_error(FsError::Io);
        vol.rename(ROOT, &name("a"), sub, &name("b")).unwrap();

        // Both names point at the node until the source is cleaned up.
        assert_eq!(fs.resolve(ROOT, "a"), Some(file));
        assert_eq!(fs.resolve(sub, "b"), Some(file));
    }

    #[test]
    fn cross_dir_commit_insert_failure_aborts_cleanly() {
        let (fs, vol) = volume();
        let sub = fs.create_dir(ROOT, "sub").unwrap();
        let file = fs.create_file(ROOT, "a", 0).unwrap();

        fs.inject_insert_error(FsError::Io);
        assert_eq!(vol.rename(ROOT, &name("a"), sub, &name("b")), Err(FsError::Io));
        assert_eq!(fs.resolve(ROOT, "a"), Some(file));
        assert_eq!(fs.resolve(sub, "b"), None);
    }

    #[test]
    fn self_rename_disarms_two_step_protection() {
        let (fs, vol) = volume();
        fs.create_file(ROOT, "B.mode", 0).unwrap();
        let file = fs.create_file(ROOT, "doc", 0).unwrap();
        assert_eq!(vol.unlink(ROOT, &name("doc")), Err(FsError::InProgress));
        assert!(fs.inode_of(file).unwrap().unlink_armed);

        vol.rename(ROOT, &name("doc"), ROOT, &name("doc")).unwrap();
        assert!(!fs.inode_of(file).unwrap().unlink_armed);

        // The next unlink arms again from scratch.
        assert_eq!(vol.unlink(ROOT, &name("doc")), Err(FsError::InProgress));
    }

    #[test]
    fn stale_directory_numbers_are_invalid() {
        let (fs, vol) = volume();
        fs.create_file(ROOT, "a", 0).unwrap();
        assert_eq!(
            vol.rename(InodeNumber(99), &name("a"), ROOT, &name("b")),
            Err(FsError::InvalidArgument)
        );
        assert_eq!(
            vol.rename(ROOT, &name("a"), InodeNumber(99), &name("b")),
            Err(FsError::InvalidArgument)
        );
    }

    #[test]
    fn no_holds_survive_rename_outcomes() {
        let (fs, vol) = volume();
        let a = fs.create_dir(ROOT, "a").unwrap();
        let b = fs.create_dir(a, "b").unwrap();
        let file = fs.create_file(ROOT, "f", 0).unwrap();

        let _ = vol.rename(ROOT, &name("f"), a, &name("f"));
        let _ = vol.rename(ROOT, &name("a"), b, &name("x"));
        let _ = vol.rename(ROOT, &name("missing"), ROOT, &name("y"));

        for node in [ROOT, a, b, file] {
            assert_eq!(fs.live_holds(node), 0);
        }
    }

    #[test]
    fn failed_rename_leaves_directory_times_alone() {
        let (fs, vol) = volume();
        let a = fs.create_dir(ROOT, "a").unwrap();
        let b = fs.create_dir(a, "b").unwrap();
        fs.clear_update_flags(ROOT);
        fs.clear_update_flags(a);
        fs.clear_update_flags(b);

        assert_eq!(
            vol.rename(ROOT, &name("a"), b, &name("x")),
            Err(FsError::InvalidArgument)
        );

        for node in [ROOT, a, b] {
            let ino = fs.inode_of(node).unwrap();
            assert!(ino.update.is_empty());
            assert!(!ino.dirty);
        }
    }
}
