//! Per-directory deletion policy selection.
//!
//! A directory opts into a deletion discipline by containing a marker
//! file. Markers are probed in a fixed priority order and only count when
//! they resolve to a regular file; a directory or special node wearing a
//! marker name is ignored, as is any probe that fails to resolve. The scan
//! itself never errors.

use zonix_store::NodeRef;
use zonix_types::Name;

use crate::Volume;

/// Deletion discipline a directory imposes on the regular files inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeletePolicy {
    /// No marker: deletes proceed normally.
    Unrestricted,
    /// `A.mode`: deletes are refused outright.
    Deny,
    /// `B.mode`: the first delete request arms the target and fails; the
    /// second disarms it and goes through.
    TwoStep,
    /// `C.mode`: the entry is renamed aside under a `.bak` suffix instead
    /// of being deleted.
    Backup,
}

/// Marker names, probed in this order; the first hit wins.
const MARKERS: [(&str, DeletePolicy); 3] = [
    ("A.mode", DeletePolicy::Deny),
    ("B.mode", DeletePolicy::TwoStep),
    ("C.mode", DeletePolicy::Backup),
];

/// Suffix the backup policy appends to the surviving name.
pub(crate) const BACKUP_SUFFIX: &str = ".bak";

/// Marker files are themselves always deletable by the plain path.
pub(crate) fn is_marker(name: &Name) -> bool {
    MARKERS
        .iter()
        .any(|(marker, _)| name.as_bytes() == marker.as_bytes())
}

impl Volume {
    /// The deletion policy `dirp` imposes right now.
    pub(crate) fn current_policy(&self, dirp: &NodeRef) -> DeletePolicy {
        for (marker, policy) in MARKERS {
            let Ok(name) = Name::new(marker) else {
                continue;
            };
            let Ok(number) = self.dir.lookup(dirp, &name) else {
                continue;
            };
            let Some(node) = self.cache.acquire(self.key(number)) else {
                continue;
            };
            if node.kind().is_regular() {
                tracing::debug!(
                    target: "zonix::policy",
                    dir = dirp.number().0,
                    marker,
                    "policy_marker_active"
                );
                return policy;
            }
        }
        DeletePolicy::Unrestricted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{handle, volume};
    use zonix_error::FsError;
    use zonix_store::memory::ROOT;
    use zonix_types::FileKind;

    #[test]
    fn no_marker_means_unrestricted() {
        let (fs, vol) = volume();
        let root = handle(&fs, &vol, ROOT);
        assert_eq!(vol.current_policy(&root), DeletePolicy::Unrestricted);
    }

    #[test]
    fn first_marker_in_priority_order_wins() {
        let (fs, vol) = volume();
        fs.create_file(ROOT, "C.mode", 0).unwrap();
        fs.create_file(ROOT, "B.mode", 0).unwrap();
        let root = handle(&fs, &vol, ROOT);
        assert_eq!(vol.current_policy(&root), DeletePolicy::TwoStep);

        fs.create_file(ROOT, "A.mode", 0).unwrap();
        assert_eq!(vol.current_policy(&root), DeletePolicy::Deny);
    }

    #[test]
    fn non_regular_markers_are_skipped() {
        let (fs, vol) = volume();
        fs.create_dir(ROOT, "A.mode").unwrap();
        fs.create_special(ROOT, "B.mode", FileKind::Fifo).unwrap();
        fs.create_file(ROOT, "C.mode", 0).unwrap();
        let root = handle(&fs, &vol, ROOT);
        assert_eq!(vol.current_policy(&root), DeletePolicy::Backup);
    }

    #[test]
    fn failed_probe_is_skipped_not_fatal() {
        let (fs, vol) = volume();
        fs.create_file(ROOT, "A.mode", 0).unwrap();
        fs.create_file(ROOT, "B.mode", 0).unwrap();
        let root = handle(&fs, &vol, ROOT);

        // The A probe eats the injected failure; B still decides.
        fs.inject_lookup_error(FsError::Io);
        assert_eq!(vol.current_policy(&root), DeletePolicy::TwoStep);
    }

    #[test]
    fn marker_names_are_recognized() {
        assert!(is_marker(&Name::new("A.mode").unwrap()));
        assert!(is_marker(&Name::new("B.mode").unwrap()));
        assert!(is_marker(&Name::new("C.mode").unwrap()));
        assert!(!is_marker(&Name::new("a.mode").unwrap()));
        assert!(!is_marker(&Name::new("A.mode.bak").unwrap()));
    }
}
