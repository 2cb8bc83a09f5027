use thiserror::Error;
use zonix_error::{FsError, Result};
use zonix_types::{InodeNumber, Name};

use crate::handle::NodeRef;

/// Why a descent stopped without yielding a plain node.
///
/// The mount outcomes carry no handle: implementations release whatever
/// they acquired before returning, so the caller never inherits a hold it
/// did not ask for. Each call site translates the status into its own
/// error, or treats it as a verdict about the name.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DescendError {
    /// No entry with that name.
    #[error("entry not found")]
    NotFound,
    /// The entry is a mount point; resolution continues in the filesystem
    /// mounted on it.
    #[error("descent entered a mounted filesystem")]
    EnterMount,
    /// `..` taken at this filesystem's root; resolution continues in the
    /// parent filesystem.
    #[error("descent left this filesystem")]
    LeaveMount,
    /// Storage failure while reading the directory.
    #[error(transparent)]
    Fs(#[from] FsError),
}

/// Directory entry index.
///
/// Every method takes the directory as a [`NodeRef`] so implementations can
/// reach its identity and refresh its metadata. The two mutators stamp the
/// directory's content and status times on success; the two readers leave
/// its metadata untouched.
pub trait DirIndex: Send + Sync {
    /// Find `name`, returning the entry's inode number.
    fn lookup(&self, dir: &NodeRef, name: &Name) -> Result<InodeNumber>;

    /// Add an entry mapping `name` to `node`.
    ///
    /// Fails with [`FsError::Exists`] if the name is already taken; the
    /// directory is unchanged in that case.
    fn insert(&self, dir: &NodeRef, name: &Name, node: InodeNumber) -> Result<()>;

    /// Delete the entry `name`.
    ///
    /// Fails with [`FsError::NotFound`] if there is no such entry.
    fn remove(&self, dir: &NodeRef, name: &Name) -> Result<()>;

    /// Whether the directory holds nothing besides `.` and `..`.
    fn is_empty(&self, dir: &NodeRef) -> Result<bool>;

    /// Resolve `name` within `dir` to a held node, stopping at mount
    /// boundaries.
    fn descend(&self, dir: &NodeRef, name: &Name) -> std::result::Result<NodeRef, DescendError>;
}
