#![forbid(unsafe_code)]
//! Error types for Zonix.
//!
//! # Error Taxonomy
//!
//! Zonix uses a two-layer error model:
//!
//! | Layer | Type | Crate | Purpose |
//! |-------|------|-------|---------|
//! | Validation | `NameError`, `GeometryError` | `zonix-types` | Rejected values detected while constructing names and geometry |
//! | Runtime | `FsError` (this crate) | `zonix-error` | The one error kind every engine operation returns |
//!
//! Validation errors convert into `FsError` at the crate boundary
//! ([`FsError::from`] for `NameError`); the types crate stays independent of
//! this one.
//!
//! # errno Mapping
//!
//! Every `FsError` variant maps to exactly one POSIX errno via
//! [`FsError::to_errno`]. The match is exhaustive (no wildcard arm), so
//! adding a variant is a compile error until its errno is assigned.
//!
//! | Variant | errno | Produced by |
//! |---------|-------|-------------|
//! | `NotFound` | `ENOENT` | missing entries; directories whose link count hit zero |
//! | `Exists` | `EEXIST` | link onto an existing name; taken backup name |
//! | `NotPermitted` | `EPERM` | deny policy; unlinking a directory; non-root directory link |
//! | `AccessDenied` | `EACCES` | readlink on a non-symlink |
//! | `IsDirectory` | `EISDIR` | non-directory renamed onto a directory |
//! | `NotDirectory` | `ENOTDIR` | rmdir of a non-directory; directory renamed onto a non-directory |
//! | `NotEmpty` | `ENOTEMPTY` | rmdir / rename-over of a non-empty directory |
//! | `TooManyLinks` | `EMLINK` | link-count ceiling reached |
//! | `FileTooLarge` | `EFBIG` | truncate beyond the configured maximum |
//! | `NameTooLong` | `ENAMETOOLONG` | backup suffix would not fit |
//! | `ReadOnly` | `EROFS` | mutation on a read-only filesystem |
//! | `CrossDevice` | `EXDEV` | rename source resolves into a mounted filesystem |
//! | `InvalidArgument` | `EINVAL` | reserved-name misuse; directory cycle; empty punch range |
//! | `Busy` | `EBUSY` | root or mount-point protections |
//! | `InProgress` | `EINPROGRESS` | first unlink under the two-step policy |
//! | `Io` | `EIO` | unmappable link block; collaborator storage failure |

use thiserror::Error;
use zonix_types::NameError;

/// Unified error type for all Zonix engine operations.
///
/// Deliberately carries kind, not representation: callers dispatch on the
/// variant or on [`FsError::to_errno`], never on message text.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("no such entry")]
    NotFound,

    #[error("entry already exists")]
    Exists,

    #[error("operation not permitted")]
    NotPermitted,

    #[error("access denied")]
    AccessDenied,

    #[error("is a directory")]
    IsDirectory,

    #[error("not a directory")]
    NotDirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("too many links")]
    TooManyLinks,

    #[error("file too large")]
    FileTooLarge,

    #[error("name too long")]
    NameTooLong,

    #[error("read-only filesystem")]
    ReadOnly,

    #[error("cross-device link")]
    CrossDevice,

    #[error("invalid argument")]
    InvalidArgument,

    #[error("resource busy")]
    Busy,

    /// First unlink under the two-step deletion policy: protection is now
    /// armed and the entry was deliberately left in place.
    #[error("operation now in progress")]
    InProgress,

    #[error("I/O failure")]
    Io,
}

impl FsError {
    /// POSIX errno for this error, for callers speaking the VFS protocol.
    #[must_use]
    pub fn to_errno(&self) -> libc::c_int {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Exists => libc::EEXIST,
            FsError::NotPermitted => libc::EPERM,
            FsError::AccessDenied => libc::EACCES,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::TooManyLinks => libc::EMLINK,
            FsError::FileTooLarge => libc::EFBIG,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::ReadOnly => libc::EROFS,
            FsError::CrossDevice => libc::EXDEV,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::Busy => libc::EBUSY,
            FsError::InProgress => libc::EINPROGRESS,
            FsError::Io => libc::EIO,
        }
    }

    /// Stable lowercase tag for reports and fixtures.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            FsError::NotFound => "not_found",
            FsError::Exists => "exists",
            FsError::NotPermitted => "not_permitted",
            FsError::AccessDenied => "access_denied",
            FsError::IsDirectory => "is_directory",
            FsError::NotDirectory => "not_directory",
            FsError::NotEmpty => "not_empty",
            FsError::TooManyLinks => "too_many_links",
            FsError::FileTooLarge => "file_too_large",
            FsError::NameTooLong => "name_too_long",
            FsError::ReadOnly => "read_only",
            FsError::CrossDevice => "cross_device",
            FsError::InvalidArgument => "invalid_argument",
            FsError::Busy => "busy",
            FsError::InProgress => "in_progress",
            FsError::Io => "io",
        }
    }

    /// All variants, for coverage-style assertions in tests and tooling.
    #[must_use]
    pub fn all() -> &'static [FsError] {
        &[
            FsError::NotFound,
            FsError::Exists,
            FsError::NotPermitted,
            FsError::AccessDenied,
            FsError::IsDirectory,
            FsError::NotDirectory,
            FsError::NotEmpty,
            FsError::TooManyLinks,
            FsError::FileTooLarge,
            FsError::NameTooLong,
            FsError::ReadOnly,
            FsError::CrossDevice,
            FsError::InvalidArgument,
            FsError::Busy,
            FsError::InProgress,
            FsError::Io,
        ]
    }
}

impl From<NameError> for FsError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::TooLong { .. } => FsError::NameTooLong,
            NameError::Empty | NameError::IllegalByte { .. } => FsError::InvalidArgument,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn errno_values_match_posix() {
        assert_eq!(FsError::NotFound.to_errno(), 2);
        assert_eq!(FsError::NotPermitted.to_errno(), 1);
        assert_eq!(FsError::AccessDenied.to_errno(), 13);
        assert_eq!(FsError::Exists.to_errno(), 17);
        assert_eq!(FsError::NotDirectory.to_errno(), 20);
        assert_eq!(FsError::IsDirectory.to_errno(), 21);
        assert_eq!(FsError::InvalidArgument.to_errno(), 22);
        assert_eq!(FsError::Busy.to_errno(), 16);
        assert_eq!(FsError::ReadOnly.to_errno(), 30);
        assert_eq!(FsError::Io.to_errno(), 5);
    }

    #[test]
    fn every_variant_has_a_distinct_errno() {
        let codes: BTreeSet<i32> = FsError::all().iter().map(FsError::to_errno).collect();
        assert_eq!(codes.len(), FsError::all().len());
    }

    #[test]
    fn every_variant_has_a_distinct_tag() {
        let tags: BTreeSet<&str> = FsError::all().iter().map(FsError::tag).collect();
        assert_eq!(tags.len(), FsError::all().len());
    }

    #[test]
    fn name_errors_convert_at_the_boundary() {
        assert_eq!(
            FsError::from(NameError::TooLong { len: 64 }),
            FsError::NameTooLong
        );
        assert_eq!(FsError::from(NameError::Empty), FsError::InvalidArgument);
        assert_eq!(
            FsError::from(NameError::IllegalByte { what: "'/'" }),
            FsError::InvalidArgument
        );
    }

    #[test]
    fn display_is_short_and_stable() {
        assert_eq!(FsError::NotEmpty.to_string(), "directory not empty");
        assert_eq!(FsError::InProgress.to_string(), "operation now in progress");
    }
}
