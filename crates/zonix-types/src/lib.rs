#![forbid(unsafe_code)]
//! Core value types for Zonix.
//!
//! Everything here is a plain value: identifiers, validated geometry, the
//! bounded directory-entry name, and the small flag sets carried on inode
//! metadata. No I/O, no interior mutability. Validation failures use small
//! local error types (`NameError`, `GeometryError`) that higher layers
//! convert into the user-facing error enum at their crate boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum length of a directory-entry name, in bytes.
pub const NAME_MAX: usize = 60;

/// Maximum number of directory entries that may reference one inode.
pub const LINK_MAX: u16 = 32_767;

// ── identifiers ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeNumber(pub u32);

/// Stable identifier for one filesystem instance's backing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u64);

/// Zone index within one file's mapping (zone 0 holds byte 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ZoneNumber(pub u64);

/// Caller identity, as far as this engine cares: root or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Uid(pub u32);

impl Uid {
    pub const ROOT: Uid = Uid(0);

    #[must_use]
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

// ── file kinds ───────────────────────────────────────────────────────────

/// Inode type. Many operations are gated on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    CharDevice,
    BlockDevice,
    Fifo,
    Socket,
}

impl FileKind {
    #[must_use]
    pub fn is_regular(self) -> bool {
        matches!(self, FileKind::Regular)
    }

    #[must_use]
    pub fn is_dir(self) -> bool {
        matches!(self, FileKind::Directory)
    }

    #[must_use]
    pub fn is_symlink(self) -> bool {
        matches!(self, FileKind::Symlink)
    }

    /// Char and block device nodes; these cannot be truncated.
    #[must_use]
    pub fn is_device(self) -> bool {
        matches!(self, FileKind::CharDevice | FileKind::BlockDevice)
    }
}

// ── metadata update flags ────────────────────────────────────────────────

/// Which timestamp fields of an inode need persisting.
///
/// The engine only ever *sets* these; the cache/flush layer reads the clock
/// and clears them when it writes the inode out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeFlags(u8);

impl TimeFlags {
    pub const NONE: TimeFlags = TimeFlags(0);
    pub const ATIME: TimeFlags = TimeFlags(1);
    pub const CTIME: TimeFlags = TimeFlags(2);
    pub const MTIME: TimeFlags = TimeFlags(4);

    #[must_use]
    pub const fn empty() -> Self {
        Self::NONE
    }

    #[must_use]
    pub fn contains(self, other: TimeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for TimeFlags {
    type Output = TimeFlags;

    fn bitor(self, rhs: TimeFlags) -> TimeFlags {
        TimeFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for TimeFlags {
    fn bitor_assign(&mut self, rhs: TimeFlags) {
        self.0 |= rhs.0;
    }
}

// ── geometry ─────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("invalid geometry: {field} ({reason})")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
}

/// Validated block size (power of two in 1024..=65536).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockSize(u32);

impl BlockSize {
    pub fn new(value: u32) -> Result<Self, GeometryError> {
        if !value.is_power_of_two() || !(1024..=65536).contains(&value) {
            return Err(GeometryError::InvalidField {
                field: "block_size",
                reason: "must be power of two in 1024..=65536",
            });
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }

    /// Bits to shift to convert between bytes and blocks.
    #[must_use]
    pub fn shift(self) -> u32 {
        self.0.trailing_zeros()
    }
}

/// Zone/block geometry of one filesystem instance.
///
/// A zone is `block_size << log_zone_size` bytes: a power-of-two multiple of
/// the block size, and the unit in which file storage is allocated and
/// freed. All range arithmetic in the engine goes through these helpers so
/// whole-zone loops can run in zone-index units (byte scaling overflows
/// first on large files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneGeometry {
    block_size: BlockSize,
    log_zone_size: u8,
}

/// Largest supported `log_zone_size`; zones above `block_size << 8` buy
/// nothing and risk shift overflow in 32-bit byte math elsewhere.
pub const MAX_LOG_ZONE_SIZE: u8 = 8;

impl ZoneGeometry {
    pub fn new(block_size: BlockSize, log_zone_size: u8) -> Result<Self, GeometryError> {
        if log_zone_size > MAX_LOG_ZONE_SIZE {
            return Err(GeometryError::InvalidField {
                field: "log_zone_size",
                reason: "must be at most 8",
            });
        }
        Ok(Self {
            block_size,
            log_zone_size,
        })
    }

    #[must_use]
    pub fn block_size(self) -> u32 {
        self.block_size.get()
    }

    #[must_use]
    pub fn log_zone_size(self) -> u8 {
        self.log_zone_size
    }

    /// Zone size in bytes.
    #[must_use]
    pub fn zone_size(self) -> u64 {
        u64::from(self.block_size.get()) << self.log_zone_size
    }

    /// Zone index containing byte `pos` (truncating).
    #[must_use]
    pub fn zone_floor(self, pos: u64) -> ZoneNumber {
        ZoneNumber(pos / self.zone_size())
    }

    /// Index of the first zone starting at or after byte `pos`.
    #[must_use]
    pub fn zone_ceil(self, pos: u64) -> ZoneNumber {
        let zs = self.zone_size();
        ZoneNumber(pos / zs + u64::from(pos % zs != 0))
    }

    /// First byte of zone `zone`, or `None` if that overflows.
    #[must_use]
    pub fn zone_start(self, zone: ZoneNumber) -> Option<u64> {
        zone.0.checked_mul(self.zone_size())
    }

    /// Byte offset of `pos` within its zone.
    #[must_use]
    pub fn offset_in_zone(self, pos: u64) -> u64 {
        pos % self.zone_size()
    }

    /// First byte of the block containing `pos`.
    #[must_use]
    pub fn block_floor(self, pos: u64) -> u64 {
        pos - pos % u64::from(self.block_size.get())
    }

    /// Byte offset of `pos` within its block.
    #[must_use]
    pub fn offset_in_block(self, pos: u64) -> usize {
        (pos % u64::from(self.block_size.get())) as usize
    }
}

// ── bounded names ────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("name is empty")]
    Empty,
    #[error("name is {len} bytes; the limit is {NAME_MAX}")]
    TooLong { len: usize },
    #[error("name contains {what}")]
    IllegalByte { what: &'static str },
}

/// A directory-entry name: 1..=[`NAME_MAX`] bytes, no `/`, no NUL.
///
/// Stored inline so names can be built and compared without allocating,
/// the same way directory blocks carry them. Equality, ordering, and
/// hashing look only at the populated prefix.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    len: u8,
    bytes: [u8; NAME_MAX],
}

impl Name {
    pub fn new(s: &str) -> Result<Self, NameError> {
        let raw = s.as_bytes();
        if raw.is_empty() {
            return Err(NameError::Empty);
        }
        if raw.len() > NAME_MAX {
            return Err(NameError::TooLong { len: raw.len() });
        }
        if raw.contains(&b'/') {
            return Err(NameError::IllegalByte { what: "'/'" });
        }
        if raw.contains(&0) {
            return Err(NameError::IllegalByte { what: "NUL" });
        }
        let mut bytes = [0_u8; NAME_MAX];
        bytes[..raw.len()].copy_from_slice(raw);
        Ok(Self {
            len: raw.len() as u8,
            bytes,
        })
    }

    /// The reserved self-entry name `.`.
    #[must_use]
    pub fn dot() -> Self {
        let mut bytes = [0_u8; NAME_MAX];
        bytes[0] = b'.';
        Self { len: 1, bytes }
    }

    /// The reserved parent-entry name `..`.
    #[must_use]
    pub fn dot_dot() -> Self {
        let mut bytes = [0_u8; NAME_MAX];
        bytes[0] = b'.';
        bytes[1] = b'.';
        Self { len: 2, bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn is_dot(&self) -> bool {
        self.as_bytes() == b"."
    }

    #[must_use]
    pub fn is_dot_dot(&self) -> bool {
        self.as_bytes() == b".."
    }

    /// `.` and `..` must never be treated as ordinary names.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.is_dot() || self.is_dot_dot()
    }

    #[must_use]
    pub fn ends_with(&self, suffix: &str) -> bool {
        self.as_bytes().ends_with(suffix.as_bytes())
    }

    /// Append `suffix`, failing if the result would not fit [`NAME_MAX`].
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, NameError> {
        let total = self.len() + suffix.len();
        if total > NAME_MAX {
            return Err(NameError::TooLong { len: total });
        }
        let mut bytes = [0_u8; NAME_MAX];
        bytes[..self.len()].copy_from_slice(self.as_bytes());
        bytes[self.len()..total].copy_from_slice(suffix.as_bytes());
        Ok(Self {
            len: total as u8,
            bytes,
        })
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Name {}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl TryFrom<&str> for Name {
    type Error = NameError;

    fn try_from(s: &str) -> Result<Self, NameError> {
        Name::new(s)
    }
}

impl TryFrom<String> for Name {
    type Error = NameError;

    fn try_from(s: String) -> Result<Self, NameError> {
        Name::new(&s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> String {
        String::from_utf8_lossy(name.as_bytes()).into_owned()
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.as_bytes()))
    }
}

// ── display impls ────────────────────────────────────────────────────────

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev{}", self.0)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ZoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid{}", self.0)
    }
}
