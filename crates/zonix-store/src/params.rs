use zonix_types::{DeviceId, InodeNumber, ZoneGeometry};

/// Mounted-volume parameters, fixed at mount time.
#[derive(Debug, Clone, Copy)]
pub struct SuperParams {
    /// Device this volume lives on.
    pub device: DeviceId,
    /// Block and zone sizing.
    pub geometry: ZoneGeometry,
    /// Largest byte size any file on this volume may reach.
    pub max_file_size: u64,
    /// Volume is mounted read-only.
    pub read_only: bool,
    /// Inode number of the volume root.
    pub root: InodeNumber,
}
