//! Shared fixtures for the engine's unit tests: a [`MemFs`]-backed volume
//! and handle plumbing.

use std::sync::Arc;
use zonix_store::memory::MemFs;
use zonix_store::{DirIndex, NodeCache, NodeRef, SuperParams, ZoneMap};
use zonix_types::{BlockSize, DeviceId, InodeNumber, ZoneGeometry};

use crate::Volume;

/// 1 KiB blocks, 4 KiB zones.
pub fn geometry() -> ZoneGeometry {
    ZoneGeometry::new(BlockSize::new(1024).unwrap(), 2).unwrap()
}

/// Fresh store and a volume mounted on it.
pub fn volume() -> (Arc<MemFs>, Volume) {
    volume_with(|params| params)
}

/// Same, with the mount parameters adjusted (read-only, max file size).
pub fn volume_with(adjust: impl FnOnce(SuperParams) -> SuperParams) -> (Arc<MemFs>, Volume) {
    let fs = MemFs::new(DeviceId(1), geometry());
    let vol = Volume::new(
        adjust(fs.params()),
        fs.clone() as Arc<dyn NodeCache>,
        fs.clone() as Arc<dyn DirIndex>,
        fs.clone() as Arc<dyn ZoneMap>,
    );
    (fs, vol)
}

/// Direct handle on `number`, for poking at nodes around an operation.
pub fn handle(fs: &Arc<MemFs>, vol: &Volume, number: InodeNumber) -> NodeRef {
    fs.acquire(vol.key(number)).expect("node exists")
}
