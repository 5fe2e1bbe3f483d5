use crate::StoreResult;

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// The file name of the descriptor, stored at the root of every world directory.
pub const DESCRIPTOR_FILE_NAME: &str = "vworld.bin";

/// The dimensions a world was created with. These are fixed for the lifetime of the world directory; a peer that reports
/// different values forces a reset.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct WorldDescriptor {
    /// Side length of every chunk, in voxels. Always a power of two.
    pub chunk_size: i32,
    /// Number of levels of detail. Level `n_lod - 1` is the coarsest.
    pub n_lod: u8,
}

impl WorldDescriptor {
    pub fn new(chunk_size: i32, n_lod: u8) -> Self {
        Self { chunk_size, n_lod }
    }

    /// Number of voxels in one chunk.
    pub fn chunk_volume(&self) -> usize {
        (self.chunk_size as usize).pow(3)
    }

    /// Reads the descriptor stored in `dir`, if there is one.
    pub fn read_from_dir(dir: &Path) -> StoreResult<Option<Self>> {
        match fs::read(dir.join(DESCRIPTOR_FILE_NAME)) {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_to_dir(&self, dir: &Path) -> StoreResult<()> {
        fs::create_dir_all(dir)?;
        fs::write(dir.join(DESCRIPTOR_FILE_NAME), bincode::serialize(self)?)?;

        Ok(())
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
