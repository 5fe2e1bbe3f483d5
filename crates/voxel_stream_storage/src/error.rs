use crate::TreeKey;

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("voxel world I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("world descriptor could not be encoded or decoded: {0}")]
    Descriptor(#[from] bincode::Error),
    #[error("tree layout has {actual} bytes, expected {expected}")]
    LayoutLength { expected: usize, actual: usize },
    #[error("invalid node status byte {0}")]
    InvalidNodeStatus(u8),
    #[error("chunk payload has {actual} bytes, expected {expected}")]
    ChunkLength { expected: usize, actual: usize },
    #[error("region payload has {actual} bytes, expected {expected}")]
    RegionLength { expected: usize, actual: usize },
    #[error("level {level} is out of range for a world with {n_lod} levels")]
    LevelOutOfRange { level: u8, n_lod: u8 },
    #[error("tree at {:?} has no layout loaded", .0.origin)]
    TreeNotLoaded(TreeKey),
}
