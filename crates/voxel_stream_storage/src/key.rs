use voxel_stream_core::prelude::*;

use serde::{Deserialize, Serialize};

/// The key for a tree, the coarsest spatial partition of the world.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TreeKey {
    /// The tree's minimum in LOD0 voxel coordinates. Always a multiple of the LOD0 tree size.
    pub origin: Point3i,
}

impl TreeKey {
    pub fn new(origin: Point3i) -> Self {
        Self { origin }
    }
}

/// The key for a single chunk (octree node) of a tree.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ChunkKey {
    /// The level of detail. From highest resolution at 0 to lowest resolution at `n_lod - 1`.
    pub lod: u8,
    /// The minimum point of the chunk, in the voxel coordinates of level `lod`.
    pub minimum: Point3i,
}

impl ChunkKey {
    pub fn new(lod: u8, chunk_minimum: Point3i) -> Self {
        Self {
            lod,
            minimum: chunk_minimum,
        }
    }
}
