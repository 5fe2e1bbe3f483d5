use crate::{ChunkKey, TreeKey, WorldDescriptor};

use voxel_stream_core::prelude::*;

/// Calculates tree and chunk locations across levels of detail.
///
/// Voxel coordinates at level `L` are LOD0 coordinates shifted right by `L`. A tree covers the same LOD0 volume at every
/// level, so the coarsest level holds a single chunk per tree and each finer level doubles the number of chunks per axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LodIndexer {
    chunk_size: i32,
    chunk_size_log2: i32,
    n_lod: u8,
}

impl LodIndexer {
    #[inline]
    pub fn new(descriptor: WorldDescriptor) -> Self {
        debug_assert!(descriptor.chunk_size > 0 && descriptor.chunk_size.count_ones() == 1);
        debug_assert!(descriptor.n_lod > 0);

        Self {
            chunk_size: descriptor.chunk_size,
            chunk_size_log2: descriptor.chunk_size.trailing_zeros() as i32,
            n_lod: descriptor.n_lod,
        }
    }

    #[inline]
    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    #[inline]
    pub fn n_lod(&self) -> u8 {
        self.n_lod
    }

    /// The constant shape of a chunk. The same for all chunks at all levels.
    #[inline]
    pub fn chunk_shape(&self) -> Point3i {
        Point3i::fill(self.chunk_size)
    }

    #[inline]
    pub fn chunk_volume(&self) -> usize {
        self.chunk_shape().volume() as usize
    }

    /// log2 of the number of chunks along one axis of a tree at `level`.
    #[inline]
    fn chunks_per_tree_log2(&self, level: u8) -> i32 {
        (self.n_lod - 1 - level) as i32
    }

    /// Number of chunks along one axis of a tree at `level`.
    #[inline]
    pub fn chunks_per_tree_axis(&self, level: u8) -> i32 {
        1 << self.chunks_per_tree_log2(level)
    }

    #[inline]
    fn tree_size_log2(&self, level: u8) -> i32 {
        self.chunk_size_log2 + self.chunks_per_tree_log2(level)
    }

    /// The side length of a tree at `level`, in level voxels.
    #[inline]
    pub fn tree_size(&self, level: u8) -> i32 {
        1 << self.tree_size_log2(level)
    }

    /// The key of the tree that contains `point`, given in voxel coordinates of `level`.
    #[inline]
    pub fn tree_containing(&self, level: u8, point: Point3i) -> TreeKey {
        TreeKey::new((point >> self.tree_size_log2(level)) << self.tree_size_log2(0))
    }

    /// The key of the tree that owns the chunk at `key`.
    #[inline]
    pub fn tree_of_chunk(&self, key: ChunkKey) -> TreeKey {
        self.tree_containing(key.lod, key.minimum)
    }

    /// The extent spanned by `tree` in voxel coordinates of `level`.
    #[inline]
    pub fn tree_extent(&self, tree: TreeKey, level: u8) -> Extent3i {
        Extent3i::from_min_and_shape(
            tree.origin >> level as i32,
            Point3i::fill(self.tree_size(level)),
        )
    }

    /// Returns an iterator over the keys of all trees overlapping `extent`, given in voxel coordinates of `level`.
    #[inline]
    pub fn trees_for_extent(
        &self,
        level: u8,
        extent: &Extent3i,
    ) -> impl Iterator<Item = TreeKey> {
        let level_log2 = self.tree_size_log2(level);
        let lod0_log2 = self.tree_size_log2(0);

        extent
            .downsample(level_log2)
            .iter_points()
            .map(move |p| TreeKey::new(p << lod0_log2))
    }

    /// Returns an iterator over the keys of all chunks at `level` overlapping `extent`.
    #[inline]
    pub fn chunks_for_extent(
        &self,
        level: u8,
        extent: &Extent3i,
    ) -> impl Iterator<Item = ChunkKey> {
        let shape_log2 = self.chunk_size_log2;

        extent
            .downsample(shape_log2)
            .iter_points()
            .map(move |p| ChunkKey::new(level, p << shape_log2))
    }

    /// The extent spanned by the chunk at `key`, in voxel coordinates of its level.
    #[inline]
    pub fn chunk_extent(&self, key: ChunkKey) -> Extent3i {
        Extent3i::from_min_and_shape(key.minimum, self.chunk_shape())
    }

    /// Returns `true` iff `key` is aligned to the chunk grid and its level exists.
    #[inline]
    pub fn chunk_key_is_valid(&self, key: ChunkKey) -> bool {
        key.lod < self.n_lod && key.minimum.round_down_to_multiple(self.chunk_size) == key.minimum
    }

    /// Returns `true` iff `tree` sits on the tree grid.
    #[inline]
    pub fn tree_key_is_valid(&self, tree: TreeKey) -> bool {
        tree.origin.round_down_to_multiple(self.tree_size(0)) == tree.origin
    }

    /// The position of the chunk at `key` within its tree, in units of chunks.
    #[inline]
    pub fn chunk_offset_in_tree(&self, key: ChunkKey) -> Point3i {
        let tree = self.tree_of_chunk(key);

        (key.minimum - self.tree_extent(tree, key.lod).minimum) >> self.chunk_size_log2
    }

    /// The key of the chunk at `offset` (in units of chunks) within `tree` at `level`.
    #[inline]
    pub fn chunk_in_tree(&self, tree: TreeKey, level: u8, offset: Point3i) -> ChunkKey {
        ChunkKey::new(
            level,
            self.tree_extent(tree, level).minimum + (offset << self.chunk_size_log2),
        )
    }

    /// Converts an extent in voxel coordinates of `level` into the extent it covers at LOD0.
    #[inline]
    pub fn extent_to_lod0(&self, level: u8, extent: &Extent3i) -> Extent3i {
        Extent3i::from_min_and_shape(extent.minimum << level as i32, extent.shape << level as i32)
    }

    /// Converts an LOD0 extent into the extent covering the same voxels at `level`.
    #[inline]
    pub fn extent_from_lod0(&self, level: u8, extent: &Extent3i) -> Extent3i {
        extent.downsample(level as i32)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
