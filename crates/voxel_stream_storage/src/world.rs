use crate::{
    ChunkKey, LodIndexer, NodeStatus, SmallKeyHashMap, SmallKeyLruCache, StoreError, StoreResult,
    TreeKey, TreeLayout, WorldDescriptor,
};

use voxel_stream_core::prelude::*;

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// A SHA-256 digest of a chunk file.
pub type Checksum = [u8; 32];

pub fn checksum(bytes: &[u8]) -> Checksum {
    let digest = Sha256::digest(bytes);
    let mut hash = [0; 32];
    hash.copy_from_slice(&digest);

    hash
}

/// How `VoxelWorld::open` found the world directory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenOutcome {
    /// There was no world here, so an empty one was created.
    Created,
    /// The stored world has the requested dimensions.
    Loaded,
    /// The stored world had different (or unreadable) dimensions and was wiped.
    Reset,
}

/// The local copy of a streamed voxel world.
///
/// The world is a set of trees. A tree's layout (the status of each of its nodes on every level) arrives as one payload and
/// is persisted at `trees/{x}_{y}_{z}.oct`. Nodes whose voxels are not uniform keep their voxels in a chunk file at
/// `lod{L}/{x}_{y}_{z}.chunk`, holding `chunk_size^3` raw bytes in row-major order. Recently read chunk files stay in memory
/// until `update_cache` trims them.
///
/// Regions are always addressed at one level of detail, in that level's voxel coordinates.
pub struct VoxelWorld {
    root: PathBuf,
    descriptor: WorldDescriptor,
    indexer: LodIndexer,
    trees: SmallKeyHashMap<TreeKey, Option<TreeLayout>>,
    chunks: SmallKeyLruCache<ChunkKey, Vec<u8>>,
    max_cached_chunks: usize,
    updated_regions: VecDeque<(u8, Extent3i)>,
}

impl VoxelWorld {
    /// Opens the world stored under `root`, creating it if necessary. If the stored dimensions disagree with `descriptor`,
    /// everything under `root` is deleted first.
    pub fn open(
        root: impl Into<PathBuf>,
        descriptor: WorldDescriptor,
        max_cached_chunks: usize,
    ) -> StoreResult<(Self, OpenOutcome)> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let outcome = match WorldDescriptor::read_from_dir(&root) {
            Ok(Some(stored)) if stored == descriptor => OpenOutcome::Loaded,
            Ok(Some(stored)) => {
                warn!(
                    ?stored,
                    reported = ?descriptor,
                    "world dimensions changed; deleting all local terrain under {}",
                    root.display()
                );
                wipe_dir(&root)?;
                OpenOutcome::Reset
            }
            Ok(None) => OpenOutcome::Created,
            Err(StoreError::Descriptor(e)) => {
                warn!(
                    "unreadable world descriptor ({}); deleting all local terrain under {}",
                    e,
                    root.display()
                );
                wipe_dir(&root)?;
                OpenOutcome::Reset
            }
            Err(e) => return Err(e),
        };
        if outcome != OpenOutcome::Loaded {
            descriptor.write_to_dir(&root)?;
        }
        info!(?outcome, ?descriptor, "opened voxel world at {}", root.display());

        let world = Self {
            root,
            descriptor,
            indexer: LodIndexer::new(descriptor),
            trees: SmallKeyHashMap::default(),
            chunks: SmallKeyLruCache::default(),
            max_cached_chunks,
            updated_regions: VecDeque::new(),
        };

        Ok((world, outcome))
    }

    /// Deletes all terrain, in memory and on disk, and starts over with `descriptor`.
    pub fn reset(&mut self, descriptor: WorldDescriptor) -> StoreResult<()> {
        self.trees.clear();
        self.chunks.clear();
        self.updated_regions.clear();
        wipe_dir(&self.root)?;
        descriptor.write_to_dir(&self.root)?;
        self.descriptor = descriptor;
        self.indexer = LodIndexer::new(descriptor);

        Ok(())
    }

    /// Deletes all terrain, keeping the current dimensions.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.reset(self.descriptor)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn descriptor(&self) -> WorldDescriptor {
        self.descriptor
    }

    pub fn indexer(&self) -> &LodIndexer {
        &self.indexer
    }

    pub fn n_lod(&self) -> u8 {
        self.descriptor.n_lod
    }

    fn check_level(&self, level: u8) -> StoreResult<()> {
        if level < self.descriptor.n_lod {
            Ok(())
        } else {
            Err(StoreError::LevelOutOfRange {
                level,
                n_lod: self.descriptor.n_lod,
            })
        }
    }

    // ████████╗██████╗ ███████╗███████╗███████╗
    // ╚══██╔══╝██╔══██╗██╔════╝██╔════╝██╔════╝
    //    ██║   ██████╔╝█████╗  █████╗  ███████╗
    //    ██║   ██╔══██╗██╔══╝  ██╔══╝  ╚════██║
    //    ██║   ██║  ██║███████╗███████╗███████║
    //    ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝

    /// The keys of all trees overlapping `extent` at `level`. This never touches the world.
    pub fn trees_overlapping(
        &self,
        level: u8,
        extent: &Extent3i,
    ) -> impl Iterator<Item = TreeKey> {
        self.indexer.trees_for_extent(level, extent)
    }

    /// Makes sure an entry exists for every tree overlapping `extent` at `level`, returning their keys. A tree seen for the
    /// first time gets its layout from disk if a previous session saved one.
    pub fn fetch_trees(&mut self, level: u8, extent: &Extent3i) -> StoreResult<Vec<TreeKey>> {
        self.check_level(level)?;

        let keys: Vec<TreeKey> = self.indexer.trees_for_extent(level, extent).collect();
        for key in keys.iter() {
            if self.trees.contains_key(key) {
                continue;
            }
            let layout = self.read_tree_file(*key);
            self.trees.insert(*key, layout);
        }

        Ok(keys)
    }

    fn read_tree_file(&self, key: TreeKey) -> Option<TreeLayout> {
        let path = self.tree_path(key);
        match fs::read(&path) {
            Ok(bytes) => match TreeLayout::from_bytes(self.descriptor.n_lod, &bytes) {
                Ok(layout) => Some(layout),
                Err(e) => {
                    warn!("ignoring corrupt tree file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("failed to read tree file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Returns `true` iff there is an entry for `key`, loaded or not.
    pub fn contains_tree(&self, key: TreeKey) -> bool {
        self.trees.contains_key(&key)
    }

    /// Returns `true` iff the layout of `key` is known, so its nodes can be enumerated.
    pub fn is_tree_loaded(&self, key: TreeKey) -> bool {
        matches!(self.trees.get(&key), Some(Some(_)))
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn tree_keys(&self) -> impl Iterator<Item = &TreeKey> {
        self.trees.keys()
    }

    pub fn tree_path(&self, key: TreeKey) -> PathBuf {
        let [x, y, z] = key.origin.0;

        self.root.join("trees").join(format!("{}_{}_{}.oct", x, y, z))
    }

    /// Replaces the layout of `key`, dropping any cached chunks of the old one.
    pub fn insert_tree(&mut self, key: TreeKey, layout: TreeLayout) {
        let indexer = self.indexer;
        self.chunks.retain(|c| indexer.tree_of_chunk(*c) != key);
        self.trees.insert(key, Some(layout));
    }

    /// Writes the layout of `key` to its tree file.
    pub fn save_tree(&self, key: TreeKey) -> StoreResult<()> {
        let layout = match self.trees.get(&key) {
            Some(Some(layout)) => layout,
            _ => return Err(StoreError::TreeNotLoaded(key)),
        };
        let path = self.tree_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, layout.to_bytes())?;

        Ok(())
    }

    /// Drops the tree at `key` and every cached chunk it owns from memory. Files stay on disk. Returns `false` if there was
    /// no such tree.
    pub fn remove_tree(&mut self, key: TreeKey) -> bool {
        let indexer = self.indexer;
        self.chunks.retain(|c| indexer.tree_of_chunk(*c) != key);

        self.trees.remove(&key).is_some()
    }

    // ███╗   ██╗ ██████╗ ██████╗ ███████╗███████╗
    // ████╗  ██║██╔═══██╗██╔══██╗██╔════╝██╔════╝
    // ██╔██╗ ██║██║   ██║██║  ██║█████╗  ███████╗
    // ██║╚██╗██║██║   ██║██║  ██║██╔══╝  ╚════██║
    // ██║ ╚████║╚██████╔╝██████╔╝███████╗███████║
    // ╚═╝  ╚═══╝ ╚═════╝ ╚═════╝ ╚══════╝╚══════╝

    fn layout_of(&self, tree: TreeKey) -> Option<&TreeLayout> {
        self.trees.get(&tree).and_then(|t| t.as_ref())
    }

    /// The status of the node at `key`, or `None` if its tree is not loaded.
    pub fn node_status(&self, key: ChunkKey) -> Option<NodeStatus> {
        let tree = self.indexer.tree_of_chunk(key);

        self.layout_of(tree)?
            .get(key.lod, self.indexer.chunk_offset_in_tree(key))
    }

    /// Sends every node of a loaded tree at `level` that overlaps `extent` to `rx`.
    pub fn nodes_overlapping(
        &self,
        level: u8,
        extent: &Extent3i,
        mut rx: impl FnMut(ChunkKey, NodeStatus),
    ) {
        if level >= self.descriptor.n_lod {
            return;
        }
        for tree in self.indexer.trees_for_extent(level, extent) {
            let layout = match self.layout_of(tree) {
                Some(layout) => layout,
                None => continue,
            };
            let in_tree = self.indexer.tree_extent(tree, level).intersection(extent);
            for key in self.indexer.chunks_for_extent(level, &in_tree) {
                if let Some(status) = layout.get(level, self.indexer.chunk_offset_in_tree(key)) {
                    rx(key, status);
                }
            }
        }
    }

    /// Sends every node at `level` of every loaded tree to `rx`.
    pub fn all_nodes(&self, level: u8, mut rx: impl FnMut(ChunkKey, NodeStatus)) {
        if level >= self.descriptor.n_lod {
            return;
        }
        let n = self.indexer.chunks_per_tree_axis(level);
        let offsets = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(n));
        for (tree, layout) in self.trees.iter() {
            let layout = match layout {
                Some(layout) => layout,
                None => continue,
            };
            for offset in offsets.iter_points() {
                if let Some(status) = layout.get(level, offset) {
                    rx(self.indexer.chunk_in_tree(*tree, level, offset), status);
                }
            }
        }
    }

    pub fn chunk_path(&self, key: ChunkKey) -> PathBuf {
        let [x, y, z] = key.minimum.0;

        self.root
            .join(format!("lod{}", key.lod))
            .join(format!("{}_{}_{}.chunk", x, y, z))
    }

    /// The checksum of the chunk file for `key`, or `None` if there is no such file.
    pub fn chunk_checksum(&self, key: ChunkKey) -> StoreResult<Option<Checksum>> {
        match fs::read(self.chunk_path(key)) {
            Ok(bytes) => Ok(Some(checksum(&bytes))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Persists downloaded voxels for `key`, replacing whatever was cached.
    pub fn write_chunk_file(&mut self, key: ChunkKey, voxels: &[u8]) -> StoreResult<()> {
        let expected = self.indexer.chunk_volume();
        if voxels.len() != expected {
            return Err(StoreError::ChunkLength {
                expected,
                actual: voxels.len(),
            });
        }
        let path = self.chunk_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, voxels)?;
        self.chunks.remove(&key);

        Ok(())
    }

    /// The voxels of a `Partial` chunk, read through the cache. A missing file reads as all zeros.
    fn chunk_voxels(&mut self, key: ChunkKey) -> StoreResult<&[u8]> {
        let path = self.chunk_path(key);
        let expected = self.indexer.chunk_volume();

        self.chunks
            .get_mut_or_try_insert_with(key, || read_chunk_file(&path, expected))
            .map(|v| v.as_slice())
    }

    fn materialize_chunk(&mut self, key: ChunkKey, status: NodeStatus) -> StoreResult<Vec<u8>> {
        match status.uniform_voxel() {
            Some(v) => Ok(vec![v; self.indexer.chunk_volume()]),
            None => Ok(self.chunk_voxels(key)?.to_vec()),
        }
    }

    // ██████╗ ███████╗ ██████╗ ██╗ ██████╗ ███╗   ██╗███████╗
    // ██╔══██╗██╔════╝██╔════╝ ██║██╔═══██╗████╗  ██║██╔════╝
    // ██████╔╝█████╗  ██║  ███╗██║██║   ██║██╔██╗ ██║███████╗
    // ██╔══██╗██╔══╝  ██║   ██║██║██║   ██║██║╚██╗██║╚════██║
    // ██║  ██║███████╗╚██████╔╝██║╚██████╔╝██║ ╚████║███████║
    // ╚═╝  ╚═╝╚══════╝ ╚═════╝ ╚═╝ ╚═════╝ ╚═╝  ╚═══╝╚══════╝

    /// Copies the voxels of `extent` at `level` into a row-major buffer. Voxels of trees that are not loaded read as 0.
    pub fn get_region(&mut self, level: u8, extent: &Extent3i) -> StoreResult<Vec<u8>> {
        self.check_level(level)?;

        let mut out = vec![NodeStatus::EMPTY_VOXEL; extent.num_points()];
        let keys: Vec<ChunkKey> = self.indexer.chunks_for_extent(level, extent).collect();
        for key in keys {
            let chunk_extent = self.indexer.chunk_extent(key);
            let overlap = extent.intersection(&chunk_extent);
            match self.node_status(key) {
                None | Some(NodeStatus::Empty) => {}
                Some(NodeStatus::Full) => {
                    for p in overlap.iter_points() {
                        out[extent.index_of(p)] = NodeStatus::FULL_VOXEL;
                    }
                }
                Some(NodeStatus::Partial) => {
                    let voxels = self.chunk_voxels(key)?;
                    for p in overlap.iter_points() {
                        out[extent.index_of(p)] = voxels[chunk_extent.index_of(p)];
                    }
                }
            }
        }

        Ok(out)
    }

    /// Overwrites the LOD0 voxels of `extent` with `voxels` (row-major) and queues `extent` as updated. Chunks of trees that
    /// are not loaded are skipped, since their layout will arrive with the edit already applied.
    pub fn set_region(&mut self, extent: &Extent3i, voxels: &[u8]) -> StoreResult<()> {
        self.write_region(0, extent, voxels)?;
        self.add_updated_region(0, *extent);

        Ok(())
    }

    /// Regenerates every coarser level from LOD0 inside `extent` by point sampling: each voxel at level `L` takes the value of
    /// the voxel at its minimum corner on level `L - 1`.
    pub fn generate_lods(&mut self, extent: &Extent3i) -> StoreResult<()> {
        let mut src_extent = *extent;
        for level in 1..self.descriptor.n_lod {
            let dst_extent = src_extent.downsample(1);
            let sampled =
                Extent3i::from_min_and_shape(dst_extent.minimum << 1, dst_extent.shape << 1);
            let src = self.get_region(level - 1, &sampled)?;
            let dst: Vec<u8> = dst_extent
                .iter_points()
                .map(|p| src[sampled.index_of(p << 1)])
                .collect();
            self.write_region(level, &dst_extent, &dst)?;
            self.add_updated_region(level, dst_extent);

            src_extent = dst_extent;
        }

        Ok(())
    }

    fn write_region(&mut self, level: u8, extent: &Extent3i, voxels: &[u8]) -> StoreResult<()> {
        self.check_level(level)?;
        let expected = extent.num_points();
        if voxels.len() != expected {
            return Err(StoreError::RegionLength {
                expected,
                actual: voxels.len(),
            });
        }

        let mut touched_trees = Vec::new();
        let keys: Vec<ChunkKey> = self.indexer.chunks_for_extent(level, extent).collect();
        for key in keys {
            let status = match self.node_status(key) {
                Some(status) => status,
                None => {
                    trace!(?key, "not writing to a chunk of an unloaded tree");
                    continue;
                }
            };
            let chunk_extent = self.indexer.chunk_extent(key);
            let mut chunk = self.materialize_chunk(key, status)?;
            for p in extent.intersection(&chunk_extent).iter_points() {
                chunk[chunk_extent.index_of(p)] = voxels[extent.index_of(p)];
            }

            let new_status = NodeStatus::classify(&chunk);
            if new_status == NodeStatus::Partial {
                self.write_chunk_file(key, &chunk)?;
                self.chunks.insert(key, chunk);
            } else {
                self.chunks.remove(&key);
            }
            let tree = self.indexer.tree_of_chunk(key);
            let offset = self.indexer.chunk_offset_in_tree(key);
            if let Some(Some(layout)) = self.trees.get_mut(&tree) {
                layout.set(level, offset, new_status);
            }
            if !touched_trees.contains(&tree) {
                touched_trees.push(tree);
            }
        }
        for tree in touched_trees {
            self.save_tree(tree)?;
        }

        Ok(())
    }

    /// Marks `extent` at `level` as changed, so renderers can refresh it.
    pub fn add_updated_region(&mut self, level: u8, extent: Extent3i) {
        self.updated_regions.push_back((level, extent));
    }

    /// Pops the oldest updated region.
    pub fn next_updated_region(&mut self) -> Option<(u8, Extent3i)> {
        self.updated_regions.pop_front()
    }

    pub fn num_updated_regions(&self) -> usize {
        self.updated_regions.len()
    }

    /// Drops the least recently used chunks until at most `max_cached_chunks` remain. Returns the number dropped.
    pub fn update_cache(&mut self) -> usize {
        let mut dropped = 0;
        while self.chunks.len() > self.max_cached_chunks {
            if self.chunks.remove_lru().is_none() {
                break;
            }
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "trimmed chunk cache");
        }

        dropped
    }

    pub fn num_cached_chunks(&self) -> usize {
        self.chunks.len()
    }
}

fn read_chunk_file(path: &Path, expected: usize) -> StoreResult<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) if bytes.len() == expected => Ok(bytes),
        Ok(bytes) => Err(StoreError::ChunkLength {
            expected,
            actual: bytes.len(),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Ok(vec![NodeStatus::EMPTY_VOXEL; expected])
        }
        Err(e) => Err(e.into()),
    }
}

fn wipe_dir(root: &Path) -> StoreResult<()> {
    match fs::remove_dir_all(root) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(root)?;

    Ok(())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
