use crate::grid::target_window;
use crate::tracker::{Status, StatusTracker};
use crate::SyncResult;

use voxel_stream_core::prelude::*;
use voxel_stream_storage::{
    ChunkKey, LodIndexer, NodeStatus, TreeKey, VoxelWorld, WorldDescriptor,
};

use tracing::{debug, warn};

/// Whether `Terrain::reconcile_dimensions` had to throw away local terrain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DimensionCheck {
    Unchanged,
    Reset,
}

/// The local world together with the download status of each of its trees and chunks.
///
/// Status records are keyed by the entity they annotate. Whenever an entity leaves the world (a tree is removed, the world is
/// reset), its records are released here as well, which also unlinks them from any request list.
pub struct Terrain {
    world: VoxelWorld,
    trees: StatusTracker<TreeKey>,
    chunks: StatusTracker<ChunkKey>,
}

impl Terrain {
    /// `max_tracked` bounds the number of status records of each kind.
    pub fn new(world: VoxelWorld, max_tracked: usize) -> Self {
        Self {
            world,
            trees: StatusTracker::new("tree", max_tracked),
            chunks: StatusTracker::new("chunk", max_tracked),
        }
    }

    pub fn world(&self) -> &VoxelWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut VoxelWorld {
        &mut self.world
    }

    pub fn trees(&self) -> &StatusTracker<TreeKey> {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut StatusTracker<TreeKey> {
        &mut self.trees
    }

    pub fn chunks(&self) -> &StatusTracker<ChunkKey> {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut StatusTracker<ChunkKey> {
        &mut self.chunks
    }

    pub fn indexer(&self) -> LodIndexer {
        *self.world.indexer()
    }

    pub fn n_lod(&self) -> u8 {
        self.world.n_lod()
    }

    #[inline]
    pub fn tree_status(&self, key: TreeKey) -> Status {
        self.trees.status(&key)
    }

    #[inline]
    pub fn chunk_status(&self, key: ChunkKey) -> Status {
        self.chunks.status(&key)
    }

    /// Returns `true` while any tree or chunk is queued or downloading.
    pub fn has_pending(&self) -> bool {
        self.trees.has_pending() || self.chunks.has_pending()
    }

    /// Makes sure every tree overlapping `extent` at `level` exists in the world and queues those not yet downloaded this
    /// session. Returns the number of keys considered.
    pub fn query_trees_in(&mut self, level: u8, extent: &Extent3i) -> SyncResult<usize> {
        let keys = self.world.fetch_trees(level, extent)?;
        for key in keys.iter() {
            self.trees.query(*key, false)?;
        }

        Ok(keys.len())
    }

    /// Queries every tree a viewer at LOD0 position `pos` needs: those overlapping the LOD0 `view`, and those under the
    /// coarsest grid window of `grid_shape`. Returns the number of distinct keys considered.
    pub fn query_trees_around(
        &mut self,
        pos: Point3i,
        view: &Extent3i,
        grid_shape: Point3i,
    ) -> SyncResult<usize> {
        let coarsest = self.n_lod() - 1;
        let mut keys = self.world.fetch_trees(0, view)?;
        let window = target_window(pos, coarsest, grid_shape);
        for key in self.world.fetch_trees(coarsest, &window)? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        for key in keys.iter() {
            self.trees.query(*key, false)?;
        }

        Ok(keys.len())
    }

    /// Queries every node of a loaded tree at `level` overlapping `extent`. Nodes whose voxels are uniform become available
    /// immediately.
    pub fn query_chunks_in(&mut self, level: u8, extent: &Extent3i) -> SyncResult<usize> {
        let mut nodes = Vec::new();
        self.world
            .nodes_overlapping(level, extent, |key, status| nodes.push((key, status)));

        self.query_nodes(nodes)
    }

    /// Queries every node at `level` of every loaded tree.
    pub fn query_all_chunks(&mut self, level: u8) -> SyncResult<usize> {
        let mut nodes = Vec::new();
        self.world
            .all_nodes(level, |key, status| nodes.push((key, status)));

        self.query_nodes(nodes)
    }

    /// Queries the nodes of `tree` on every level except LOD0, coarsest first.
    pub fn queue_tree_chunks(&mut self, tree: TreeKey) -> SyncResult<usize> {
        let indexer = self.indexer();
        let mut queried = 0;
        for level in (1..self.n_lod()).rev() {
            let extent = indexer.tree_extent(tree, level);
            queried += self.query_chunks_in(level, &extent)?;
        }

        Ok(queried)
    }

    fn query_nodes(&mut self, nodes: Vec<(ChunkKey, NodeStatus)>) -> SyncResult<usize> {
        for (key, status) in nodes.iter() {
            self.chunks.query(*key, status.is_uniform())?;
        }

        Ok(nodes.len())
    }

    /// Removes `tree` from the world and releases the status records of the tree and all of its chunks.
    pub fn remove_tree(&mut self, tree: TreeKey) -> bool {
        let indexer = self.indexer();
        self.trees.release(&tree);
        let released = self
            .chunks
            .release_where(|c| indexer.tree_of_chunk(*c) == tree);
        debug!(?tree, released, "removed tree");

        self.world.remove_tree(tree)
    }

    /// Compares the dimensions reported by the peer against the local world. On any difference all local terrain is deleted,
    /// loudly, and every status record is released.
    pub fn reconcile_dimensions(
        &mut self,
        reported: WorldDescriptor,
    ) -> SyncResult<DimensionCheck> {
        let local = self.world.descriptor();
        if local == reported {
            return Ok(DimensionCheck::Unchanged);
        }

        warn!(
            ?local,
            ?reported,
            "peer changed chunk size or number of levels; deleting all local terrain under {}",
            self.world.root().display()
        );
        self.trees.clear();
        self.chunks.clear();
        self.world.reset(reported)?;

        Ok(DimensionCheck::Reset)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use pretty_assertions::assert_eq;
    use crate::ListKind;
    use voxel_stream_storage::TreeLayout;

    const DESC: WorldDescriptor = WorldDescriptor {
        chunk_size: 4,
        n_lod: 3,
    };

    fn terrain(dir: &std::path::Path) -> Terrain {
        let (world, _) = VoxelWorld::open(dir, DESC, 16).unwrap();

        Terrain::new(world, 1024)
    }

    #[test]
    fn uniform_nodes_skip_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let tree = TreeKey::new(Point3i::ZERO);
        let layout = TreeLayout::from_fn(3, |level, offset| {
            if level == 0 && offset == Point3i::ZERO {
                NodeStatus::Partial
            } else {
                NodeStatus::Empty
            }
        });
        t.world_mut().insert_tree(tree, layout);

        let extent = Extent3i::from_min_and_shape(Point3i::ZERO, PointN([8, 4, 4]));
        assert_eq!(t.query_chunks_in(0, &extent).unwrap(), 2);

        assert_eq!(t.chunk_status(ChunkKey::new(0, Point3i::ZERO)), Status::Queued);
        assert_eq!(
            t.chunk_status(ChunkKey::new(0, PointN([4, 0, 0]))),
            Status::Available
        );
        assert_eq!(t.chunks().queued_len(), 1);
    }

    #[test]
    fn trees_under_the_coarsest_window_are_queried() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let view = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::ONES);

        // The level 2 window of shape 8 covers [-16, 16) in LOD0, two trees per axis.
        assert_eq!(
            t.query_trees_around(Point3i::ZERO, &view, Point3i::fill(8)).unwrap(),
            8
        );
        assert_eq!(t.tree_status(TreeKey::new(Point3i::fill(-16))), Status::Queued);
        assert_eq!(t.trees().queued_len(), 8);
    }

    #[test]
    fn queue_tree_chunks_skips_lod0() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let tree = TreeKey::new(Point3i::ZERO);
        t.world_mut().insert_tree(tree, TreeLayout::uniform(3, NodeStatus::Partial));

        // 1 node at level 2 and 8 at level 1.
        assert_eq!(t.queue_tree_chunks(tree).unwrap(), 9);
        let first: Vec<_> = t.chunks().keys_in(ListKind::Queued).take(2).copied().collect();
        assert_eq!(first[0].lod, 2);
        assert_eq!(first[1].lod, 1);
        assert!(t
            .chunks()
            .keys_in(ListKind::Queued)
            .all(|k| k.lod > 0));
    }

    #[test]
    fn remove_tree_releases_its_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let tree = TreeKey::new(Point3i::ZERO);
        let extent = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(16));
        t.query_trees_in(0, &extent).unwrap();
        t.world_mut().insert_tree(tree, TreeLayout::uniform(3, NodeStatus::Partial));
        t.query_chunks_in(0, &extent).unwrap();
        assert_eq!(t.chunks().queued_len(), 64);

        assert!(t.remove_tree(tree));
        assert_eq!(t.tree_status(tree), Status::Unavailable);
        assert_eq!(t.chunks().queued_len(), 0);
        assert!(t.chunks().is_empty());
        assert!(!t.has_pending());
    }

    #[test]
    fn reconcile_dimensions_resets_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let extent = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(4));
        t.query_trees_in(0, &extent).unwrap();

        assert_eq!(t.reconcile_dimensions(DESC).unwrap(), DimensionCheck::Unchanged);
        assert!(t.has_pending());

        let bigger = WorldDescriptor::new(8, 3);
        assert_eq!(t.reconcile_dimensions(bigger).unwrap(), DimensionCheck::Reset);
        assert!(!t.has_pending());
        assert_eq!(t.world().descriptor(), bigger);
        assert_eq!(t.world().num_trees(), 0);
    }
}
