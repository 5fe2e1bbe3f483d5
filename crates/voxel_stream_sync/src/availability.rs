use crate::terrain::Terrain;
use crate::tracker::Status;

use voxel_stream_core::prelude::*;
use voxel_stream_storage::{ChunkKey, LodIndexer, TreeKey};

use auto_impl::auto_impl;

/// Read-only status lookups needed to decide whether a region is resident.
#[auto_impl(&, &mut)]
pub trait StatusLookup {
    fn indexer(&self) -> LodIndexer;

    fn tree_status(&self, key: TreeKey) -> Status;

    /// The status of the chunk at `key`, or `None` if the tree owning it has no layout (so the chunk does not exist).
    fn chunk_status(&self, key: ChunkKey) -> Option<Status>;
}

impl StatusLookup for Terrain {
    #[inline]
    fn indexer(&self) -> LodIndexer {
        Terrain::indexer(self)
    }

    #[inline]
    fn tree_status(&self, key: TreeKey) -> Status {
        Terrain::tree_status(self, key)
    }

    #[inline]
    fn chunk_status(&self, key: ChunkKey) -> Option<Status> {
        self.world()
            .node_status(key)
            .map(|_| Terrain::chunk_status(self, key))
    }
}

/// Returns `true` iff every tree and every existing chunk overlapping `extent` at `level` is `Available`.
///
/// Trees are checked before chunks, and the first entity that is not available ends the search. Nothing is queued, so this is
/// safe to call speculatively every frame.
pub fn is_region_available(lookup: impl StatusLookup, level: u8, extent: &Extent3i) -> bool {
    let indexer = lookup.indexer();
    if level >= indexer.n_lod() {
        return false;
    }

    if !indexer
        .trees_for_extent(level, extent)
        .all(|tree| lookup.tree_status(tree) == Status::Available)
    {
        return false;
    }

    indexer
        .chunks_for_extent(level, extent)
        .all(|chunk| lookup.chunk_status(chunk).map_or(true, |s| s == Status::Available))
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
