//! Local storage for a voxel world that is streamed from a remote authority.
//!
//! The world is partitioned into trees, and each tree into chunks on every level of detail:
//!   - `VoxelWorld`: tree layouts, chunk files, region reads and writes, LOD generation and the updated-region queue
//!   - `LodIndexer`: the arithmetic relating trees, chunks and levels
//!   - `TreeLayout` and `NodeStatus`: the per-node side-data that arrives with a tree
//!
//! There are also the caching building blocks `IndexList` and `LruCache`, which other crates reuse for their own queues.

pub mod caching;
pub mod descriptor;
pub mod error;
pub mod indexer;
pub mod key;
pub mod layout;
pub mod world;

pub use caching::*;
pub use descriptor::*;
pub use error::*;
pub use indexer::*;
pub use key::*;
pub use layout::*;
pub use world::*;

// Hash types to use for small keys like `PointN`.
pub type SmallKeyHashMap<K, V> = ahash::AHashMap<K, V>;
pub type SmallKeyBuildHasher = ahash::RandomState;

pub mod prelude {
    pub use super::{
        checksum, Checksum, ChunkKey, IndexList, LodIndexer, NodeStatus, OpenOutcome,
        SmallKeyHashMap, SmallKeyLruCache, StoreError, StoreResult, TreeKey, TreeLayout,
        VoxelWorld, WorldDescriptor,
    };
}
