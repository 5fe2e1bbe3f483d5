//! Streams a multi-resolution voxel world from a remote authority.
//!
//! This library is organized into several crates:
//! - **core**: lattice points, extents, axes and box faces
//! - **storage**: the local world store, with tree layouts, chunk files, region access and LOD generation
//! - **sync**: availability tracking, download scheduling, the wire protocol and grid synchronization
//!
//! A client opens a `TerrainSession` over some `Transport`, bootstraps once, then calls `frame` every tick with the viewer
//! position and a `GridRenderer`.

pub use voxel_stream_core as core;
pub use voxel_stream_storage as storage;
pub use voxel_stream_sync as sync;

pub mod prelude {
    pub use super::core::prelude::*;
    pub use super::storage::prelude::*;
    pub use super::sync::prelude::*;
}
