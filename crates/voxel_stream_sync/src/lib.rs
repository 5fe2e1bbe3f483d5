//! Keeps a client's copy of a streamed voxel world in step with a remote authority and with the renderer.
//!
//! The pieces, bottom-up:
//!   - `StatusTracker`: the `Unavailable -> Queued -> Available` status of every tree and chunk, with bounded queues of
//!     pending and in-flight downloads
//!   - `protocol` and `Transport`: the packet format and the connection it travels over
//!   - `DownloadScheduler`: pipelines at most `K` requests per entity kind and applies the responses
//!   - `is_region_available`: whether everything a region needs is resident
//!   - `GridSync`: moves each level's grid window toward the viewer, one resident slice at a time
//!   - `Bootstrapper` and `TerrainSession`: blocking startup and non-blocking per-frame updates
//!
//! `LoopbackPeer` is an in-process authority for tests and demos.

pub mod availability;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod grid;
pub mod peer;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod session;
pub mod terrain;
pub mod tracker;
pub mod transport;

pub use availability::*;
pub use bootstrap::*;
pub use config::*;
pub use error::*;
pub use grid::*;
pub use peer::*;
pub use protocol::{Command, Packet, ProtocolError, ProtocolResult};
pub use queue::*;
pub use scheduler::*;
pub use session::*;
pub use terrain::*;
pub use tracker::*;
pub use transport::*;

pub mod prelude {
    pub use super::protocol::{decode_scalar, encode_scalar};
    pub use super::{
        is_region_available, BootstrapReport, Bootstrapper, Command, DimensionCheck,
        DownloadScheduler, EntityKind, FrameReport, GridRenderer, GridSync, LoopbackPeer, Packet,
        PacketOutcome, Status, StatusLookup, StatusTracker, SyncConfig, SyncError, SyncReport,
        SyncResult, Terrain, TerrainSession, Transport, TransportError,
    };
}
