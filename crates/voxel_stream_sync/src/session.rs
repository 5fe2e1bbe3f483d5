//! A client's connection to a terrain authority, from handshake to per-frame updates.
//!
//! ```no_run
//! # use voxel_stream_core::prelude::*;
//! # use voxel_stream_sync::prelude::*;
//! # fn run(mut transport: impl Transport, mut renderer: impl GridRenderer) -> SyncResult<()> {
//! let config = SyncConfig::load("sync.toml".as_ref())?;
//! let (mut session, _outcome) = TerrainSession::connect(&mut transport, config)?;
//! session.bootstrap(&mut transport, Point3i::ZERO)?;
//! loop {
//!     session.frame(&mut transport, Point3i::ZERO, &mut renderer)?;
//! }
//! # }
//! ```

use crate::bootstrap::{BootstrapReport, Bootstrapper};
use crate::grid::{GridRenderer, GridSync, SyncReport};
use crate::protocol::{self, Command, Packet};
use crate::scheduler::DownloadScheduler;
use crate::terrain::{DimensionCheck, Terrain};
use crate::transport::Transport;
use crate::{SyncConfig, SyncError, SyncResult};

use voxel_stream_core::prelude::*;
use voxel_stream_storage::{OpenOutcome, VoxelWorld, WorldDescriptor};

use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};

/// The largest number of levels a peer may report.
pub const MAX_LOD: i32 = 16;

/// What one call to `TerrainSession::frame` did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FrameReport {
    pub packets_handled: usize,
    pub trees_queried: usize,
    pub chunks_queried: usize,
    pub requests_sent: usize,
    pub grid: SyncReport,
    pub chunks_evicted: usize,
}

pub struct TerrainSession {
    config: SyncConfig,
    terrain: Terrain,
    scheduler: DownloadScheduler,
    grid: GridSync,
    bootstrapper: Bootstrapper,
}

impl TerrainSession {
    /// Asks the peer for its dimensions and opens the local world that matches them. A stored world with other dimensions
    /// is deleted.
    pub fn connect(
        mut transport: impl Transport,
        config: SyncConfig,
    ) -> SyncResult<(Self, OpenOutcome)> {
        config.validate()?;
        let descriptor = handshake(&mut transport, config.handshake_timeout())?;
        let (world, outcome) =
            VoxelWorld::open(config.world_dir(), descriptor, config.max_cached_chunks)?;
        info!(?descriptor, ?outcome, "connected to terrain peer");

        let session = Self {
            terrain: Terrain::new(world, config.max_tracked_entities),
            scheduler: DownloadScheduler::new(config.max_downloads),
            grid: GridSync::new(config.grid_shape(), descriptor.n_lod),
            bootstrapper: Bootstrapper::from_config(&config),
            config,
        };

        Ok((session, outcome))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn terrain(&self) -> &Terrain {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut Terrain {
        &mut self.terrain
    }

    pub fn grid(&self) -> &GridSync {
        &self.grid
    }

    pub fn scheduler(&self) -> DownloadScheduler {
        self.scheduler
    }

    /// Blocks until everything needed for the first frame at `pos` is resident: trees in view, all coarse chunks of those
    /// trees, and the LOD0 chunks of the finest grid window. Then fills the grid.
    pub fn bootstrap(
        &mut self,
        mut transport: impl Transport,
        pos: Point3i,
    ) -> SyncResult<BootstrapReport> {
        let span = info_span!("bootstrap");
        let _trace_guard = span.enter();

        let mut report = self.bootstrapper.run(&mut self.terrain, &mut transport, pos)?;

        self.grid.place(self.terrain.world_mut(), pos);
        if let Some(finest) = self.grid.window(0) {
            let prefetch =
                self.bootstrapper
                    .prefetch_finest(&mut self.terrain, &mut transport, &finest)?;
            report.chunks_queried += prefetch.chunks_queried;
            report.packets_handled += prefetch.packets_handled;
        }
        info!(?report, "bootstrap complete");

        Ok(report)
    }

    /// One non-blocking step: applies every packet that has arrived, queues whatever the viewer at `pos` now needs, sends at
    /// most one tree and one chunk request, moves the grid toward `pos` and trims the chunk cache.
    pub fn frame(
        &mut self,
        mut transport: impl Transport,
        pos: Point3i,
        renderer: impl GridRenderer,
    ) -> SyncResult<FrameReport> {
        let span = info_span!("frame");
        let _trace_guard = span.enter();

        let mut report = FrameReport::default();
        report.packets_handled = self.pump(&mut transport)?;

        let view = self.config.view_extent(pos);
        report.trees_queried = self
            .terrain
            .query_trees_around(pos, &view, self.config.grid_shape())?;
        report.chunks_queried = self.terrain.query_chunks_in(0, &view)?;
        report.requests_sent = self.scheduler.advance(&mut self.terrain, &mut transport)?;

        report.grid = self.grid.synchronize(&mut self.terrain, pos, renderer)?;
        report.chunks_evicted = self.terrain.world_mut().update_cache();
        debug!(?report, "frame");

        Ok(report)
    }

    /// Applies every packet the transport has ready, without waiting. Returns how many there were.
    pub fn pump(&mut self, mut transport: impl Transport) -> SyncResult<usize> {
        let mut handled = 0;
        while let Some(packet) = transport.poll(Duration::ZERO)? {
            let outcome = self.scheduler.handle_packet(&mut self.terrain, &packet)?;
            debug!(command = ?packet.command, ?outcome, "handled packet");
            handled += 1;
        }

        Ok(handled)
    }

    /// Asks the peer to overwrite the LOD0 voxels of `extent`. The local world changes when the peer broadcasts the edit back.
    pub fn send_edit(
        &self,
        mut transport: impl Transport,
        extent: &Extent3i,
        voxels: &[u8],
    ) -> SyncResult<()> {
        let payload = protocol::encode_edit(extent, voxels)?;
        transport.send(Command::EditRegion, &payload)?;

        Ok(())
    }

    /// Repeats the handshake on an established session. Responses to requests still in flight that arrive meanwhile are
    /// applied as usual. If the peer's dimensions changed, all local terrain is deleted and the grid starts over centered on
    /// the origin; the caller must bootstrap again.
    pub fn rehandshake(&mut self, mut transport: impl Transport) -> SyncResult<DimensionCheck> {
        let scheduler = self.scheduler;
        let terrain = &mut self.terrain;
        let descriptor = handshake_with(
            &mut transport,
            self.config.handshake_timeout(),
            |packet| {
                let outcome = scheduler.handle_packet(terrain, packet)?;
                debug!(command = ?packet.command, ?outcome, "handled packet during handshake");

                Ok(())
            },
        )?;
        let check = self.terrain.reconcile_dimensions(descriptor)?;
        if check == DimensionCheck::Reset {
            self.grid = GridSync::new(self.config.grid_shape(), descriptor.n_lod);
        }

        Ok(check)
    }
}

/// Requests the peer's chunk size and number of levels and waits up to `timeout` for each answer. Other packets arriving in
/// the meantime are dropped, so this is only meant for a session that has nothing in flight.
pub fn handshake(transport: impl Transport, timeout: Duration) -> SyncResult<WorldDescriptor> {
    handshake_with(transport, timeout, |packet| {
        warn!(command = ?packet.command, "dropping packet received during handshake");

        Ok(())
    })
}

/// Like `handshake`, but every other packet arriving in the meantime is passed to `other`.
pub fn handshake_with(
    mut transport: impl Transport,
    timeout: Duration,
    mut other: impl FnMut(&Packet) -> SyncResult<()>,
) -> SyncResult<WorldDescriptor> {
    let span = info_span!("handshake");
    let _trace_guard = span.enter();

    transport.send(Command::ChunkSize, &[])?;
    let chunk_size = await_scalar(&mut transport, Command::ChunkSize, timeout, &mut other)?;
    transport.send(Command::NumLod, &[])?;
    let n_lod = await_scalar(&mut transport, Command::NumLod, timeout, &mut other)?;

    validate_dimensions(chunk_size, n_lod)
}

/// Checks that the peer's dimensions describe a world this client can index: a power-of-two chunk size, between 1 and
/// `MAX_LOD` levels, and a coarsest tree whose size fits in an `i32`.
pub fn validate_dimensions(chunk_size: i32, n_lod: i32) -> SyncResult<WorldDescriptor> {
    let invalid = SyncError::InvalidDimensions { chunk_size, n_lod };
    if chunk_size < 1 || chunk_size.count_ones() != 1 || !(1..=MAX_LOD).contains(&n_lod) {
        return Err(invalid);
    }
    if (chunk_size as i64) << (n_lod - 1) > i32::MAX as i64 {
        return Err(invalid);
    }

    Ok(WorldDescriptor::new(chunk_size, n_lod as u8))
}

fn await_scalar(
    mut transport: impl Transport,
    command: Command,
    timeout: Duration,
    mut other: impl FnMut(&Packet) -> SyncResult<()>,
) -> SyncResult<i32> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match transport.poll(remaining)? {
            Some(packet) if packet.command == command => {
                return Ok(protocol::decode_scalar(&packet.payload)?)
            }
            Some(packet) => other(&packet)?,
            None => {
                if remaining == Duration::ZERO {
                    return Err(SyncError::Timeout(timeout));
                }
            }
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
