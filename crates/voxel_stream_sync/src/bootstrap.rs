use crate::scheduler::{DownloadScheduler, EntityKind};
use crate::terrain::Terrain;
use crate::transport::Transport;
use crate::{SyncConfig, SyncError, SyncResult};

use voxel_stream_core::prelude::*;

use std::time::{Duration, Instant};
use tracing::{debug, info, info_span};

/// What a blocking download phase accomplished.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BootstrapReport {
    pub trees_queried: usize,
    pub chunks_queried: usize,
    pub packets_handled: usize,
}

/// Populates the terrain around the viewer before the first frame is drawn.
///
/// Unlike frames, which send at most one request of each kind and never wait, the bootstrapper keeps every download slot busy
/// and blocks until the queues are empty. If the peer goes quiet for longer than the stall timeout while requests are still
/// outstanding, bootstrapping fails with `SyncError::Timeout`.
#[derive(Clone, Copy, Debug)]
pub struct Bootstrapper {
    scheduler: DownloadScheduler,
    view_size: i32,
    grid_shape: i32,
    poll_interval: Duration,
    stall_timeout: Duration,
}

impl Bootstrapper {
    pub fn new(
        scheduler: DownloadScheduler,
        view_size: i32,
        grid_shape: i32,
        poll_interval: Duration,
        stall_timeout: Duration,
    ) -> Self {
        Self {
            scheduler,
            view_size,
            grid_shape,
            poll_interval,
            stall_timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            DownloadScheduler::new(config.max_downloads),
            config.view_distance + config.view_threshold,
            config.grid_shape,
            config.poll_interval(),
            config.bootstrap_stall_timeout(),
        )
    }

    /// The LOD0 cube around `pos` whose trees are downloaded.
    pub fn view_extent(&self, pos: Point3i) -> Extent3i {
        Extent3i::from_center_and_shape(pos, Point3i::fill(self.view_size))
    }

    /// Downloads every tree in view of `pos` or under its coarsest grid window, then every chunk of those trees on all levels
    /// except LOD0, coarsest first.
    pub fn run(
        &self,
        terrain: &mut Terrain,
        mut transport: impl Transport,
        pos: Point3i,
    ) -> SyncResult<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let view = self.view_extent(pos);

        {
            let span = info_span!("bootstrap_trees");
            let _trace_guard = span.enter();
            report.trees_queried =
                terrain.query_trees_around(pos, &view, Point3i::fill(self.grid_shape))?;
            report.packets_handled += self.drain(EntityKind::Tree, terrain, &mut transport)?;
            info!(trees = report.trees_queried, "downloaded trees");
        }
        {
            let span = info_span!("bootstrap_chunks");
            let _trace_guard = span.enter();
            for level in (1..terrain.n_lod()).rev() {
                report.chunks_queried += terrain.query_all_chunks(level)?;
            }
            report.packets_handled += self.drain(EntityKind::Chunk, terrain, &mut transport)?;
            info!(chunks = report.chunks_queried, "downloaded coarse chunks");
        }

        Ok(report)
    }

    /// Downloads every LOD0 chunk overlapping `extent`. Meant for the finest grid window, right after it is placed.
    pub fn prefetch_finest(
        &self,
        terrain: &mut Terrain,
        transport: impl Transport,
        extent: &Extent3i,
    ) -> SyncResult<BootstrapReport> {
        let span = info_span!("prefetch_lod0");
        let _trace_guard = span.enter();
        let chunks_queried = terrain.query_chunks_in(0, extent)?;
        let packets_handled = self.drain(EntityKind::Chunk, terrain, transport)?;
        info!(chunks = chunks_queried, "downloaded LOD0 chunks");

        Ok(BootstrapReport {
            trees_queried: 0,
            chunks_queried,
            packets_handled,
        })
    }

    /// Keeps every download slot of `kind` busy until nothing of that kind is queued or in flight. Packets of any kind are
    /// applied as they arrive. Returns the number of packets handled.
    pub fn drain(
        &self,
        kind: EntityKind,
        terrain: &mut Terrain,
        mut transport: impl Transport,
    ) -> SyncResult<usize> {
        let mut handled = 0;
        let mut last_heard = Instant::now();
        while pending(kind, terrain) {
            while self.scheduler.schedule_next(kind, terrain, &mut transport)? {}

            match transport.poll(self.poll_interval)? {
                Some(packet) => {
                    let outcome = self.scheduler.handle_packet(terrain, &packet)?;
                    debug!(command = ?packet.command, ?outcome, "bootstrap packet");
                    handled += 1;
                    last_heard = Instant::now();
                }
                None => {
                    if last_heard.elapsed() >= self.stall_timeout {
                        return Err(SyncError::Timeout(self.stall_timeout));
                    }
                }
            }
        }

        Ok(handled)
    }
}

fn pending(kind: EntityKind, terrain: &Terrain) -> bool {
    match kind {
        EntityKind::Tree => terrain.trees().has_pending(),
        EntityKind::Chunk => terrain.chunks().has_pending(),
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

    use crate::peer::LoopbackPeer;
    use crate::tracker::Status;
    use crate::TransportError;

    use utilities::voxel_fns::flat_ground;
    use voxel_stream_storage::{ChunkKey, TreeKey, VoxelWorld, WorldDescriptor};

    use pretty_assertions::assert_eq;

    const DESC: WorldDescriptor = WorldDescriptor {
        chunk_size: 4,
        n_lod: 2,
    };

    fn terrain(dir: &std::path::Path) -> Terrain {
        let (world, _) = VoxelWorld::open(dir, DESC, 16).unwrap();

        Terrain::new(world, 1024)
    }

    fn bootstrapper(stall_ms: u64) -> Bootstrapper {
        Bootstrapper::new(
            DownloadScheduler::new(2),
            8,
            8,
            Duration::ZERO,
            Duration::from_millis(stall_ms),
        )
    }

    #[test]
    fn run_downloads_trees_then_coarse_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let mut peer = LoopbackPeer::new(DESC, flat_ground(2));

        let report = bootstrapper(50).run(&mut t, &mut peer, Point3i::ZERO).unwrap();

        // View [-4, 4) and the level 1 window [-8, 8) both touch the trees at -8 and 0 on every axis.
        assert_eq!(report.trees_queried, 8);
        assert!(!t.has_pending());
        assert_eq!(t.tree_status(TreeKey::new(Point3i::ZERO)), Status::Available);
        assert_eq!(t.chunk_status(ChunkKey::new(1, Point3i::ZERO)), Status::Available);
        // LOD0 is left for the prefetch.
        assert_eq!(t.chunk_status(ChunkKey::new(0, Point3i::ZERO)), Status::Unavailable);
    }

    #[test]
    fn prefetch_makes_lod0_resident() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let mut peer = LoopbackPeer::new(DESC, flat_ground(2));
        let b = bootstrapper(50);
        b.run(&mut t, &mut peer, Point3i::ZERO).unwrap();

        let finest = Extent3i::from_min_and_shape(Point3i::fill(-4), Point3i::fill(8));
        let report = b.prefetch_finest(&mut t, &mut peer, &finest).unwrap();

        assert_eq!(report.chunks_queried, 8);
        assert_eq!(t.chunk_status(ChunkKey::new(0, Point3i::ZERO)), Status::Available);
    }

    #[test]
    fn downloads_never_exceed_the_slots() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let mut peer = LoopbackPeer::new(DESC, flat_ground(2));
        peer.set_holding(true);
        let b = bootstrapper(50);
        t.query_trees_in(0, &b.view_extent(Point3i::ZERO)).unwrap();

        assert!(b.scheduler.schedule_next(EntityKind::Tree, &mut t, &mut peer).unwrap());
        assert!(b.scheduler.schedule_next(EntityKind::Tree, &mut t, &mut peer).unwrap());
        assert!(!b.scheduler.schedule_next(EntityKind::Tree, &mut t, &mut peer).unwrap());
        assert_eq!(peer.num_held(), 2);
        assert_eq!(t.trees().downloading_len(), 2);
    }

    #[test]
    fn silent_peer_stalls_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let mut peer = LoopbackPeer::new(DESC, flat_ground(2));
        peer.set_holding(true);

        let result = bootstrapper(5).run(&mut t, &mut peer, Point3i::ZERO);

        assert!(matches!(result, Err(SyncError::Timeout(_))));
        assert_eq!(peer.num_held(), 2);
    }

    #[test]
    fn lost_connection_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = terrain(dir.path());
        let mut peer = LoopbackPeer::new(DESC, flat_ground(2));
        peer.disconnect();

        let result = bootstrapper(50).run(&mut t, &mut peer, Point3i::ZERO);

        assert!(matches!(
            result,
            Err(SyncError::Transport(TransportError::Disconnected))
        ));
    }
}
