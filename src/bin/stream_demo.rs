//! Streams terrain from an in-process peer while a viewer walks along +X.
//!
//! Usage: `stream_demo [config.toml] [frames]`. Set `RUST_LOG` to choose what is logged, e.g. `RUST_LOG=voxel_stream_sync=debug`.

use voxel_stream::prelude::*;

use tracing::info;
use tracing_subscriber::EnvFilter;
use utilities::voxel_fns::hills;

#[derive(Default)]
struct CountingRenderer {
    slices: usize,
    regions: usize,
    voxels: usize,
}

impl GridRenderer for CountingRenderer {
    fn append_slice(&mut self, _level: u8, _face: BoxFace, voxels: &[u8]) {
        self.slices += 1;
        self.voxels += voxels.len();
    }

    fn update_sub_region(&mut self, _level: u8, _local_extent: &Extent3i, voxels: &[u8]) {
        self.regions += 1;
        self.voxels += voxels.len();
    }

    fn recenter(&mut self, level: u8, window: &Extent3i) {
        info!(level, ?window, "recentered");
    }
}

fn main() -> SyncResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<_> = std::env::args().collect();
    let config = match args.get(1) {
        Some(path) => SyncConfig::load(path.as_ref())?,
        None => SyncConfig {
            grid_shape: 32,
            view_distance: 64,
            terrain_root: std::env::temp_dir().join("voxel-stream-demo"),
            ..SyncConfig::default()
        },
    };
    let frames: i32 = args.get(2).and_then(|f| f.parse().ok()).unwrap_or(256);

    let mut peer = LoopbackPeer::new(WorldDescriptor::new(16, 3), hills(24, 96));
    let (mut session, outcome) = TerrainSession::connect(&mut peer, config)?;
    info!(?outcome, root = %session.terrain().world().root().display(), "opened world");

    let bootstrap = session.bootstrap(&mut peer, Point3i::ZERO)?;
    info!(?bootstrap, "bootstrapped");

    let mut renderer = CountingRenderer::default();
    for step in 0..frames {
        let pos = PointN([step, 16, 0]);
        let report = session.frame(&mut peer, pos, &mut renderer)?;
        if step % 32 == 0 {
            info!(step, ?report, "frame");
        }
    }
    info!(
        slices = renderer.slices,
        regions = renderer.regions,
        voxels = renderer.voxels,
        requests = peer.received().len(),
        "done"
    );

    Ok(())
}
