use voxel_stream_core::prelude::*;
use voxel_stream_storage::WorldDescriptor;
use voxel_stream_sync::prelude::*;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use utilities::voxel_fns::hills;

fn resident_session(dir: &std::path::Path) -> (TerrainSession, LoopbackPeer) {
    let mut peer = LoopbackPeer::new(WorldDescriptor::new(8, 3), hills(12, 48));
    let config = SyncConfig {
        grid_shape: 32,
        view_distance: 64,
        view_threshold: 0,
        terrain_root: dir.to_path_buf(),
        poll_interval_ms: 0,
        ..SyncConfig::default()
    };
    let (mut session, _) = TerrainSession::connect(&mut peer, config).unwrap();
    session.bootstrap(&mut peer, Point3i::ZERO).unwrap();

    (session, peer)
}

fn region_available(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let (session, _peer) = resident_session(dir.path());
    let mut group = c.benchmark_group("region_available");

    for edge in [4, 8, 16, 32].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(edge), edge, |b, &edge| {
            let extent = Extent3i::from_center_and_shape(Point3i::ZERO, Point3i::fill(edge));
            b.iter(|| is_region_available(session.terrain(), 0, black_box(&extent)));
        });
    }
    group.finish();
}

fn region_unavailable_early_exit(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let (session, _peer) = resident_session(dir.path());

    // Far outside the view, so the first tree checked is unavailable.
    let extent = Extent3i::from_min_and_shape(Point3i::fill(4096), Point3i::fill(32));
    c.bench_function("region_unavailable_early_exit", |b| {
        b.iter(|| is_region_available(session.terrain(), 0, black_box(&extent)));
    });
}

criterion_group!(benches, region_available, region_unavailable_early_exit);
criterion_main!(benches);
