//! Keeps each level of the renderer's voxel grid centered on the viewer.
//!
//! Every level has a window of the same shape, in that level's voxel coordinates, whose center follows the viewer position
//! shifted down to that level. When the viewer moves, the window lags behind by some number of slices per axis. Each frame,
//! `GridSync::synchronize` closes that gap one slice at a time, but only for slices whose trees and chunks are all resident.
//! Anything not yet resident is left for a later frame, so the renderer never sees a half-downloaded slice.
//!
//! After the slices, the world's updated regions (from grid placement, edits and LOD regeneration) are copied into the
//! renderer, gated by the same residency check.

use crate::availability::is_region_available;
use crate::terrain::Terrain;
use crate::SyncResult;

use voxel_stream_core::prelude::*;
use voxel_stream_storage::VoxelWorld;

use auto_impl::auto_impl;
use tracing::{debug, trace};

/// The receiving end of grid updates. All voxel buffers are row-major with X varying fastest.
#[auto_impl(&mut, Box)]
pub trait GridRenderer {
    /// Drops the slice on the face opposite `face` and appends `voxels` as the new slice on `face`, moving the window of
    /// `level` one voxel along the normal of `face`.
    fn append_slice(&mut self, level: u8, face: BoxFace, voxels: &[u8]);

    /// Overwrites the voxels of `local_extent`, given relative to the minimum of the window of `level`.
    fn update_sub_region(&mut self, level: u8, local_extent: &Extent3i, voxels: &[u8]);

    /// Moves the window of `level` to `window`, discarding everything resident. The new contents arrive through
    /// `update_sub_region`.
    fn recenter(&mut self, level: u8, window: &Extent3i);
}

/// The resident window of one level.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GridLevel {
    level: u8,
    minimum: Point3i,
}

impl GridLevel {
    pub fn level(&self) -> u8 {
        self.level
    }

    /// The resident window in voxel coordinates of this level.
    pub fn window(&self, shape: Point3i) -> Extent3i {
        Extent3i::from_min_and_shape(self.minimum, shape)
    }

    /// Where the window should be for a viewer at LOD0 position `pos`.
    pub fn target_minimum(&self, pos: Point3i, shape: Point3i) -> Point3i {
        target_window(pos, self.level, shape).minimum
    }

    /// Signed number of slices the window lags behind its target on each axis.
    pub fn missing(&self, pos: Point3i, shape: Point3i) -> Point3i {
        self.target_minimum(pos, shape) - self.minimum
    }
}

/// Counters describing one call to `GridSync::synchronize`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncReport {
    pub slices_appended: usize,
    /// Faces that still lag behind because their next slice is not resident.
    pub faces_deferred: usize,
    pub levels_recentered: usize,
    pub regions_updated: usize,
    pub regions_deferred: usize,
}

/// The grid windows of all levels.
#[derive(Clone, Debug)]
pub struct GridSync {
    shape: Point3i,
    levels: Vec<GridLevel>,
}

impl GridSync {
    /// Windows of `shape` for each of `n_lod` levels, all centered on the origin until `place` is called.
    pub fn new(shape: Point3i, n_lod: u8) -> Self {
        let mut grid = Self {
            shape,
            levels: (0..n_lod)
                .map(|level| GridLevel {
                    level,
                    minimum: Point3i::ZERO,
                })
                .collect(),
        };
        for level in grid.levels.iter_mut() {
            level.minimum = level.target_minimum(Point3i::ZERO, shape);
        }

        grid
    }

    pub fn shape(&self) -> Point3i {
        self.shape
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    /// The resident window of `level`.
    pub fn window(&self, level: u8) -> Option<Extent3i> {
        self.levels
            .get(level as usize)
            .map(|l| l.window(self.shape))
    }

    /// Moves every window onto its target for a viewer at `pos` and queues every window as an updated region of `world`, so
    /// the renderer gets filled as soon as the data is resident.
    pub fn place(&mut self, world: &mut VoxelWorld, pos: Point3i) {
        let shape = self.shape;
        for level in self.levels.iter_mut() {
            level.minimum = level.target_minimum(pos, shape);
            world.add_updated_region(level.level, level.window(shape));
        }
    }

    /// Advances every window toward the viewer at `pos` as far as resident data allows, then applies the world's updated
    /// regions.
    pub fn synchronize(
        &mut self,
        terrain: &mut Terrain,
        pos: Point3i,
        mut renderer: impl GridRenderer,
    ) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();
        let shape = self.shape;

        for grid_level in self.levels.iter_mut() {
            let level = grid_level.level;
            let mut missing = grid_level.missing(pos, shape);
            if missing == Point3i::ZERO {
                continue;
            }

            if Axis3::ALL
                .iter()
                .any(|a| missing.axis_component(*a).abs() >= shape.axis_component(*a))
            {
                // None of the resident voxels are reusable.
                grid_level.minimum = grid_level.target_minimum(pos, shape);
                let window = grid_level.window(shape);
                renderer.recenter(level, &window);
                terrain.world_mut().add_updated_region(level, window);
                report.levels_recentered += 1;
                debug!(level, ?window, "recentered grid level");
                continue;
            }

            for face in BoxFace::ALL.iter() {
                let axis = face.axis();
                while missing.axis_component(axis) * face.sign() > 0 {
                    let slice = face_slice(&grid_level.window(shape), *face);
                    if !is_region_available(&*terrain, level, &slice) {
                        trace!(level, ?face, ?slice, "slice not resident yet");
                        report.faces_deferred += 1;
                        break;
                    }
                    let voxels = terrain.world_mut().get_region(level, &slice)?;
                    renderer.append_slice(level, *face, &voxels);
                    grid_level.minimum += face.normal();
                    *missing.axis_component_mut(axis) -= face.sign();
                    report.slices_appended += 1;
                }
            }
        }

        self.apply_updated_regions(terrain, &mut renderer, &mut report)?;

        Ok(report)
    }

    /// Copies every resident updated region into the renderer. A region that is only partly resident is split along chunk
    /// boundaries and the missing pieces are queued again for the next frame. Regions outside of their level's window are
    /// dropped.
    fn apply_updated_regions(
        &self,
        terrain: &mut Terrain,
        mut renderer: impl GridRenderer,
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let mut deferred = Vec::new();
        let num_regions = terrain.world().num_updated_regions();
        for _ in 0..num_regions {
            let (level, extent) = match terrain.world_mut().next_updated_region() {
                Some(region) => region,
                None => break,
            };
            let window = match self.window(level) {
                Some(window) => window,
                None => continue,
            };
            let clipped = extent.intersection(&window);
            if clipped.is_empty() {
                continue;
            }

            if is_region_available(&*terrain, level, &clipped) {
                update_sub_region(terrain, &mut renderer, level, &window, &clipped)?;
                report.regions_updated += 1;
                continue;
            }

            let indexer = terrain.indexer();
            let pieces: Vec<Extent3i> = indexer
                .chunks_for_extent(level, &clipped)
                .map(|key| clipped.intersection(&indexer.chunk_extent(key)))
                .collect();
            for piece in pieces {
                if is_region_available(&*terrain, level, &piece) {
                    update_sub_region(terrain, &mut renderer, level, &window, &piece)?;
                    report.regions_updated += 1;
                } else {
                    deferred.push((level, piece));
                }
            }
        }

        report.regions_deferred = deferred.len();
        for (level, extent) in deferred {
            terrain.world_mut().add_updated_region(level, extent);
        }

        Ok(())
    }
}

fn update_sub_region(
    terrain: &mut Terrain,
    mut renderer: impl GridRenderer,
    level: u8,
    window: &Extent3i,
    extent: &Extent3i,
) -> SyncResult<()> {
    let voxels = terrain.world_mut().get_region(level, extent)?;
    renderer.update_sub_region(level, &(*extent - window.minimum), &voxels);

    Ok(())
}

/// The window of `level`, in voxel coordinates of that level, for a viewer at LOD0 position `pos`.
///
/// The window of a coarser level always contains the window of every finer level (both taken to LOD0), so the coarsest
/// window bounds everything the grid can ask for.
pub fn target_window(pos: Point3i, level: u8, shape: Point3i) -> Extent3i {
    Extent3i::from_center_and_shape(pos >> level as i32, shape)
}

/// The one voxel thick slice just outside of `window` on `face`.
pub fn face_slice(window: &Extent3i, face: BoxFace) -> Extent3i {
    let axis = face.axis();
    let mut minimum = window.minimum;
    let mut shape = window.shape;
    *minimum.axis_component_mut(axis) += if face.sign() > 0 {
        shape.axis_component(axis)
    } else {
        -1
    };
    *shape.axis_component_mut(axis) = 1;

    Extent3i::from_min_and_shape(minimum, shape)
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

    use voxel_stream_storage::{ChunkKey, NodeStatus, TreeLayout, WorldDescriptor};

    use pretty_assertions::assert_eq;
    use std::path::Path;

    const DESC: WorldDescriptor = WorldDescriptor {
        chunk_size: 4,
        n_lod: 2,
    };

    #[derive(Debug, Eq, PartialEq)]
    enum Call {
        Append(u8, BoxFace, usize),
        Update(u8, Extent3i, usize),
        Recenter(u8, Extent3i),
    }

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<Call>,
    }

    impl GridRenderer for RecordingRenderer {
        fn append_slice(&mut self, level: u8, face: BoxFace, voxels: &[u8]) {
            self.calls.push(Call::Append(level, face, voxels.len()));
        }

        fn update_sub_region(&mut self, level: u8, local_extent: &Extent3i, voxels: &[u8]) {
            assert_eq!(local_extent.num_points(), voxels.len());
            self.calls.push(Call::Update(level, *local_extent, voxels.len()));
        }

        fn recenter(&mut self, level: u8, window: &Extent3i) {
            self.calls.push(Call::Recenter(level, *window));
        }
    }

    /// Every tree in [-16, 16)^3 is resident and full.
    fn resident_terrain(dir: &Path) -> Terrain {
        let (world, _) = VoxelWorld::open(dir, DESC, 64).unwrap();
        let mut terrain = Terrain::new(world, 1 << 12);
        let extent = Extent3i::from_min_and_shape(Point3i::fill(-16), Point3i::fill(32));
        let trees = terrain.world_mut().fetch_trees(0, &extent).unwrap();
        let layout = TreeLayout::uniform(2, NodeStatus::Full);
        for tree in trees {
            terrain.world_mut().insert_tree(tree, layout.clone());
            terrain.trees_mut().mark_available(tree).unwrap();
        }
        for level in 0..2 {
            let at_level = terrain.indexer().extent_from_lod0(level, &extent);
            terrain.query_chunks_in(level, &at_level).unwrap();
        }

        terrain
    }

    fn lod0_chunks_at_x(terrain: &Terrain, x: i32) -> Vec<ChunkKey> {
        let extent = Extent3i::from_min_and_shape(PointN([x, -16, -16]), PointN([4, 32, 32]));

        terrain.indexer().chunks_for_extent(0, &extent).collect()
    }

    #[test]
    fn face_slices_sit_just_outside_the_window() {
        let window = Extent3i::from_min_and_shape(PointN([-2, 0, 10]), PointN([4, 5, 6]));

        assert_eq!(
            face_slice(&window, BoxFace::PosX),
            Extent3i::from_min_and_shape(PointN([2, 0, 10]), PointN([1, 5, 6]))
        );
        assert_eq!(
            face_slice(&window, BoxFace::NegY),
            Extent3i::from_min_and_shape(PointN([-2, -1, 10]), PointN([4, 1, 6]))
        );
        assert_eq!(
            face_slice(&window, BoxFace::PosZ),
            Extent3i::from_min_and_shape(PointN([-2, 0, 16]), PointN([4, 5, 1]))
        );
    }

    #[test]
    fn placed_windows_are_filled_once_resident() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(4), 2);
        let mut renderer = RecordingRenderer::default();

        grid.place(terrain.world_mut(), Point3i::ZERO);
        let report = grid
            .synchronize(&mut terrain, Point3i::ZERO, &mut renderer)
            .unwrap();

        assert_eq!(report.regions_updated, 2);
        let whole = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(4));
        assert_eq!(
            renderer.calls,
            vec![Call::Update(0, whole, 64), Call::Update(1, whole, 64)]
        );
    }

    #[test]
    fn moving_appends_slices_per_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(4), 2);
        grid.place(terrain.world_mut(), Point3i::ZERO);
        grid.synchronize(&mut terrain, Point3i::ZERO, &mut RecordingRenderer::default())
            .unwrap();

        let mut renderer = RecordingRenderer::default();
        let report = grid
            .synchronize(&mut terrain, PointN([2, -1, 0]), &mut renderer)
            .unwrap();

        // Level 0 moves +2 in X and -1 in Y. Level 1 sees the viewer at (1, -1, 0).
        assert_eq!(
            renderer.calls,
            vec![
                Call::Append(0, BoxFace::PosX, 16),
                Call::Append(0, BoxFace::PosX, 16),
                Call::Append(0, BoxFace::NegY, 16),
                Call::Append(1, BoxFace::PosX, 16),
                Call::Append(1, BoxFace::NegY, 16),
            ]
        );
        assert_eq!(report.slices_appended, 5);
        assert_eq!(grid.window(0).unwrap().minimum, PointN([0, -3, -2]));
        assert_eq!(grid.window(1).unwrap().minimum, PointN([-1, -3, -2]));
    }

    #[test]
    fn unavailable_slices_wait_for_a_later_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(4), 1);
        grid.place(terrain.world_mut(), Point3i::ZERO);
        grid.synchronize(&mut terrain, Point3i::ZERO, &mut RecordingRenderer::default())
            .unwrap();
        let blocked = lod0_chunks_at_x(&terrain, 4);
        for key in blocked.iter() {
            terrain.chunks_mut().mark_unavailable_if_pruned(key);
        }

        // Slices at x = 2, 3 are resident, x = 4 is not.
        let pos = PointN([3, 0, 0]);
        let mut renderer = RecordingRenderer::default();
        let report = grid.synchronize(&mut terrain, pos, &mut renderer).unwrap();
        assert_eq!(report.slices_appended, 2);
        assert_eq!(report.faces_deferred, 1);
        assert_eq!(grid.window(0).unwrap().minimum.x(), 0);

        for key in blocked {
            terrain.chunks_mut().mark_available(key).unwrap();
        }
        let report = grid
            .synchronize(&mut terrain, pos, &mut RecordingRenderer::default())
            .unwrap();
        assert_eq!(report.slices_appended, 1);
        assert_eq!(grid.window(0).unwrap().minimum.x(), 1);
    }

    #[test]
    fn large_jumps_recenter() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(4), 1);
        grid.place(terrain.world_mut(), Point3i::ZERO);
        grid.synchronize(&mut terrain, Point3i::ZERO, &mut RecordingRenderer::default())
            .unwrap();

        let mut renderer = RecordingRenderer::default();
        let report = grid
            .synchronize(&mut terrain, PointN([0, 0, 9]), &mut renderer)
            .unwrap();

        let window = Extent3i::from_min_and_shape(PointN([-2, -2, 7]), Point3i::fill(4));
        assert_eq!(report.levels_recentered, 1);
        assert_eq!(
            renderer.calls,
            vec![
                Call::Recenter(0, window),
                Call::Update(0, Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(4)), 64),
            ]
        );
    }

    #[test]
    fn partly_resident_regions_are_split_and_deferred() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(8), 1);
        grid.place(terrain.world_mut(), Point3i::ZERO);
        // The window spans [-4, 4) on each axis, so 8 chunks. Hold back the 4 with x = 0.
        let blocked = lod0_chunks_at_x(&terrain, 0);
        for key in blocked.iter() {
            terrain.chunks_mut().mark_unavailable_if_pruned(key);
        }

        let report = grid
            .synchronize(&mut terrain, Point3i::ZERO, &mut RecordingRenderer::default())
            .unwrap();
        assert_eq!(report.regions_updated, 4);
        assert_eq!(report.regions_deferred, 4);
        assert_eq!(terrain.world().num_updated_regions(), 4);

        for key in blocked {
            terrain.chunks_mut().mark_available(key).unwrap();
        }
        let mut renderer = RecordingRenderer::default();
        let report = grid
            .synchronize(&mut terrain, Point3i::ZERO, &mut renderer)
            .unwrap();
        assert_eq!(report.regions_updated, 4);
        assert!(renderer
            .calls
            .iter()
            .all(|c| matches!(c, Call::Update(0, e, 64) if e.minimum.x() == 4)));
    }

    #[test]
    fn updated_regions_outside_the_window_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain = resident_terrain(dir.path());
        let mut grid = GridSync::new(Point3i::fill(4), 1);
        grid.place(terrain.world_mut(), Point3i::ZERO);
        terrain
            .world_mut()
            .add_updated_region(0, Extent3i::from_min_and_shape(Point3i::fill(10), Point3i::ONES));
        let edited = Extent3i::from_min_and_shape(Point3i::fill(1), Point3i::fill(3));
        terrain.world_mut().add_updated_region(0, edited);

        let mut renderer = RecordingRenderer::default();
        grid.synchronize(&mut terrain, Point3i::ZERO, &mut renderer)
            .unwrap();

        assert_eq!(renderer.calls.len(), 2);
        assert_eq!(
            renderer.calls[1],
            Call::Update(
                0,
                Extent3i::from_min_and_shape(Point3i::fill(3), Point3i::ONES),
                1
            )
        );
        assert_eq!(terrain.world().num_updated_regions(), 0);
    }
}
