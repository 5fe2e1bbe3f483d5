use crate::{SyncError, SyncResult};

use voxel_stream_core::prelude::*;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tuning knobs for a terrain session. Every field has a default, so a TOML file only needs to name what it changes.
///
/// ```
/// # use voxel_stream_sync::SyncConfig;
/// let config = SyncConfig::from_toml_str("max_downloads = 2\nserver_name = \"alpha\"").unwrap();
/// assert_eq!(config.max_downloads, 2);
/// assert_eq!(config.grid_shape, 128);
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of trees, and separately of chunks, that may be in flight at once.
    pub max_downloads: usize,
    /// Side length of the renderer's grid window on every level, in voxels of that level.
    pub grid_shape: i32,
    /// Side length of the cube around the viewer whose terrain is kept resident, in LOD0 voxels.
    pub view_distance: i32,
    /// Extra margin added to `view_distance`, so data arrives before it is needed.
    pub view_threshold: i32,
    pub terrain_root: PathBuf,
    pub server_name: String,
    pub world_prefix: String,
    /// Number of decoded chunk files kept in memory after each frame.
    pub max_cached_chunks: usize,
    /// Maximum number of status records per entity kind.
    pub max_tracked_entities: usize,
    pub handshake_timeout_ms: u64,
    /// How long a bootstrap drain may go without hearing from the peer.
    pub bootstrap_stall_timeout_ms: u64,
    /// How long a bootstrap drain waits for each packet.
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_downloads: 5,
            grid_shape: 128,
            view_distance: 128,
            view_threshold: 12,
            terrain_root: PathBuf::from("data/terrains"),
            server_name: "default".into(),
            world_prefix: "voxeldata".into(),
            max_cached_chunks: 256,
            max_tracked_entities: 1 << 20,
            handshake_timeout_ms: 10_000,
            bootstrap_stall_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl SyncConfig {
    pub fn from_toml_str(contents: &str) -> SyncResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| SyncError::Config(format!("failed to deserialize config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    pub fn load(path: &Path) -> SyncResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> SyncResult<()> {
        if self.max_downloads == 0 {
            return Err(SyncError::Config("max_downloads must be at least 1".into()));
        }
        if self.grid_shape <= 0 {
            return Err(SyncError::Config("grid_shape must be positive".into()));
        }
        if self.view_distance <= 0 || self.view_threshold < 0 {
            return Err(SyncError::Config(
                "view_distance must be positive and view_threshold non-negative".into(),
            ));
        }

        Ok(())
    }

    /// The directory holding this server's world.
    pub fn world_dir(&self) -> PathBuf {
        self.terrain_root
            .join(&self.server_name)
            .join(&self.world_prefix)
    }

    pub fn grid_shape(&self) -> Point3i {
        Point3i::fill(self.grid_shape)
    }

    /// The LOD0 cube around `center` whose trees and finest chunks are requested.
    pub fn view_extent(&self, center: Point3i) -> Extent3i {
        Extent3i::from_center_and_shape(
            center,
            Point3i::fill(self.view_distance + self.view_threshold),
        )
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn bootstrap_stall_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_stall_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
