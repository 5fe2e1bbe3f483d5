//! The octree side-data a tree payload carries: one status byte per node, for every level.
//!
//! Levels are stored from finest (level 0) to coarsest (level `n_lod - 1`). Within a level the nodes are in row-major order
//! (X fastest, then Y, then Z) over the tree's `2^(n_lod - 1 - level)` chunks per axis. A tree with `n_lod` levels therefore
//! serializes to `sum(8^k for k in 0..n_lod)` bytes.

use crate::{StoreError, StoreResult};

use voxel_stream_core::prelude::*;

/// What is known about a node's voxels before its chunk file is downloaded.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum NodeStatus {
    /// Every voxel is 0.
    Empty = 0,
    /// Every voxel is 255.
    Full = 1,
    /// The voxels vary; they only exist in the chunk file.
    Partial = 2,
}

impl NodeStatus {
    pub const EMPTY_VOXEL: u8 = 0;
    pub const FULL_VOXEL: u8 = 255;

    pub fn from_u8(byte: u8) -> StoreResult<Self> {
        match byte {
            0 => Ok(NodeStatus::Empty),
            1 => Ok(NodeStatus::Full),
            2 => Ok(NodeStatus::Partial),
            other => Err(StoreError::InvalidNodeStatus(other)),
        }
    }

    /// Returns `true` iff all voxels of the node are known without downloading its chunk.
    #[inline]
    pub fn is_uniform(&self) -> bool {
        self.uniform_voxel().is_some()
    }

    /// The value of every voxel in a uniform node.
    #[inline]
    pub fn uniform_voxel(&self) -> Option<u8> {
        match self {
            NodeStatus::Empty => Some(Self::EMPTY_VOXEL),
            NodeStatus::Full => Some(Self::FULL_VOXEL),
            NodeStatus::Partial => None,
        }
    }

    /// The status a node would have if it held exactly `voxels`.
    pub fn classify(voxels: &[u8]) -> Self {
        if voxels.iter().all(|v| *v == Self::EMPTY_VOXEL) {
            NodeStatus::Empty
        } else if voxels.iter().all(|v| *v == Self::FULL_VOXEL) {
            NodeStatus::Full
        } else {
            NodeStatus::Partial
        }
    }
}

/// The node statuses of a whole tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TreeLayout {
    n_lod: u8,
    statuses: Vec<NodeStatus>,
}

impl TreeLayout {
    /// Number of nodes along one axis at `level`.
    #[inline]
    fn nodes_per_axis(n_lod: u8, level: u8) -> usize {
        1 << (n_lod - 1 - level)
    }

    fn nodes_at_level(n_lod: u8, level: u8) -> usize {
        Self::nodes_per_axis(n_lod, level).pow(3)
    }

    /// The serialized length of a layout with `n_lod` levels.
    pub fn expected_len(n_lod: u8) -> usize {
        (0..n_lod).map(|l| Self::nodes_at_level(n_lod, l)).sum()
    }

    fn level_offset(&self, level: u8) -> usize {
        (0..level).map(|l| Self::nodes_at_level(self.n_lod, l)).sum()
    }

    /// A layout where every node has the same `status`.
    pub fn uniform(n_lod: u8, status: NodeStatus) -> Self {
        Self {
            n_lod,
            statuses: vec![status; Self::expected_len(n_lod)],
        }
    }

    /// A layout where the node at `offset` (in chunk units within the tree) of each `level` has status `f(level, offset)`.
    pub fn from_fn(n_lod: u8, mut f: impl FnMut(u8, Point3i) -> NodeStatus) -> Self {
        let mut statuses = Vec::with_capacity(Self::expected_len(n_lod));
        for level in 0..n_lod {
            let n = Self::nodes_per_axis(n_lod, level) as i32;
            let nodes = Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(n));
            for offset in nodes.iter_points() {
                statuses.push(f(level, offset));
            }
        }

        Self { n_lod, statuses }
    }

    pub fn from_bytes(n_lod: u8, bytes: &[u8]) -> StoreResult<Self> {
        let expected = Self::expected_len(n_lod);
        if bytes.len() != expected {
            return Err(StoreError::LayoutLength {
                expected,
                actual: bytes.len(),
            });
        }
        let statuses = bytes
            .iter()
            .map(|b| NodeStatus::from_u8(*b))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Self { n_lod, statuses })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.statuses.iter().map(|s| *s as u8).collect()
    }

    pub fn n_lod(&self) -> u8 {
        self.n_lod
    }

    fn index(&self, level: u8, offset: Point3i) -> Option<usize> {
        if level >= self.n_lod {
            return None;
        }
        let n = Self::nodes_per_axis(self.n_lod, level) as i32;
        if !Extent3i::from_min_and_shape(Point3i::ZERO, Point3i::fill(n)).contains(offset) {
            return None;
        }
        let local = (offset.x() + n * (offset.y() + n * offset.z())) as usize;

        Some(self.level_offset(level) + local)
    }

    /// The status of the node at `offset` (in chunk units within the tree) of `level`.
    pub fn get(&self, level: u8, offset: Point3i) -> Option<NodeStatus> {
        self.index(level, offset).map(|i| self.statuses[i])
    }

    /// Overwrites the status of one node. Returns `false` if the node does not exist.
    pub fn set(&mut self, level: u8, offset: Point3i, status: NodeStatus) -> bool {
        if let Some(i) = self.index(level, offset) {
            self.statuses[i] = status;

            true
        } else {
            false
        }
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

    use pretty_assertions::assert_eq;

    #[test]
    fn expected_len_sums_octree_levels() {
        assert_eq!(TreeLayout::expected_len(1), 1);
        assert_eq!(TreeLayout::expected_len(3), 64 + 8 + 1);
    }

    #[test]
    fn from_fn_orders_levels_and_nodes() {
        let layout = TreeLayout::from_fn(2, |level, offset| {
            if level == 0 && offset == PointN([1, 0, 0]) {
                NodeStatus::Partial
            } else {
                NodeStatus::Empty
            }
        });
        let bytes = layout.to_bytes();

        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[1], 2);
        assert_eq!(layout.get(0, PointN([1, 0, 0])), Some(NodeStatus::Partial));
        assert_eq!(layout.get(1, PointN([0, 0, 0])), Some(NodeStatus::Empty));
        assert_eq!(layout.get(1, PointN([1, 0, 0])), None);
        assert_eq!(TreeLayout::from_bytes(2, &bytes).unwrap(), layout);
    }

    #[test]
    fn from_bytes_rejects_bad_input() {
        assert!(matches!(
            TreeLayout::from_bytes(2, &[0; 8]),
            Err(StoreError::LayoutLength {
                expected: 9,
                actual: 8
            })
        ));
        assert!(matches!(
            TreeLayout::from_bytes(1, &[7]),
            Err(StoreError::InvalidNodeStatus(7))
        ));
    }

    #[test]
    fn classify_voxels() {
        assert_eq!(NodeStatus::classify(&[0, 0]), NodeStatus::Empty);
        assert_eq!(NodeStatus::classify(&[255, 255]), NodeStatus::Full);
        assert_eq!(NodeStatus::classify(&[0, 255]), NodeStatus::Partial);
    }
}
