//! An in-process terrain authority.
//!
//! `LoopbackPeer` answers requests the way a real server would, but from a voxel function evaluated on demand, and delivers its
//! replies through the same `Transport` interface the client uses for sockets. It is meant for tests and demos.
//!
//! ```
//! # use voxel_stream_core::prelude::*;
//! # use voxel_stream_storage::WorldDescriptor;
//! # use voxel_stream_sync::prelude::*;
//! # use std::time::Duration;
//! let mut peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), |p: Point3i| if p.y() < 0 { 255 } else { 0 });
//! peer.send(Command::ChunkSize, &[]).unwrap();
//! let reply = peer.poll(Duration::ZERO).unwrap().unwrap();
//! assert_eq!(reply.command, Command::ChunkSize);
//! assert_eq!(decode_scalar(&reply.payload).unwrap(), 4);
//! ```

use crate::protocol::{self, Command, Packet};
use crate::transport::Transport;
use crate::TransportError;

use voxel_stream_core::prelude::*;
use voxel_stream_storage::{
    checksum, ChunkKey, LodIndexer, NodeStatus, SmallKeyHashMap, TreeKey, TreeLayout,
    WorldDescriptor,
};

use std::collections::VecDeque;
use std::time::Duration;
use tracing::warn;

pub struct LoopbackPeer {
    descriptor: WorldDescriptor,
    indexer: LodIndexer,
    voxels: Box<dyn Fn(Point3i) -> u8>,
    edits: SmallKeyHashMap<Point3i, u8>,
    missing_trees: Vec<TreeKey>,
    holding: bool,
    held: VecDeque<Packet>,
    outbox: VecDeque<Packet>,
    received: Vec<Packet>,
    connected: bool,
}

impl LoopbackPeer {
    /// A peer serving a world of the given dimensions whose LOD0 voxel at `p` is `voxels(p)`.
    pub fn new(descriptor: WorldDescriptor, voxels: impl Fn(Point3i) -> u8 + 'static) -> Self {
        Self {
            descriptor,
            indexer: LodIndexer::new(descriptor),
            voxels: Box::new(voxels),
            edits: SmallKeyHashMap::default(),
            missing_trees: Vec::new(),
            holding: false,
            held: VecDeque::new(),
            outbox: VecDeque::new(),
            received: Vec::new(),
            connected: true,
        }
    }

    /// The peer will answer `NoTree` for `key`.
    pub fn with_missing_tree(mut self, key: TreeKey) -> Self {
        self.missing_trees.push(key);

        self
    }

    pub fn descriptor(&self) -> WorldDescriptor {
        self.descriptor
    }

    /// While holding, requests are stored until `respond_next` or `respond_all` is called.
    pub fn set_holding(&mut self, holding: bool) {
        self.holding = holding;
    }

    pub fn num_held(&self) -> usize {
        self.held.len()
    }

    /// Answers the oldest held request. Returns `false` if none was held.
    pub fn respond_next(&mut self) -> bool {
        match self.held.pop_front() {
            Some(request) => {
                self.respond(&request);
                true
            }
            None => false,
        }
    }

    /// Answers every held request, returning how many there were.
    pub fn respond_all(&mut self) -> usize {
        let mut answered = 0;
        while self.respond_next() {
            answered += 1;
        }

        answered
    }

    /// Every packet the client has sent, oldest first.
    pub fn received(&self) -> &[Packet] {
        &self.received
    }

    /// Delivers `packet` to the client as if the peer had sent it unprompted.
    pub fn push(&mut self, packet: Packet) {
        self.outbox.push_back(packet);
    }

    /// From now on every send and every poll with nothing left to deliver fails.
    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    /// The LOD0 voxel at `p`, including edits.
    pub fn voxel(&self, p: Point3i) -> u8 {
        self.edits.get(&p).copied().unwrap_or_else(|| (self.voxels)(p))
    }

    /// The voxels of the chunk at `key`. Coarser levels sample the LOD0 voxel at the minimum corner of each coarse voxel.
    pub fn chunk_voxels(&self, key: ChunkKey) -> Vec<u8> {
        let shift = key.lod as i32;

        self.indexer
            .chunk_extent(key)
            .iter_points()
            .map(|p| self.voxel(p << shift))
            .collect()
    }

    /// The layout of the tree at `key`, as it would be sent over the wire.
    pub fn tree_layout(&self, key: TreeKey) -> TreeLayout {
        TreeLayout::from_fn(self.descriptor.n_lod, |level, offset| {
            NodeStatus::classify(&self.chunk_voxels(self.indexer.chunk_in_tree(key, level, offset)))
        })
    }

    fn respond(&mut self, request: &Packet) {
        let reply = match request.command {
            Command::ChunkSize => Packet::new(
                Command::ChunkSize,
                protocol::encode_scalar(self.descriptor.chunk_size),
            ),
            Command::NumLod => Packet::new(
                Command::NumLod,
                protocol::encode_scalar(self.descriptor.n_lod as i32),
            ),
            Command::QueryTree => match protocol::decode_tree_header(&request.payload) {
                Ok((key, _)) if self.missing_trees.contains(&key) => {
                    Packet::new(Command::NoTree, protocol::encode_tree_request(key))
                }
                Ok((key, _)) => Packet::new(
                    Command::QueryTree,
                    protocol::encode_tree_response(key, &self.tree_layout(key).to_bytes()),
                ),
                Err(e) => {
                    warn!("peer dropping malformed tree request: {}", e);
                    return;
                }
            },
            Command::QueryChunk => match protocol::decode_chunk_request(&request.payload) {
                Ok(req) if !self.indexer.chunk_key_is_valid(req.key) => Packet::new(
                    Command::NoChunk,
                    protocol::encode_chunk_response(req.key, &[]),
                ),
                Ok(req) => {
                    let voxels = self.chunk_voxels(req.key);
                    let body: &[u8] = if req.checksum == Some(checksum(&voxels)) {
                        &[]
                    } else {
                        &voxels
                    };
                    Packet::new(
                        Command::QueryChunk,
                        protocol::encode_chunk_response(req.key, body),
                    )
                }
                Err(e) => {
                    warn!("peer dropping malformed chunk request: {}", e);
                    return;
                }
            },
            Command::EditRegion => match protocol::decode_edit(&request.payload) {
                Ok((extent, voxels)) => {
                    for (p, v) in extent.iter_points().zip(voxels.iter()) {
                        self.edits.insert(p, *v);
                    }
                    Packet::new(Command::EditRegion, request.payload.clone())
                }
                Err(e) => {
                    warn!("peer dropping malformed edit: {}", e);
                    return;
                }
            },
            Command::NoTree | Command::NoChunk => {
                warn!(command = ?request.command, "peer ignoring a response-only command");
                return;
            }
        };
        self.outbox.push_back(reply);
    }
}

impl Transport for LoopbackPeer {
    fn send(&mut self, command: Command, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let request = Packet::new(command, payload.to_vec());
        self.received.push(request.clone());
        if self.holding {
            self.held.push_back(request);
        } else {
            self.respond(&request);
        }

        Ok(())
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<Packet>, TransportError> {
        match self.outbox.pop_front() {
            Some(packet) => Ok(Some(packet)),
            None if self.connected => Ok(None),
            None => Err(TransportError::Disconnected),
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

    fn ground(p: Point3i) -> u8 {
        if p.y() < 0 {
            255
        } else {
            0
        }
    }

    #[test]
    fn tree_layout_classifies_every_node() {
        let peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), ground);
        let layout = peer.tree_layout(TreeKey::new(PointN([0, -8, 0])));

        assert_eq!(layout.get(0, PointN([0, 0, 0])), Some(NodeStatus::Full));
        assert_eq!(layout.get(1, Point3i::ZERO), Some(NodeStatus::Full));
        let above = peer.tree_layout(TreeKey::new(Point3i::ZERO));
        assert_eq!(above.get(1, Point3i::ZERO), Some(NodeStatus::Empty));
    }

    #[test]
    fn matching_checksum_gets_header_only_reply() {
        let mut peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), |p: Point3i| p.x() as u8);
        let key = ChunkKey::new(0, Point3i::ZERO);
        let voxels = peer.chunk_voxels(key);

        peer.send(Command::QueryChunk, &protocol::encode_chunk_request(key, None))
            .unwrap();
        peer.send(
            Command::QueryChunk,
            &protocol::encode_chunk_request(key, Some(&checksum(&voxels))),
        )
        .unwrap();

        let full = peer.poll(Duration::ZERO).unwrap().unwrap();
        assert_eq!(full.payload.len(), protocol::CHUNK_HEADER_LEN + 64);
        let ack = peer.poll(Duration::ZERO).unwrap().unwrap();
        assert_eq!(ack.payload.len(), protocol::CHUNK_HEADER_LEN);
    }

    #[test]
    fn held_requests_wait_for_respond_next() {
        let mut peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), ground)
            .with_missing_tree(TreeKey::new(Point3i::ZERO));
        peer.set_holding(true);
        peer.send(Command::QueryTree, &protocol::encode_tree_request(TreeKey::new(Point3i::ZERO)))
            .unwrap();

        assert_eq!(peer.poll(Duration::ZERO).unwrap(), None);
        assert!(peer.respond_next());
        assert_eq!(peer.poll(Duration::ZERO).unwrap().unwrap().command, Command::NoTree);
        assert!(!peer.respond_next());
    }

    #[test]
    fn edits_are_applied_and_broadcast() {
        let mut peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), ground);
        let extent = Extent3i::from_min_and_shape(PointN([0, 5, 0]), Point3i::ONES);
        let payload = protocol::encode_edit(&extent, &[42]).unwrap();

        peer.send(Command::EditRegion, &payload).unwrap();

        assert_eq!(peer.voxel(PointN([0, 5, 0])), 42);
        assert_eq!(
            peer.poll(Duration::ZERO).unwrap(),
            Some(Packet::new(Command::EditRegion, payload))
        );
    }

    #[test]
    fn disconnected_peer_fails() {
        let mut peer = LoopbackPeer::new(WorldDescriptor::new(4, 2), ground);
        peer.disconnect();

        assert!(matches!(
            peer.send(Command::ChunkSize, &[]),
            Err(TransportError::Disconnected)
        ));
        assert!(peer.poll(Duration::ZERO).is_err());
    }
}
