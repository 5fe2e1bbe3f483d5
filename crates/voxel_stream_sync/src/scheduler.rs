use crate::protocol::{self, Command, Packet};
use crate::terrain::Terrain;
use crate::transport::Transport;
use crate::SyncResult;

use voxel_stream_storage::{ChunkKey, TreeKey, TreeLayout};

use tracing::{debug, error, trace, warn};

/// The two kinds of downloadable entities. Each kind has its own queue and its own concurrency bound.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EntityKind {
    Tree,
    Chunk,
}

/// What `DownloadScheduler::handle_packet` did with a packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PacketOutcome {
    /// The payload was applied and the entity, if any, became available.
    Accepted,
    /// The entity was not being downloaded, or the command is not a response at all. Nothing changed.
    Unexpected,
    /// The payload could not be decoded or does not fit the world's dimensions. Nothing changed.
    Malformed,
    /// The payload was fine but could not be persisted. The entity stays in flight.
    Discarded,
    /// The peer has nothing for the entity. It is marked available anyway, on the assumption that the peer will push the data
    /// once it exists.
    AssumedAvailable,
}

/// Pulls entities from the request queues, at most `max_downloads` in flight per kind, and applies the peer's responses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DownloadScheduler {
    max_downloads: usize,
}

impl DownloadScheduler {
    pub fn new(max_downloads: usize) -> Self {
        Self { max_downloads }
    }

    pub fn max_downloads(&self) -> usize {
        self.max_downloads
    }

    /// Sends the request for the oldest queued entity of `kind`, if a download slot is free. Returns `true` iff a request was
    /// sent. Never blocks.
    pub fn schedule_next(
        &self,
        kind: EntityKind,
        terrain: &mut Terrain,
        mut transport: impl Transport,
    ) -> SyncResult<bool> {
        match kind {
            EntityKind::Tree => {
                let key = match terrain.trees_mut().begin_next_download(self.max_downloads) {
                    Some(key) => key,
                    None => return Ok(false),
                };
                trace!(?key, "requesting tree");
                transport.send(Command::QueryTree, &protocol::encode_tree_request(key))?;
            }
            EntityKind::Chunk => {
                let key = match terrain.chunks_mut().begin_next_download(self.max_downloads) {
                    Some(key) => key,
                    None => return Ok(false),
                };
                let local = match terrain.world().chunk_checksum(key) {
                    Ok(local) => local,
                    Err(e) => {
                        error!(
                            ?key,
                            "failed to checksum local chunk file, requesting all of it: {}", e
                        );
                        None
                    }
                };
                trace!(?key, has_checksum = local.is_some(), "requesting chunk");
                transport.send(
                    Command::QueryChunk,
                    &protocol::encode_chunk_request(key, local.as_ref()),
                )?;
            }
        }

        Ok(true)
    }

    /// One frame's worth of scheduling: at most one tree request and one chunk request. Returns the number of requests sent.
    pub fn advance(
        &self,
        terrain: &mut Terrain,
        mut transport: impl Transport,
    ) -> SyncResult<usize> {
        let mut sent = 0;
        if self.schedule_next(EntityKind::Tree, terrain, &mut transport)? {
            sent += 1;
        }
        if self.schedule_next(EntityKind::Chunk, terrain, &mut transport)? {
            sent += 1;
        }

        Ok(sent)
    }

    /// Applies one inbound packet. Anomalies in the packet are reported through the returned `PacketOutcome`; only failures of
    /// this client (like running out of status records) are errors.
    pub fn handle_packet(
        &self,
        terrain: &mut Terrain,
        packet: &Packet,
    ) -> SyncResult<PacketOutcome> {
        let outcome = match packet.command {
            Command::QueryTree => self.handle_tree(terrain, &packet.payload)?,
            Command::NoTree => self.handle_no_tree(terrain, &packet.payload),
            Command::QueryChunk => self.handle_chunk(terrain, &packet.payload),
            Command::NoChunk => self.handle_no_chunk(terrain, &packet.payload),
            Command::EditRegion => self.handle_edit(terrain, &packet.payload),
            Command::ChunkSize | Command::NumLod => {
                warn!(command = ?packet.command, "unexpected packet outside of the handshake");
                PacketOutcome::Unexpected
            }
        };

        Ok(outcome)
    }

    fn decode_tree(&self, terrain: &Terrain, payload: &[u8]) -> Result<TreeKey, PacketOutcome> {
        let (key, _) = protocol::decode_tree_header(payload).map_err(|e| {
            warn!("malformed tree packet: {}", e);
            PacketOutcome::Malformed
        })?;
        if !terrain.trees().is_downloading(&key) {
            warn!(?key, "unexpected packet for a tree that is not being downloaded");
            return Err(PacketOutcome::Unexpected);
        }

        Ok(key)
    }

    fn handle_tree(&self, terrain: &mut Terrain, payload: &[u8]) -> SyncResult<PacketOutcome> {
        let key = match self.decode_tree(terrain, payload) {
            Ok(key) => key,
            Err(outcome) => return Ok(outcome),
        };
        let layout_bytes = &payload[protocol::TREE_HEADER_LEN..];
        let layout = match TreeLayout::from_bytes(terrain.n_lod(), layout_bytes) {
            Ok(layout) => layout,
            Err(e) => {
                warn!(?key, "malformed tree layout: {}", e);
                return Ok(PacketOutcome::Malformed);
            }
        };

        let world = terrain.world_mut();
        world.insert_tree(key, layout);
        if let Err(e) = world.save_tree(key) {
            error!(?key, "failed to save tree: {}", e);
            return Ok(PacketOutcome::Discarded);
        }
        terrain.trees_mut().finish_download(&key);
        let queued = terrain.queue_tree_chunks(key)?;
        debug!(?key, queued, "tree available");

        Ok(PacketOutcome::Accepted)
    }

    fn handle_no_tree(&self, terrain: &mut Terrain, payload: &[u8]) -> PacketOutcome {
        let key = match self.decode_tree(terrain, payload) {
            Ok(key) => key,
            Err(outcome) => return outcome,
        };
        terrain.trees_mut().finish_download(&key);
        debug!(?key, "peer has no such tree; assuming it is available");

        PacketOutcome::AssumedAvailable
    }

    fn decode_chunk<'a>(
        &self,
        terrain: &Terrain,
        payload: &'a [u8],
    ) -> Result<(ChunkKey, &'a [u8]), PacketOutcome> {
        let (key, body) = protocol::decode_chunk_header(payload).map_err(|e| {
            warn!("malformed chunk packet: {}", e);
            PacketOutcome::Malformed
        })?;
        if !terrain.indexer().chunk_key_is_valid(key) {
            warn!(?key, "chunk packet does not fit the world's dimensions");
            return Err(PacketOutcome::Malformed);
        }
        if !terrain.chunks().is_downloading(&key) {
            warn!(?key, "unexpected packet for a chunk that is not being downloaded");
            return Err(PacketOutcome::Unexpected);
        }

        Ok((key, body))
    }

    fn handle_chunk(&self, terrain: &mut Terrain, payload: &[u8]) -> PacketOutcome {
        let (key, voxels) = match self.decode_chunk(terrain, payload) {
            Ok(decoded) => decoded,
            Err(outcome) => return outcome,
        };
        if voxels.is_empty() {
            trace!(?key, "local chunk file is up to date");
        } else {
            let expected = terrain.indexer().chunk_volume();
            if voxels.len() != expected {
                warn!(?key, expected, actual = voxels.len(), "chunk payload has the wrong size");
                return PacketOutcome::Malformed;
            }
            if let Err(e) = terrain.world_mut().write_chunk_file(key, voxels) {
                error!(?key, "failed to save chunk: {}", e);
                return PacketOutcome::Discarded;
            }
        }
        terrain.chunks_mut().finish_download(&key);

        PacketOutcome::Accepted
    }

    fn handle_no_chunk(&self, terrain: &mut Terrain, payload: &[u8]) -> PacketOutcome {
        let (key, _) = match self.decode_chunk(terrain, payload) {
            Ok(decoded) => decoded,
            Err(outcome) => return outcome,
        };
        terrain.chunks_mut().finish_download(&key);
        debug!(?key, "peer has no such chunk; assuming it is available");

        PacketOutcome::AssumedAvailable
    }

    fn handle_edit(&self, terrain: &mut Terrain, payload: &[u8]) -> PacketOutcome {
        let (extent, voxels) = match protocol::decode_edit(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("malformed edit packet: {}", e);
                return PacketOutcome::Malformed;
            }
        };
        let world = terrain.world_mut();
        let applied = world
            .set_region(&extent, voxels)
            .and_then(|()| world.generate_lods(&extent));
        if let Err(e) = applied {
            error!(?extent, "failed to apply edit: {}", e);
            return PacketOutcome::Discarded;
        }
        debug!(?extent, "applied edit");

        PacketOutcome::Accepted
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝
