//! Payload encoding for the packets exchanged with the terrain authority.
//!
//! Framing and demultiplexing by command id belong to the transport; this module only deals with payloads. Every integer is a
//! big-endian `i32`.
//!
//! | command       | request payload                         | response payload                                   |
//! |---------------|-----------------------------------------|----------------------------------------------------|
//! | `ChunkSize`   | empty                                   | `chunk_size`                                       |
//! | `NumLod`      | empty                                   | `n_lod`                                            |
//! | `QueryTree`   | `x y z`                                 | `x y z` + tree layout, or `NoTree` with `x y z`    |
//! | `QueryChunk`  | `level x y z` [+ SHA-256 of local file] | `level x y z` [+ voxels], or `NoChunk` with header |
//! | `EditRegion`  | `x y z w h d` + voxels                  | broadcast with the same payload                    |

use voxel_stream_core::prelude::*;
use voxel_stream_storage::{Checksum, ChunkKey, TreeKey};

use thiserror::Error;

pub const TREE_HEADER_LEN: usize = 12;
pub const CHUNK_HEADER_LEN: usize = 16;
pub const EDIT_HEADER_LEN: usize = 24;
pub const CHECKSUM_LEN: usize = 32;

/// Packet ids understood by the peer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Command {
    ChunkSize = 1,
    NumLod = 2,
    QueryTree = 3,
    QueryChunk = 4,
    NoTree = 5,
    NoChunk = 6,
    EditRegion = 7,
}

impl Command {
    pub fn from_u8(id: u8) -> Result<Self, ProtocolError> {
        Ok(match id {
            1 => Command::ChunkSize,
            2 => Command::NumLod,
            3 => Command::QueryTree,
            4 => Command::QueryChunk,
            5 => Command::NoTree,
            6 => Command::NoChunk,
            7 => Command::EditRegion,
            other => return Err(ProtocolError::UnknownCommand(other)),
        })
    }

    #[inline]
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// One demultiplexed inbound (or outbound) message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProtocolError {
    #[error("payload of {actual} bytes is shorter than the {expected} byte header")]
    Truncated { expected: usize, actual: usize },
    #[error("level {0} does not fit in a byte")]
    InvalidLevel(i32),
    #[error("extent holds {expected} voxels but {actual} bytes were given")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("unknown command id {0}")]
    UnknownCommand(u8),
    #[error("extent has a negative dimension: {0:?}")]
    NegativeExtent([i32; 3]),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[inline]
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Reads the `i`-th integer of `bytes`. The caller must have checked the length.
#[inline]
fn read_i32(bytes: &[u8], i: usize) -> i32 {
    let mut word = [0; 4];
    word.copy_from_slice(&bytes[4 * i..4 * (i + 1)]);

    i32::from_be_bytes(word)
}

fn write_point(out: &mut Vec<u8>, p: Point3i) {
    for c in p.0.iter() {
        write_i32(out, *c);
    }
}

fn read_point(bytes: &[u8], first: usize) -> Point3i {
    PointN([
        read_i32(bytes, first),
        read_i32(bytes, first + 1),
        read_i32(bytes, first + 2),
    ])
}

fn check_header(payload: &[u8], expected: usize) -> ProtocolResult<()> {
    if payload.len() < expected {
        Err(ProtocolError::Truncated {
            expected,
            actual: payload.len(),
        })
    } else {
        Ok(())
    }
}

/// Encodes a single integer, as in `ChunkSize` and `NumLod` replies.
pub fn encode_scalar(value: i32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn decode_scalar(payload: &[u8]) -> ProtocolResult<i32> {
    check_header(payload, 4)?;

    Ok(read_i32(payload, 0))
}

// ████████╗██████╗ ███████╗███████╗███████╗
// ╚══██╔══╝██╔══██╗██╔════╝██╔════╝██╔════╝
//    ██║   ██████╔╝█████╗  █████╗  ███████╗
//    ██║   ██╔══██╗██╔══╝  ██╔══╝  ╚════██║
//    ██║   ██║  ██║███████╗███████╗███████║
//    ╚═╝   ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝

pub fn encode_tree_request(key: TreeKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(TREE_HEADER_LEN);
    write_point(&mut out, key.origin);

    out
}

/// A tree response: the header followed by the encoded layout. `NoTree` replies pass an empty `layout`.
pub fn encode_tree_response(key: TreeKey, layout: &[u8]) -> Vec<u8> {
    let mut out = encode_tree_request(key);
    out.extend_from_slice(layout);

    out
}

/// Splits a tree payload into its key and whatever follows the header.
pub fn decode_tree_header(payload: &[u8]) -> ProtocolResult<(TreeKey, &[u8])> {
    check_header(payload, TREE_HEADER_LEN)?;

    Ok((
        TreeKey::new(read_point(payload, 0)),
        &payload[TREE_HEADER_LEN..],
    ))
}

//  ██████╗██╗  ██╗██╗   ██╗███╗   ██╗██╗  ██╗███████╗
// ██╔════╝██║  ██║██║   ██║████╗  ██║██║ ██╔╝██╔════╝
// ██║     ███████║██║   ██║██╔██╗ ██║█████╔╝ ███████╗
// ██║     ██╔══██║██║   ██║██║╚██╗██║██╔═██╗ ╚════██║
// ╚██████╗██║  ██║╚██████╔╝██║ ╚████║██║  ██╗███████║
//  ╚═════╝╚═╝  ╚═╝ ╚═════╝ ╚═╝  ╚═══╝╚═╝  ╚═╝╚══════╝

fn write_chunk_header(out: &mut Vec<u8>, key: ChunkKey) {
    write_i32(out, key.lod as i32);
    write_point(out, key.minimum);
}

/// A chunk request, with the checksum of the local chunk file if there is one.
pub fn encode_chunk_request(key: ChunkKey, local: Option<&Checksum>) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + CHECKSUM_LEN);
    write_chunk_header(&mut out, key);
    if let Some(hash) = local {
        out.extend_from_slice(hash);
    }

    out
}

/// A decoded chunk request. A suffix that is not exactly one checksum long is ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChunkRequest {
    pub key: ChunkKey,
    pub checksum: Option<Checksum>,
}

pub fn decode_chunk_request(payload: &[u8]) -> ProtocolResult<ChunkRequest> {
    let (key, suffix) = decode_chunk_header(payload)?;
    let checksum = if suffix.len() == CHECKSUM_LEN {
        let mut hash = [0; CHECKSUM_LEN];
        hash.copy_from_slice(suffix);
        Some(hash)
    } else {
        None
    };

    Ok(ChunkRequest { key, checksum })
}

/// A chunk response. An empty `voxels` means "unchanged" for `QueryChunk` and is the only form of `NoChunk`.
pub fn encode_chunk_response(key: ChunkKey, voxels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(CHUNK_HEADER_LEN + voxels.len());
    write_chunk_header(&mut out, key);
    out.extend_from_slice(voxels);

    out
}

/// Splits a chunk payload into its key and whatever follows the header.
pub fn decode_chunk_header(payload: &[u8]) -> ProtocolResult<(ChunkKey, &[u8])> {
    check_header(payload, CHUNK_HEADER_LEN)?;
    let level = read_i32(payload, 0);
    if level < 0 || level > u8::MAX as i32 {
        return Err(ProtocolError::InvalidLevel(level));
    }

    Ok((
        ChunkKey::new(level as u8, read_point(payload, 1)),
        &payload[CHUNK_HEADER_LEN..],
    ))
}

// ███████╗██████╗ ██╗████████╗███████╗
// ██╔════╝██╔══██╗██║╚══██╔══╝██╔════╝
// █████╗  ██║  ██║██║   ██║   ███████╗
// ██╔══╝  ██║  ██║██║   ██║   ╚════██║
// ███████╗██████╔╝██║   ██║   ███████║
// ╚══════╝╚═════╝ ╚═╝   ╚═╝   ╚══════╝

/// An edit of the LOD0 voxels in `extent`. `voxels` must hold exactly one byte per point.
pub fn encode_edit(extent: &Extent3i, voxels: &[u8]) -> ProtocolResult<Vec<u8>> {
    check_extent(extent, voxels.len())?;

    let mut out = Vec::with_capacity(EDIT_HEADER_LEN + voxels.len());
    write_point(&mut out, extent.minimum);
    write_point(&mut out, extent.shape);
    out.extend_from_slice(voxels);

    Ok(out)
}

pub fn decode_edit(payload: &[u8]) -> ProtocolResult<(Extent3i, &[u8])> {
    check_header(payload, EDIT_HEADER_LEN)?;
    let extent = Extent3i::from_min_and_shape(read_point(payload, 0), read_point(payload, 3));
    let voxels = &payload[EDIT_HEADER_LEN..];
    check_extent(&extent, voxels.len())?;

    Ok((extent, voxels))
}

fn check_extent(extent: &Extent3i, num_bytes: usize) -> ProtocolResult<()> {
    if extent.shape.0.iter().any(|c| *c < 0) {
        return Err(ProtocolError::NegativeExtent(extent.shape.0));
    }
    let expected = extent.shape.0.iter().map(|c| *c as usize).product();
    if num_bytes != expected {
        return Err(ProtocolError::SizeMismatch {
            expected,
            actual: num_bytes,
        });
    }

    Ok(())
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
    fn tree_request_is_big_endian() {
        let bytes = encode_tree_request(TreeKey::new(PointN([1, -1, 256])));

        assert_eq!(
            bytes,
            vec![0, 0, 0, 1, 255, 255, 255, 255, 0, 0, 1, 0]
        );
    }

    #[test]
    fn chunk_request_appends_checksum_only_when_present() {
        let key = ChunkKey::new(2, PointN([0, 64, -64]));

        let bare = encode_chunk_request(key, None);
        assert_eq!(bare.len(), CHUNK_HEADER_LEN);
        assert_eq!(&bare[..4], &[0, 0, 0, 2]);
        assert_eq!(decode_chunk_request(&bare).unwrap().checksum, None);

        let hash = [7; CHECKSUM_LEN];
        let with_hash = encode_chunk_request(key, Some(&hash));
        assert_eq!(with_hash.len(), CHUNK_HEADER_LEN + CHECKSUM_LEN);
        assert_eq!(
            decode_chunk_request(&with_hash).unwrap(),
            ChunkRequest {
                key,
                checksum: Some(hash)
            }
        );
    }

    #[test]
    fn short_and_out_of_range_headers_are_rejected() {
        assert_eq!(
            decode_tree_header(&[0; 11]),
            Err(ProtocolError::Truncated {
                expected: 12,
                actual: 11
            })
        );

        let mut payload = encode_chunk_response(ChunkKey::new(0, Point3i::ZERO), &[]);
        payload[..4].copy_from_slice(&(-1i32).to_be_bytes());
        assert_eq!(
            decode_chunk_header(&payload),
            Err(ProtocolError::InvalidLevel(-1))
        );
    }

    #[test]
    fn chunk_response_body_follows_header() {
        let key = ChunkKey::new(1, PointN([8, 0, 0]));
        let payload = encode_chunk_response(key, &[1, 2, 3]);

        assert_eq!(decode_chunk_header(&payload).unwrap(), (key, &[1u8, 2, 3][..]));
    }

    #[test]
    fn edit_validates_volume() {
        let extent = Extent3i::from_min_and_shape(PointN([-1, 0, 2]), PointN([2, 1, 2]));
        let payload = encode_edit(&extent, &[5; 4]).unwrap();

        assert_eq!(payload.len(), EDIT_HEADER_LEN + 4);
        assert_eq!(decode_edit(&payload).unwrap(), (extent, &[5u8; 4][..]));
        assert_eq!(
            encode_edit(&extent, &[5; 3]),
            Err(ProtocolError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );

        let negative = Extent3i::from_min_and_shape(Point3i::ZERO, PointN([1, -1, 1]));
        assert_eq!(
            encode_edit(&negative, &[]),
            Err(ProtocolError::NegativeExtent([1, -1, 1]))
        );
    }

    #[test]
    fn command_ids_round_trip() {
        for id in 1..=7 {
            assert_eq!(Command::from_u8(id).unwrap().id(), id);
        }
        assert_eq!(Command::from_u8(0), Err(ProtocolError::UnknownCommand(0)));
    }
}
