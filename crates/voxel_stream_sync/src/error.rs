use crate::protocol::ProtocolError;

use voxel_stream_storage::StoreError;

use std::time::Duration;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// Failures of the byte-stream connection to the peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to the peer was closed")]
    Disconnected,
    #[error("transport I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot track more than {capacity} {kind} records")]
    ResourceExhausted { kind: &'static str, capacity: usize },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("no response from the peer within {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("malformed packet: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("peer reported unusable dimensions: chunk_size = {chunk_size}, n_lod = {n_lod}")]
    InvalidDimensions { chunk_size: i32, n_lod: i32 },
    #[error("invalid configuration: {0}")]
    Config(String),
}
