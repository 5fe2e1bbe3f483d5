use crate::protocol::{Command, Packet};
use crate::TransportError;

use auto_impl::auto_impl;
use std::time::Duration;

/// A reliable, ordered connection to the terrain authority that frames payloads and demultiplexes them by command id.
#[auto_impl(&mut, Box)]
pub trait Transport {
    /// Queues one packet for sending. Never waits for a reply.
    fn send(&mut self, command: Command, payload: &[u8]) -> Result<(), TransportError>;

    /// Waits at most `timeout` for the next inbound packet. A zero `timeout` only returns packets that already arrived.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Packet>, TransportError>;
}
