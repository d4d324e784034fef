//! Client connection representation.

use super::PlayerId;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Lifecycle state of a single connection.
///
/// A connection is registered while `Connecting`, becomes `Open` once its
/// `init` message has been queued, and ends in `Closed`. Only `Open`
/// connections receive broadcast traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Metadata kept for every registered connection.
///
/// # Fields
///
/// * `player_id` - Identity assigned on accept, never reused
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was registered
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub player_id: PlayerId,
    pub remote_addr: SocketAddr,
    pub connected_at: Instant,
}

impl ClientRecord {
    /// Creates a record for a freshly accepted connection.
    pub fn new(player_id: PlayerId, remote_addr: SocketAddr) -> Self {
        Self {
            player_id,
            remote_addr,
            connected_at: Instant::now(),
        }
    }

    /// Time since the connection was registered.
    pub fn session_length(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
