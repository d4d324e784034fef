//! The live connection registry.
//!
//! Maps each transport handle ([`ConnectionId`]) to its [`ClientRecord`],
//! lifecycle state and outbound queue. Every open connection has exactly one
//! entry; an entry disappears as soon as the connection closes, after which
//! no further traffic is queued for it.

use super::{ClientRecord, ConnectionId, ConnectionState, IdentityAllocator, PlayerId};
use crate::error::RelayError;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Sending half of a connection's outbound queue.
///
/// The receiving half is drained by the connection's writer task, so queuing
/// a frame never waits on the network.
pub type OutboundSender = mpsc::UnboundedSender<Message>;

struct RegistryEntry {
    record: ClientRecord,
    state: ConnectionState,
    sender: OutboundSender,
}

/// A snapshot of one registered connection, used as a broadcast target.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub player_id: PlayerId,
    sender: OutboundSender,
}

impl ConnectionHandle {
    /// Queues a frame for this connection.
    ///
    /// Returns `false` if the writer side has already gone away. Failures are
    /// independent per recipient.
    pub fn send(&self, message: Message) -> bool {
        match self.sender.send(message) {
            Ok(()) => true,
            Err(_) => {
                debug!(
                    "Dropped frame for connection {} (player {}): writer closed",
                    self.connection_id, self.player_id
                );
                false
            }
        }
    }
}

/// Registry of live connections and owner of the identity allocator.
pub struct ConnectionManager {
    connections: DashMap<ConnectionId, RegistryEntry>,
    identities: IdentityAllocator,
    next_connection_id: AtomicUsize,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            identities: IdentityAllocator::new(),
            next_connection_id: AtomicUsize::new(1),
        }
    }

    /// Allocates a transport handle for a newly accepted stream.
    pub fn next_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a connection in the `Connecting` state and assigns it a new
    /// identity.
    ///
    /// Always succeeds. Registering an id that is already present replaces
    /// the old entry with a fresh identity.
    pub fn register(
        &self,
        connection_id: ConnectionId,
        remote_addr: SocketAddr,
        sender: OutboundSender,
    ) -> PlayerId {
        let player_id = self.identities.next();
        self.connections.insert(
            connection_id,
            RegistryEntry {
                record: ClientRecord::new(player_id, remote_addr),
                state: ConnectionState::Connecting,
                sender,
            },
        );
        player_id
    }

    /// Returns the identity of a registered connection.
    pub fn lookup(&self, connection_id: ConnectionId) -> Result<PlayerId, RelayError> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.record.player_id)
            .ok_or(RelayError::UnknownConnection(connection_id))
    }

    /// Returns a copy of the connection's record, if registered.
    pub fn record(&self, connection_id: ConnectionId) -> Option<ClientRecord> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.record.clone())
    }

    /// Current lifecycle state. Unregistered connections report `Closed`.
    pub fn state(&self, connection_id: ConnectionId) -> ConnectionState {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Moves a registered connection to `Open`, making it a broadcast target.
    pub fn mark_open(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        let mut entry = self
            .connections
            .get_mut(&connection_id)
            .ok_or(RelayError::UnknownConnection(connection_id))?;
        entry.state = ConnectionState::Open;
        Ok(())
    }

    /// Removes a connection. A second call for the same id is a no-op and
    /// returns `None`.
    pub fn unregister(&self, connection_id: ConnectionId) -> Option<ClientRecord> {
        self.connections
            .remove(&connection_id)
            .map(|(_, entry)| entry.record)
    }

    /// Handle for sending to one registered connection, whatever its state.
    pub fn handle(&self, connection_id: ConnectionId) -> Result<ConnectionHandle, RelayError> {
        self.connections
            .get(&connection_id)
            .map(|entry| ConnectionHandle {
                connection_id,
                player_id: entry.record.player_id,
                sender: entry.sender.clone(),
            })
            .ok_or(RelayError::UnknownConnection(connection_id))
    }

    /// Every registered connection except `exclude` that is open right now.
    ///
    /// Connections still `Connecting` and those whose writer has gone away
    /// are skipped. The result is a snapshot; no registry locks are held
    /// while the caller sends.
    pub fn for_each_other(&self, exclude: ConnectionId) -> Vec<ConnectionHandle> {
        self.connections
            .iter()
            .filter(|entry| *entry.key() != exclude)
            .filter(|entry| entry.state == ConnectionState::Open && !entry.sender.is_closed())
            .map(|entry| ConnectionHandle {
                connection_id: *entry.key(),
                player_id: entry.record.player_id,
                sender: entry.sender.clone(),
            })
            .collect()
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of identities assigned since this manager was created.
    pub fn identities_issued(&self) -> u64 {
        self.identities.issued()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn open(manager: &ConnectionManager) -> (ConnectionId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = manager.next_connection_id();
        manager.register(id, addr(), tx);
        manager.mark_open(id).unwrap();
        (id, rx)
    }

    #[test]
    fn test_register_and_lookup() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let player_id = manager.register(10, addr(), tx);
        assert_eq!(player_id, 1);
        assert_eq!(manager.lookup(10), Ok(1));
        assert_eq!(manager.state(10), ConnectionState::Connecting);
        assert_eq!(manager.record(10).unwrap().remote_addr, addr());
        assert_eq!(manager.connection_count(), 1);
    }

    #[test]
    fn test_lookup_unknown_connection() {
        let manager = ConnectionManager::new();
        assert_eq!(manager.lookup(99), Err(RelayError::UnknownConnection(99)));
        assert_eq!(manager.mark_open(99), Err(RelayError::UnknownConnection(99)));
        assert_eq!(manager.state(99), ConnectionState::Closed);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let manager = ConnectionManager::new();
        let (id, _rx) = open(&manager);

        assert_eq!(manager.unregister(id).map(|r| r.player_id), Some(1));
        assert!(manager.unregister(id).is_none());
        assert_eq!(manager.connection_count(), 0);
    }

    #[test]
    fn test_identities_not_reused_after_disconnect() {
        let manager = ConnectionManager::new();
        let (first, _rx1) = open(&manager);
        manager.unregister(first);

        let (second, _rx2) = open(&manager);
        assert_eq!(manager.lookup(second), Ok(2));
        assert_eq!(manager.identities_issued(), 2);
    }

    #[test]
    fn test_for_each_other_skips_self_and_connecting() {
        let manager = ConnectionManager::new();
        let (a, _rx_a) = open(&manager);
        let (b, _rx_b) = open(&manager);

        let (tx, _rx_c) = mpsc::unbounded_channel();
        let c = manager.next_connection_id();
        manager.register(c, addr(), tx);

        let targets: Vec<_> = manager
            .for_each_other(a)
            .into_iter()
            .map(|h| h.connection_id)
            .collect();
        assert_eq!(targets, vec![b]);
    }

    #[test]
    fn test_for_each_other_skips_closed_writers() {
        let manager = ConnectionManager::new();
        let (a, _rx_a) = open(&manager);
        let (_b, rx_b) = open(&manager);
        drop(rx_b);

        assert!(manager.for_each_other(a).is_empty());
    }

    #[test]
    fn test_handle_send_reports_closed_writer() {
        let manager = ConnectionManager::new();
        let (a, rx) = open(&manager);
        let handle = manager.handle(a).unwrap();

        assert!(handle.send(Message::text("hello".to_string())));
        drop(rx);
        assert!(!handle.send(Message::text("again".to_string())));
    }
}
