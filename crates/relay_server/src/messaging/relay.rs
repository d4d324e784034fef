//! Broadcast relay: the per-connection state machine.
//!
//! Every connection task feeds its lifecycle into [`Relay::handle_event`]:
//!
//! 1. `Opened` - queue `init` on the connection itself, then mark it open
//! 2. `Message` - decode, stamp with the sender identity, fan out to every
//!    other open connection
//! 3. `Closed` - unregister, then announce the departure to everyone left
//!
//! Handling is synchronous. Sends only push onto unbounded per-connection
//! queues, so one slow peer never holds up the others.

use crate::connection::{ConnectionId, ConnectionManager, PlayerId};
use crate::error::RelayError;
use crate::messaging::{LifecycleMessage, RelayPayload};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Lifecycle input for a single connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Message(Vec<u8>),
    Closed,
}

/// Snapshot of relay counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub identities_issued: u64,
    pub messages_relayed: u64,
    pub deliveries: u64,
    pub malformed_dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    messages_relayed: AtomicU64,
    deliveries: AtomicU64,
    malformed_dropped: AtomicU64,
}

/// Fan-out relay bound to one connection registry.
#[derive(Clone)]
pub struct Relay {
    connections: Arc<ConnectionManager>,
    counters: Arc<Counters>,
}

impl Relay {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self {
            connections,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Drives one connection through a lifecycle transition.
    ///
    /// A malformed message is logged and dropped here and still yields
    /// `Ok(())`; the connection stays open and the sender hears nothing.
    /// The only error surfaced is [`RelayError::UnknownConnection`].
    pub fn handle_event(
        &self,
        connection_id: ConnectionId,
        event: ConnectionEvent,
    ) -> Result<(), RelayError> {
        match event {
            ConnectionEvent::Opened => self.on_open(connection_id),
            ConnectionEvent::Message(raw) => self.on_message(connection_id, &raw),
            ConnectionEvent::Closed => self.on_close(connection_id),
        }
    }

    fn on_open(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        let handle = self.connections.handle(connection_id)?;
        let init = LifecycleMessage::Init {
            player_id: handle.player_id,
        };

        handle.send(Message::text(init.to_json()));
        self.connections.mark_open(connection_id)?;

        if let Some(record) = self.connections.record(connection_id) {
            info!(
                "👋 Player {} connected from {}",
                record.player_id, record.remote_addr
            );
        }
        Ok(())
    }

    fn on_message(&self, connection_id: ConnectionId, raw: &[u8]) -> Result<(), RelayError> {
        let player_id = self.connections.lookup(connection_id)?;

        let payload = match RelayPayload::decode(raw) {
            Ok(payload) => payload,
            Err(e) => {
                self.counters.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                warn!("⚠️ Dropping message from player {}: {}", player_id, e);
                return Ok(());
            }
        };

        let frame = payload.stamp(player_id).encode();
        let delivered = self.broadcast_from(connection_id, &frame);

        self.counters.messages_relayed.fetch_add(1, Ordering::Relaxed);
        debug!(
            "📨 Relayed message from player {} to {} peer(s)",
            player_id, delivered
        );
        Ok(())
    }

    fn on_close(&self, connection_id: ConnectionId) -> Result<(), RelayError> {
        // A second close for the same connection finds nothing to announce.
        let Some(record) = self.connections.unregister(connection_id) else {
            return Ok(());
        };

        info!(
            "👋 Player {} disconnected after {:.1}s",
            record.player_id,
            record.session_length().as_secs_f64()
        );
        self.announce_departure(connection_id, record.player_id);
        Ok(())
    }

    fn announce_departure(&self, connection_id: ConnectionId, player_id: PlayerId) {
        let frame = LifecycleMessage::PlayerDisconnect { player_id }.to_json();
        self.broadcast_from(connection_id, &frame);
    }

    /// Queues `frame` on every open connection other than `origin` and
    /// returns how many accepted it.
    fn broadcast_from(&self, origin: ConnectionId, frame: &str) -> usize {
        let delivered = self
            .connections
            .for_each_other(origin)
            .iter()
            .filter(|target| target.send(Message::text(frame.to_string())))
            .count();

        self.counters
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            connections: self.connections.connection_count(),
            identities_issued: self.connections.identities_issued(),
            messages_relayed: self.counters.messages_relayed.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            malformed_dropped: self.counters.malformed_dropped.load(Ordering::Relaxed),
        }
    }
}
