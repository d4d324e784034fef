//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections: identity
//! allocation, the live connection registry, and per-connection outbound
//! queues.

pub mod client;
pub mod identity;
pub mod manager;

pub use client::{ClientRecord, ConnectionState};
pub use identity::{IdentityAllocator, PlayerId};
pub use manager::{ConnectionHandle, ConnectionManager, OutboundSender};

/// Type alias for connection identifiers.
///
/// Connection IDs identify the transport handle of a client connection and
/// are distinct from the player identity announced to clients.
pub type ConnectionId = usize;
