//! Error types for the relay server.
//!
//! Server-level failures ([`ServerError`]) stop the server and are reported
//! to the caller of [`crate::RelayServer::start`]. Relay-level failures
//! ([`RelayError`]) are always handled at the point of detection: they are
//! logged and the offending message is dropped, the connection stays open.

use crate::connection::ConnectionId;
use thiserror::Error;

/// Errors that can stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Network-related error (bind, listen, accept or handshake failures)
    #[error("Network error: {0}")]
    Network(String),
    /// A running endpoint failed after binding
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while handling a single connection event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The inbound payload could not be decoded as a JSON object.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    /// The connection has no registry entry.
    #[error("Connection {0} is not registered")]
    UnknownConnection(ConnectionId),
}
