//! # Relay Server - Real-Time Fan-Out Relay
//!
//! A minimal real-time relay for multiplayer clients. Clients connect over
//! WebSocket, each is assigned a numeric identity, and every message one
//! client sends is rebroadcast to all other connected clients with the
//! sender identity attached. A second endpoint serves static assets over
//! plain HTTP.
//!
//! ## Design Philosophy
//!
//! The relay holds **no game state** and validates nothing beyond "is a JSON
//! object". It is pure infrastructure:
//!
//! * **Identity allocation** - monotonically increasing, never reused
//! * **Connection registry** - live mapping from connection to identity
//! * **Broadcast relay** - stamp with `playerId`, forward to every other
//!   open connection
//! * **Static assets** - file lookup with a small content-type table and a
//!   404 fallback document
//!
//! ## Message Flow
//!
//! 1. Client connects and receives `{"type":"init","playerId":N}`
//! 2. Client sends any JSON object, e.g. `{"x":5}`
//! 3. Every other open client receives `{"x":5,"playerId":N}`
//! 4. When the client leaves, the rest receive
//!    `{"type":"playerDisconnect","playerId":N}`
//!
//! Malformed payloads are logged and dropped; the sender stays connected
//! and receives nothing back.
//!
//! ## Concurrency
//!
//! Each connection runs as its own task with a dedicated writer fed by an
//! unbounded queue. Relay handling only enqueues, so a slow recipient never
//! delays delivery to the others. All state is owned by a [`RelayServer`]
//! instance; nothing is global.
//!
//! ## Error Handling
//!
//! [`ServerError`] covers failures that stop the server (binding, accepting).
//! [`RelayError`] covers per-event failures, which are always handled where
//! they occur.

pub use config::ServerConfig;
pub use error::{RelayError, ServerError};
pub use messaging::{ConnectionEvent, LifecycleMessage, Relay, RelayPayload, RelayStats};
pub use server::{BoundListeners, RelayServer};
pub use static_files::{StaticResponder, StaticResponse};
pub use utils::create_server_with_config;

pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod server;
pub mod static_files;
pub mod utils;
