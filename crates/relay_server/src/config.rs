//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize a relay server instance.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Configuration structure for the relay server.
///
/// Contains the two listening endpoints and the static file settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address of the WebSocket relay endpoint
    pub ws_bind_address: SocketAddr,

    /// Address of the static file HTTP endpoint
    pub http_bind_address: SocketAddr,

    /// Directory static requests are resolved against
    pub document_root: PathBuf,

    /// Document served for `/`
    pub index_document: String,

    /// Document served with every 404
    pub not_found_document: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            http_bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            document_root: PathBuf::from("public"),
            index_document: "main.html".to_string(),
            not_found_document: "404.html".to_string(),
        }
    }
}
