//! Convenience constructors.

use crate::{RelayServer, ServerConfig};

/// Creates a relay server with a custom configuration.
pub fn create_server_with_config(config: ServerConfig) -> RelayServer {
    RelayServer::new(config)
}
