//! Server core: listeners, accept loop and per-connection tasks.

mod core;
mod handlers;
mod http;

pub use self::core::{BoundListeners, RelayServer};
pub use handlers::handle_connection;
pub use http::router;
