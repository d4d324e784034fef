//! Core relay server implementation.
//!
//! This module contains the main `RelayServer` struct, which owns all
//! process-scoped state (registry, identity allocator, relay counters and
//! static responder) and runs the two listening endpoints.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    messaging::{Relay, RelayStats},
    server::{handlers::handle_connection, http::router},
    static_files::StaticResponder,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::future::IntoFuture;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info, warn};

const LISTEN_BACKLOG: i32 = 1024;

/// Pause after an accept failure that is not tied to a single peer, such as
/// running out of file descriptors.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// The relay server.
///
/// Each instance has its own registry and identity counter, so several
/// servers can run side by side in one process.
///
/// # Architecture
///
/// * **WebSocket endpoint**: accepts clients, one task per connection
/// * **Relay**: stamps and fans out client messages
/// * **HTTP endpoint**: serves files from the document root
pub struct RelayServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Broadcast relay and the registry it drives
    relay: Relay,

    /// Static file lookup for the HTTP endpoint
    static_files: Arc<StaticResponder>,

    /// Flipped to `true` once shutdown is requested
    shutdown_sender: watch::Sender<bool>,
}

/// Listeners bound by [`RelayServer::bind`], not yet serving.
pub struct BoundListeners {
    ws: TcpListener,
    http: TcpListener,
    ws_addr: SocketAddr,
    http_addr: SocketAddr,
}

impl BoundListeners {
    /// Actual address of the WebSocket endpoint.
    pub fn ws_addr(&self) -> SocketAddr {
        self.ws_addr
    }

    /// Actual address of the HTTP endpoint.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }
}

impl RelayServer {
    /// Creates a new relay server with the specified configuration.
    ///
    /// Nothing is bound until [`bind`](Self::bind) or
    /// [`start`](Self::start) is called.
    pub fn new(config: ServerConfig) -> Self {
        let relay = Relay::new(Arc::new(ConnectionManager::new()));
        let static_files = Arc::new(StaticResponder::new(
            config.document_root.clone(),
            config.index_document.clone(),
            config.not_found_document.clone(),
        ));
        let (shutdown_sender, _) = watch::channel(false);

        Self {
            config,
            relay,
            static_files,
            shutdown_sender,
        }
    }

    /// Binds both endpoints.
    ///
    /// Port 0 picks an ephemeral port; the chosen addresses are available on
    /// the returned [`BoundListeners`].
    pub async fn bind(&self) -> Result<BoundListeners, ServerError> {
        let ws = bind_listener(self.config.ws_bind_address)?;
        let http = bind_listener(self.config.http_bind_address)?;

        let ws_addr = ws
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read WebSocket address: {e}")))?;
        let http_addr = http
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read HTTP address: {e}")))?;

        info!("✅ WebSocket relay bound on {}", ws_addr);
        info!("✅ Static file server bound on {}", http_addr);

        Ok(BoundListeners {
            ws,
            http,
            ws_addr,
            http_addr,
        })
    }

    /// Serves both endpoints until [`shutdown`](Self::shutdown) is called or
    /// the HTTP endpoint fails.
    ///
    /// Accept failures on the WebSocket endpoint are logged and retried.
    /// Every connection task watches the same shutdown flag and sends its
    /// own Close frame, including one whose handshake finishes after
    /// `serve` has returned.
    pub async fn serve(&self, listeners: BoundListeners) -> Result<(), ServerError> {
        info!(
            "🚀 Relay serving from {} (document root {})",
            listeners.ws_addr,
            self.static_files.document_root().display()
        );

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        let mut http_shutdown = self.shutdown_sender.subscribe();

        let accept_loop = accept_connections(
            listeners.ws,
            self.relay.clone(),
            self.shutdown_sender.subscribe(),
        );
        let http_server = axum::serve(listeners.http, router(self.static_files.clone()))
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.wait_for(|stopping| *stopping).await;
            })
            .into_future();

        let result = tokio::select! {
            _ = accept_loop => Ok(()),
            result = http_server => result
                .map_err(|e| ServerError::Internal(format!("HTTP server failed: {e}"))),
            _ = shutdown_receiver.wait_for(|stopping| *stopping) => {
                info!("Shutdown signal received");
                Ok(())
            }
        };

        if let Err(e) = &result {
            error!("Server error: {}", e);
        }

        info!("🧹 Closing {} connection(s)", self.relay.connections().connection_count());
        self.shutdown_sender.send_replace(true);

        info!("Server stopped");
        result
    }

    /// Binds and serves; returns when the server stops.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listeners = self.bind().await?;
        self.serve(listeners).await
    }

    /// Initiates server shutdown.
    ///
    /// Safe to call before or while [`serve`](Self::serve) runs.
    pub fn shutdown(&self) {
        info!("🛑 Shutting down server...");
        self.shutdown_sender.send_replace(true);
    }

    /// Current relay counters.
    pub fn stats(&self) -> RelayStats {
        self.relay.stats()
    }
}

/// Accepts WebSocket clients until the surrounding `serve` stops polling.
async fn accept_connections(
    listener: TcpListener,
    relay: Relay,
    shutdown: watch::Receiver<bool>,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                if let Some(pause) = accept_backoff(&e) {
                    tokio::time::sleep(pause).await;
                }
                continue;
            }
        };

        let relay = relay.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, relay, shutdown).await {
                warn!("Connection error: {}", e);
            }
        });
    }
}

/// How long to wait before the next accept. Errors that concern only the
/// peer being accepted are retried at once.
fn accept_backoff(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_ERROR_BACKOFF),
    }
}

fn bind_listener(addr: SocketAddr) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
    socket.set_reuse_address(true).ok();

    socket
        .bind(&addr.into())
        .map_err(|e| ServerError::Network(format!("Bind to {addr} failed: {e}")))?;
    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| ServerError::Network(format!("Listen on {addr} failed: {e}")))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

    let std_listener: StdTcpListener = socket.into();
    TcpListener::from_std(std_listener)
        .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
}
