//! End-to-end tests over real sockets.
//!
//! Each test runs its own server on ephemeral ports and talks to it with a
//! WebSocket client and raw HTTP requests.

use futures::{SinkExt, StreamExt};
use relay_server::{create_server_with_config, RelayServer, ServerConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(300);

struct TestServer {
    server: Arc<RelayServer>,
    ws_addr: SocketAddr,
    http_addr: SocketAddr,
    root: TempDir,
}

impl TestServer {
    async fn start() -> Self {
        let root = TempDir::new().expect("Failed to create document root");
        write_site(root.path());

        let server = Arc::new(create_server_with_config(ServerConfig {
            ws_bind_address: "127.0.0.1:0".parse().unwrap(),
            http_bind_address: "127.0.0.1:0".parse().unwrap(),
            document_root: root.path().to_path_buf(),
            ..Default::default()
        }));

        let listeners = server.bind().await.expect("Failed to bind test server");
        let ws_addr = listeners.ws_addr();
        let http_addr = listeners.http_addr();

        let running = server.clone();
        tokio::spawn(async move {
            running.serve(listeners).await.expect("Server failed");
        });

        Self {
            server,
            ws_addr,
            http_addr,
            root,
        }
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}", self.ws_addr))
            .await
            .expect("Failed to connect WebSocket client");
        client
    }

    /// Connects and consumes the `init` message, returning the identity.
    async fn join(&self) -> (Client, u64) {
        let mut client = self.connect().await;
        let init = recv_json(&mut client).await;
        assert_eq!(init["type"], "init");
        let player_id = init["playerId"].as_u64().expect("init without playerId");
        (client, player_id)
    }
}

fn write_site(root: &Path) {
    std::fs::write(root.join("main.html"), "<html>main</html>").unwrap();
    std::fs::write(root.join("404.html"), "<html>not here</html>").unwrap();
    std::fs::write(root.join("style.css"), "body { margin: 0 }").unwrap();
}

async fn recv_json(client: &mut Client) -> Value {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Connection ended unexpectedly")
            .expect("WebSocket error");

        match frame {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("Invalid JSON from server"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {:?}", other),
        }
    }
}

async fn assert_silent(client: &mut Client) {
    if let Ok(Some(Ok(frame))) = timeout(SILENCE_WINDOW, client.next()).await {
        panic!("Expected no message, received {:?}", frame);
    }
}

async fn send_text(client: &mut Client, text: &str) {
    client
        .send(Message::text(text.to_string()))
        .await
        .expect("Failed to send message");
}

async fn http_get(addr: SocketAddr, path: &str) -> (u16, String, Vec<u8>) {
    let mut stream = TcpStream::connect(addr).await.expect("HTTP connect failed");
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    timeout(RECV_TIMEOUT, stream.read_to_end(&mut raw))
        .await
        .expect("HTTP response timed out")
        .unwrap();

    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Malformed HTTP response");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let body = raw[split + 4..].to_vec();

    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("Missing status code");
    let content_type = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-type")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();

    (status, content_type, body)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_a_init_and_relay() {
    let server = TestServer::start().await;

    let mut a = server.connect().await;
    assert_eq!(recv_json(&mut a).await, json!({"type": "init", "playerId": 1}));

    let mut b = server.connect().await;
    assert_eq!(recv_json(&mut b).await, json!({"type": "init", "playerId": 2}));

    // Init goes to the new connection only.
    assert_silent(&mut a).await;

    send_text(&mut a, r#"{"x":5}"#).await;
    assert_eq!(recv_json(&mut b).await, json!({"x": 5, "playerId": 1}));
    assert_silent(&mut a).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_b_disconnect_announced() {
    let server = TestServer::start().await;
    let (mut a, a_id) = server.join().await;
    let (mut b, _) = server.join().await;

    a.close(None).await.expect("Failed to close client");

    assert_eq!(
        recv_json(&mut b).await,
        json!({"type": "playerDisconnect", "playerId": a_id})
    );
    assert_silent(&mut b).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fan_out_reaches_every_other_client() {
    let server = TestServer::start().await;
    let (mut a, a_id) = server.join().await;
    let (mut b, _) = server.join().await;
    let (mut c, _) = server.join().await;

    send_text(&mut a, r#"{"type":"move","dx":1,"playerId":999}"#).await;

    let expected = json!({"type": "move", "dx": 1, "playerId": a_id});
    assert_eq!(recv_json(&mut b).await, expected);
    assert_eq!(recv_json(&mut c).await, expected);
    assert_silent(&mut a).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_message_is_inert() {
    let server = TestServer::start().await;
    let (mut a, a_id) = server.join().await;
    let (mut b, _) = server.join().await;

    send_text(&mut a, "this is not json").await;
    send_text(&mut a, "[1, 2, 3]").await;
    assert_silent(&mut b).await;
    assert_silent(&mut a).await;

    // The sender is still connected and relayed normally afterwards.
    send_text(&mut a, r#"{"hello":"world"}"#).await;
    assert_eq!(
        recv_json(&mut b).await,
        json!({"hello": "world", "playerId": a_id})
    );
    assert_eq!(server.server.stats().malformed_dropped, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_frames_are_relayed_as_text() {
    let server = TestServer::start().await;
    let (mut a, a_id) = server.join().await;
    let (mut b, _) = server.join().await;

    a.send(Message::binary(br#"{"blob":true}"#.to_vec()))
        .await
        .unwrap();
    assert_eq!(recv_json(&mut b).await, json!({"blob": true, "playerId": a_id}));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identities_unique_across_reconnects() {
    let server = TestServer::start().await;
    let mut seen = Vec::new();

    for _ in 0..5 {
        let (mut client, player_id) = server.join().await;
        seen.push(player_id);
        client.close(None).await.unwrap();
    }

    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_departed_client_gets_no_further_traffic() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join().await;
    let (mut b, b_id) = server.join().await;
    let (mut c, _) = server.join().await;

    c.close(None).await.unwrap();
    recv_json(&mut a).await;
    recv_json(&mut b).await;

    b.close(None).await.unwrap();
    assert_eq!(
        recv_json(&mut a).await,
        json!({"type": "playerDisconnect", "playerId": b_id})
    );

    // Only the sender is left; its messages go nowhere.
    send_text(&mut a, r#"{"alone":true}"#).await;
    assert_silent(&mut a).await;

    timeout(RECV_TIMEOUT, async {
        while server.server.stats().connections != 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Registry did not shrink");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_closes_clients() {
    let server = TestServer::start().await;
    let (mut a, _) = server.join().await;

    server.server.shutdown();

    let ended = timeout(RECV_TIMEOUT, async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "Client was not closed on shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_c_index_document() {
    let server = TestServer::start().await;
    let (status, content_type, body) = http_get(server.http_addr, "/").await;

    assert_eq!(status, 200);
    assert_eq!(content_type, "text/html");
    assert_eq!(body, b"<html>main</html>");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scenario_d_missing_file() {
    let server = TestServer::start().await;
    let (status, content_type, body) = http_get(server.http_addr, "/missing.png").await;

    assert_eq!(status, 404);
    assert_eq!(content_type, "text/html");
    assert_eq!(body, b"<html>not here</html>");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_content_type_and_query_string() {
    let server = TestServer::start().await;
    let (status, content_type, body) = http_get(server.http_addr, "/style.css?v=3").await;

    assert_eq!(status, 200);
    assert_eq!(content_type, "text/css");
    assert_eq!(body, b"body { margin: 0 }");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_traversal_outside_root_is_not_found() {
    let server = TestServer::start().await;
    let (status, _, body) = http_get(server.http_addr, "/../../etc/passwd").await;

    assert_eq!(status, 404);
    assert_eq!(body, b"<html>not here</html>");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_percent_encoded_paths() {
    let server = TestServer::start().await;
    std::fs::write(server.root.path().join("my sprite.png"), [7, 7]).unwrap();

    let (status, content_type, body) = http_get(server.http_addr, "/my%20sprite.png").await;
    assert_eq!(status, 200);
    assert_eq!(content_type, "image/png");
    assert_eq!(body, vec![7, 7]);

    let (status, _, body) = http_get(server.http_addr, "/%2e%2e/%2e%2e/etc/passwd").await;
    assert_eq!(status, 404);
    assert_eq!(body, b"<html>not here</html>");
}
