//! Mock WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections and record the requested path
//! - Push text frames, protocol pings or close frames to every client
//! - Record the close frames clients send

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};

#[derive(Debug, Clone)]
enum Command {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

#[derive(Default)]
struct Recorded {
    connections: u32,
    open: u32,
    paths: Vec<String>,
    /// Close code sent by each client that closed (None = empty close frame).
    client_closes: Vec<Option<u16>>,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<Command>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (commands, _) = broadcast::channel::<Command>(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let recorded_clone = recorded.clone();
        let commands_clone = commands.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        // Subscribe before the handshake so nothing sent after
                        // the connection is counted can be missed.
                        let rx = commands_clone.subscribe();
                        tokio::spawn(handle_connection(stream, rx, recorded_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            recorded,
        }
    }

    /// Base URL (`http://`), as configured for the client.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the server's WebSocket URL for a path.
    pub fn url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    /// Number of handshakes completed.
    pub fn connection_count(&self) -> u32 {
        self.recorded.lock().connections
    }

    /// Number of connections currently open.
    pub fn open_count(&self) -> u32 {
        self.recorded.lock().open
    }

    pub fn paths(&self) -> Vec<String> {
        self.recorded.lock().paths.clone()
    }

    pub fn client_closes(&self) -> Vec<Option<u16>> {
        self.recorded.lock().client_closes.clone()
    }

    /// Send a text frame to every open connection.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.commands.send(Command::Text(text.into()));
    }

    /// Send `{"type":"ping"}` to every open connection.
    pub fn send_heartbeat(&self) {
        self.send(r#"{"type":"ping"}"#);
    }

    /// Send a protocol-level ping frame to every open connection.
    pub fn send_protocol_ping(&self) {
        let _ = self.commands.send(Command::Ping);
    }

    /// Close every open connection with `code`.
    pub fn close_all(&self, code: u16, reason: &str) {
        let _ = self.commands.send(Command::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Shutdown the server. Open connections are dropped and new ones refused.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        // Let the accept loop exit and release the listener.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut commands: broadcast::Receiver<Command>,
    recorded: Arc<Mutex<Recorded>>,
) {
    let path = Arc::new(Mutex::new(String::new()));
    let path_clone = path.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        *path_clone.lock() = req.uri().path().to_string();
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    {
        let mut rec = recorded.lock();
        rec.connections += 1;
        rec.open += 1;
        rec.paths.push(path.lock().clone());
    }

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Ok(Command::Text(text)) => {
                    if write.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(Command::Ping) => {
                    if write.send(Message::Ping(b"hb".to_vec())).await.is_err() {
                        break;
                    }
                }
                Ok(Command::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Close(frame))) => {
                    recorded
                        .lock()
                        .client_closes
                        .push(frame.map(|f| u16::from(f.code)));
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
        }
    }

    recorded.lock().open -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockWsServer::start().await;
        assert!(server.url("/x").starts_with("ws://127.0.0.1:"));
        assert_eq!(server.connection_count(), 0);
        server.shutdown().await;
    }
}
