//! Test helper functions for relay integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use playsync_relay::session::{ConnectionId, Manifest, MessageRouter, Outcome, SessionError};
use playsync_relay::{build_router, ServerMessage, SessionManager};
use playsync_shared_config::TimingConfig;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

/// How long end-to-end tests wait for a frame before failing
pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// In-process participants
// =============================================================================

/// A participant joined directly through the session manager
pub struct Participant {
    pub id: String,
    pub connection_id: ConnectionId,
    pub router: MessageRouter,
    pub rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Participant {
    pub fn join(sessions: &SessionManager, token: &str, id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let joined = sessions.join(token, id, tx);
        Self {
            id: id.to_string(),
            connection_id: joined.connection_id,
            router: sessions.router(token, id, joined.connection_id),
            rx,
        }
    }

    pub fn send(&self, raw: Value) -> Result<Outcome, SessionError> {
        self.router.handle_frame(raw.to_string().as_bytes())
    }

    pub fn leave(self, sessions: &SessionManager) -> usize {
        sessions.leave(self.router.token(), &self.id, self.connection_id)
    }

    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.rx.try_recv() {
            out.push(msg);
        }
        out
    }

    pub fn manifests(&mut self) -> Vec<Manifest> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                ServerMessage::ManifestUpdate(m) => Some(m),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// End-to-end
// =============================================================================

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a relay on an ephemeral port
pub async fn spawn_relay(timing: TimingConfig) -> (SocketAddr, SessionManager) {
    let sessions = SessionManager::new(timing.sample_interval);
    let app = build_router(sessions.clone(), timing);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, sessions)
}

/// Open a WebSocket to `path` (including any query string)
pub async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{}{}", addr, path))
        .await
        .unwrap();
    ws
}

pub async fn connect_participant(addr: SocketAddr, token: &str, userid: &str) -> WsClient {
    connect(addr, &format!("/ws?token={}&userid={}", token, userid)).await
}

/// Next JSON frame from the relay, skipping control frames
pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Binary(data) => return serde_json::from_slice(&data).unwrap(),
            Message::Close(frame) => panic!("connection closed: {:?}", frame),
            _ => continue,
        }
    }
}

/// Wait until the relay closes the connection
pub async fn expect_closed(ws: &mut WsClient) {
    loop {
        match tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close")
        {
            None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return,
            Some(Ok(_)) => continue,
        }
    }
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string())).await.unwrap();
}

/// Poll `check` until it holds or the receive timeout elapses
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
