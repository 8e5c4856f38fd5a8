//! WebSocket upgrade handler
//!
//! Clients connect with `?token=<session>&userid=<participant>`. The token
//! selects the session, the userid identifies the participant within it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use playsync_shared_config::TimingConfig;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::heartbeat::Liveness;
use super::messages::ServerMessage;
use crate::error::{RelayError, RelayResult};
use crate::session::SessionManager;

/// Greeting served on `/` to plain HTTP requests
pub const GREETING: &str = "Hello";

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeParams {
    /// Session token shared by every participant of a session
    #[serde(default)]
    pub token: Option<String>,
    /// Participant id, unique within the session
    #[serde(default)]
    pub userid: Option<String>,
}

impl HandshakeParams {
    /// Both parameters must be present and non-empty
    pub fn validate(self) -> RelayResult<(String, String)> {
        match (self.token, self.userid) {
            (Some(token), Some(userid)) if !token.is_empty() && !userid.is_empty() => {
                Ok((token, userid))
            }
            _ => Err(RelayError::MissingHandshakeParams),
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HandshakeParams>,
    Extension(sessions): Extension<SessionManager>,
    Extension(timing): Extension<TimingConfig>,
) -> Response {
    upgrade(ws, params, sessions, timing)
}

/// `/` serves the greeting, or upgrades when the client asks for a WebSocket
pub async fn root_handler(
    ws: Option<WebSocketUpgrade>,
    Query(params): Query<HandshakeParams>,
    Extension(sessions): Extension<SessionManager>,
    Extension(timing): Extension<TimingConfig>,
) -> Response {
    match ws {
        Some(ws) => upgrade(ws, params, sessions, timing),
        None => GREETING.into_response(),
    }
}

fn upgrade(
    ws: WebSocketUpgrade,
    params: HandshakeParams,
    sessions: SessionManager,
    timing: TimingConfig,
) -> Response {
    let (token, participant_id) = match params.validate() {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(error = %e, "Rejecting WebSocket connection");
            return ws.on_upgrade(move |mut socket| async move {
                let error_msg = ServerMessage::error(e.to_string());
                if let Ok(json) = serde_json::to_string(&error_msg) {
                    let _ = socket.send(Message::Text(json)).await;
                }
                let _ = socket.close().await;
            });
        }
    };

    tracing::info!(
        token = %token,
        participant_id = %participant_id,
        "WebSocket connection accepted"
    );

    ws.on_upgrade(move |socket| handle_socket(socket, token, participant_id, sessions, timing))
}

/// Handle an established WebSocket connection
async fn handle_socket(
    socket: WebSocket,
    token: String,
    participant_id: String,
    sessions: SessionManager,
    timing: TimingConfig,
) {
    // Create unbounded channel for sending messages to this connection
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let joined = sessions.join(&token, &participant_id, tx);
    let connection_id = joined.connection_id;
    let router = sessions.router(&token, &participant_id, connection_id);

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let liveness = Liveness::new();

    // Writer: session messages and heartbeat probes
    let writer_liveness = liveness.clone();
    let writer_participant = participant_id.clone();
    let period = timing.heartbeat_interval;
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        // The registry dropped this connection.
                        tracing::debug!(participant_id = %writer_participant, "Connection released by session");
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    };
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if ws_sender.send(Message::Text(json)).await.is_err() {
                                tracing::debug!(participant_id = %writer_participant, "WebSocket send failed");
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize message");
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    if !writer_liveness.probe() {
                        tracing::info!(participant_id = %writer_participant, "No pong since last probe, terminating connection");
                        break;
                    }
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        tracing::debug!(participant_id = %writer_participant, "WebSocket ping failed");
                        break;
                    }
                }
            }
        }
    });

    // Reader: inbound frames go to the message router
    let reader_participant = participant_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            let frame = match result {
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Binary(data)) => data,
                Ok(Message::Ping(_)) => {
                    // Pings are answered automatically by axum-ws
                    tracing::trace!(participant_id = %reader_participant, "Received ping");
                    continue;
                }
                Ok(Message::Pong(_)) => {
                    tracing::trace!(participant_id = %reader_participant, "Received pong");
                    liveness.mark_alive();
                    continue;
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(participant_id = %reader_participant, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, participant_id = %reader_participant, "WebSocket error");
                    break;
                }
            };

            match router.handle_frame(&frame).map_err(RelayError::from) {
                Ok(outcome) => {
                    tracing::trace!(participant_id = %reader_participant, ?outcome, "Message handled");
                }
                Err(e) if e.is_client_error() => {
                    tracing::debug!(error = %e, participant_id = %reader_participant, "Rejected client message");
                }
                Err(e) => {
                    tracing::warn!(error = %e, participant_id = %reader_participant, "Dropping connection");
                    break;
                }
            }
        }
    });

    // Wait for either task to complete, then abort the other
    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(participant_id = %participant_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(participant_id = %participant_id, "Receive task completed");
            send_task.abort();
        }
    }

    let remaining = sessions.leave(&token, &participant_id, connection_id);

    tracing::info!(
        token = %token,
        participant_id = %participant_id,
        connection_id = %connection_id,
        remaining,
        "WebSocket connection closed"
    );
}
