//! WebSocket endpoint and per-connection session loop.
//!
//! Connection lifecycle: the HTTP upgrade is the `Connecting` step,
//! [`authenticate`] is `Authenticating`, the receive loop below is `Open`,
//! and everything after the loop exits is `Closing`/`Closed`. A connection
//! that fails authentication is closed before it ever registers, so it can
//! never appear in a roster snapshot or pollute the history.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use amicale_auth::MemberIdentity;
use amicale_config::ChatRateLimitConfig;
use amicale_realtime::{ClientFrame, ConnectionId, ServerEvent};

use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn realtime_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

async fn authenticate(
    state: &GatewayState,
    token: Option<String>,
) -> GatewayResult<MemberIdentity> {
    let token = token
        .ok_or_else(|| GatewayError::AuthenticationFailed("missing token".to_string()))?;
    let identity = state.sessions.validate_token(&token).await?;
    Ok(identity)
}

async fn handle_socket(mut socket: WebSocket, state: Arc<GatewayState>, token: Option<String>) {
    let identity = match authenticate(&state, token).await {
        Ok(identity) => identity,
        Err(error) => {
            debug!(%error, "websocket authentication failed");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: error.to_string().into(),
                })))
                .await;
            return;
        }
    };

    let connection_id = Uuid::new_v4();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(state.realtime.send_queue_capacity);

    if let Err(error) = state.core.connect(connection_id, &identity, out_tx).await {
        warn!(%connection_id, %error, "failed to register connection");
        let _ = socket
            .send(Message::Close(Some(CloseFrame {
                code: close_code::ERROR,
                reason: "registration failed".into(),
            })))
            .await;
        return;
    }

    info!(
        %connection_id,
        member_id = identity.member_id,
        "websocket session open"
    );

    let (mut sink, mut stream) = socket.split();

    // All sends to the socket go through the per-connection queue; this task
    // is the only writer, so a slow client never blocks the core.
    let send_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "failed to serialize outbound event");
                }
            }
        }
        let _ = sink.close().await;
    });

    let heartbeat = Duration::from_secs(state.realtime.heartbeat_timeout_seconds);
    let mut limiter = FixedWindowLimiter::new(&state.realtime.chat_rate_limit);

    loop {
        let frame = match tokio::time::timeout(heartbeat, stream.next()).await {
            Err(_) => {
                info!(%connection_id, "heartbeat timeout, closing connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                // network-level drop, handled exactly like a clean disconnect
                debug!(%connection_id, %error, "websocket transport error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::ChatSend { body }) => {
                    match accept_chat_send(&body, state.realtime.max_message_len, &mut limiter) {
                        Ok(body) => {
                            state.core.publish_chat(&identity, body).await;
                        }
                        Err(error) => {
                            state
                                .core
                                .send_to(
                                    connection_id,
                                    ServerEvent::Error {
                                        message: error.to_string(),
                                    },
                                )
                                .await;
                        }
                    }
                }
                Ok(ClientFrame::Ping) => {
                    state.core.send_to(connection_id, ServerEvent::Pong).await;
                }
                Err(error) => {
                    debug!(%connection_id, %error, "unparseable client frame");
                    state
                        .core
                        .send_to(
                            connection_id,
                            ServerEvent::Error {
                                message: "unrecognized frame".to_string(),
                            },
                        )
                        .await;
                }
            },
            Message::Close(_) => break,
            // Protocol ping/pong frames refresh the idle deadline simply by
            // arriving; everything else is ignored, not fatal.
            _ => {}
        }
    }

    state.core.disconnect(connection_id).await;
    // The core dropped its queue sender, so the send task drains and exits.
    let _ = send_task.await;

    info!(
        %connection_id,
        member_id = identity.member_id,
        "websocket session closed"
    );
}

/// Validate an inbound chat body against the gateway's limits. Rejections
/// only ever reach the sender; nothing invalid touches the history buffer.
fn accept_chat_send(
    body: &str,
    max_len: usize,
    limiter: &mut FixedWindowLimiter,
) -> GatewayResult<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidMessage(
            "message body must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_len {
        return Err(GatewayError::InvalidMessage(format!(
            "message body exceeds {max_len} characters"
        )));
    }
    if !limiter.allow() {
        return Err(GatewayError::RateLimitExceeded);
    }
    Ok(trimmed.to_string())
}

/// Fixed-window counter for chat sends on one connection.
struct FixedWindowLimiter {
    max: u32,
    window: Duration,
    window_start: Instant,
    count: u32,
}

impl FixedWindowLimiter {
    fn new(config: &ChatRateLimitConfig) -> Self {
        Self {
            max: config.max_messages,
            window: Duration::from_secs(config.per_seconds),
            window_start: Instant::now(),
            count: 0,
        }
    }

    fn allow(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.count = 0;
        }

        if self.count >= self.max {
            return false;
        }
        self.count += 1;
        true
    }
}
