//! The browser-tab-side realtime agent: one logical connection, observable
//! roster/message/state streams, and the only place reconnection policy
//! lives.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use amicale_realtime::{ChatMessage, PresenceEntry, ServerEvent};

use crate::error::ClientError;
use crate::reconnect::{BackoffConfig, ReconnectDecision, ReconnectPolicy};

/// Connection state surfaced to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    GivenUp,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the realtime gateway, e.g. `ws://127.0.0.1:7080`.
    pub url: String,
    /// Bearer token from the portal's session; connection is only attempted
    /// when one is present.
    pub token: String,
    pub backoff: BackoffConfig,
    /// How often the agent pings the gateway while connected.
    pub heartbeat_interval: Duration,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            backoff: BackoffConfig::default(),
            heartbeat_interval: Duration::from_secs(10),
        }
    }
}

enum Command {
    Send(String),
    Disconnect,
}

/// Handle to a running agent. Dropping it disconnects.
pub struct RealtimeAgent {
    commands: mpsc::Sender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    roster_rx: watch::Receiver<Vec<PresenceEntry>>,
    messages_tx: broadcast::Sender<ChatMessage>,
    task: JoinHandle<()>,
}

impl RealtimeAgent {
    /// Start the agent. Fails immediately when no token is present; logged
    /// out users never open a socket.
    pub fn connect(config: AgentConfig) -> Result<Self, ClientError> {
        if config.token.is_empty() {
            return Err(ClientError::MissingToken);
        }

        let (commands, command_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (roster_tx, roster_rx) = watch::channel(Vec::new());
        let (messages_tx, _) = broadcast::channel(256);

        let task = tokio::spawn(run(
            config,
            command_rx,
            state_tx,
            roster_tx,
            messages_tx.clone(),
        ));

        Ok(Self {
            commands,
            state_rx,
            roster_rx,
            messages_tx,
            task,
        })
    }

    /// Latest connection state; updates in place.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Latest roster snapshot; updates in place.
    pub fn online_members(&self) -> watch::Receiver<Vec<PresenceEntry>> {
        self.roster_rx.clone()
    }

    /// Stream of observed chat messages (history replay, then live).
    /// Subscribe before the connection opens to observe the full sequence.
    pub fn messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.messages_tx.subscribe()
    }

    /// Send a chat message. Rejected locally while disconnected rather than
    /// queued, so a reconnect never silently reorders sends.
    pub async fn send_chat(&self, body: impl Into<String>) -> Result<(), ClientError> {
        if *self.state_rx.borrow() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }

        self.commands
            .send(Command::Send(body.into()))
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    /// Explicit logout: close the connection and do not reconnect.
    pub async fn disconnect(self) {
        let _ = self.commands.send(Command::Disconnect).await;
        let _ = self.task.await;
    }
}

async fn run(
    config: AgentConfig,
    mut commands: mpsc::Receiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    roster_tx: watch::Sender<Vec<PresenceEntry>>,
    messages_tx: broadcast::Sender<ChatMessage>,
) {
    let mut policy = ReconnectPolicy::new(config.backoff.clone());
    let url = format!("{}/ws?token={}", config.url, config.token);

    'lifecycle: loop {
        policy.connect_started();

        match connect_async(&url).await {
            Ok((ws, _response)) => {
                policy.connected();
                let _ = state_tx.send(ConnectionState::Connected);

                let (mut sink, mut stream) = ws.split();
                let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
                heartbeat.tick().await; // first tick fires immediately

                loop {
                    tokio::select! {
                        frame = stream.next() => match frame {
                            Some(Ok(Message::Text(text))) => {
                                apply_event(&text, &roster_tx, &messages_tx);
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(error)) => {
                                debug!(%error, "transport error");
                                break;
                            }
                        },
                        _ = heartbeat.tick() => {
                            let ping = json!({ "type": "ping" }).to_string();
                            if sink.send(Message::Text(ping)).await.is_err() {
                                break;
                            }
                        },
                        command = commands.recv() => match command {
                            Some(Command::Send(body)) => {
                                let frame =
                                    json!({ "type": "chat.send", "body": body }).to_string();
                                if sink.send(Message::Text(frame)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Command::Disconnect) | None => {
                                let _ = sink.send(Message::Close(None)).await;
                                let _ = state_tx.send(ConnectionState::Disconnected);
                                break 'lifecycle;
                            }
                        },
                    }
                }
            }
            Err(error) => {
                debug!(%error, "connection attempt failed");
            }
        }

        // unexpected close or failed attempt
        match policy.connection_lost() {
            ReconnectDecision::RetryAfter { attempt, delay } => {
                let _ = state_tx.send(ConnectionState::Reconnecting { attempt });
                tokio::select! {
                    _ = sleep(delay) => {}
                    command = commands.recv() => {
                        if matches!(command, Some(Command::Disconnect) | None) {
                            let _ = state_tx.send(ConnectionState::Disconnected);
                            break 'lifecycle;
                        }
                        // sends during backoff are dropped; the handle
                        // already rejects them while not connected
                    }
                }
            }
            ReconnectDecision::GiveUp => {
                warn!("reconnect ceiling reached, giving up");
                let _ = state_tx.send(ConnectionState::GivenUp);
                break 'lifecycle;
            }
        }
    }
}

fn apply_event(
    text: &str,
    roster_tx: &watch::Sender<Vec<PresenceEntry>>,
    messages_tx: &broadcast::Sender<ChatMessage>,
) {
    let event: ServerEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(error) => {
            debug!(%error, "ignoring unparseable server event");
            return;
        }
    };

    match event {
        ServerEvent::Roster { members } => {
            let _ = roster_tx.send(members);
        }
        ServerEvent::Joined {
            member_id,
            first_name,
            last_name,
        } => {
            roster_tx.send_modify(|roster| {
                if roster.iter().all(|entry| entry.member_id != member_id) {
                    roster.push(PresenceEntry {
                        member_id,
                        first_name,
                        last_name,
                        // the join event carries names only; the next roster
                        // snapshot fills in the rest
                        role: String::new(),
                        connections: 1,
                        online_since: String::new(),
                    });
                }
            });
        }
        ServerEvent::Left { member_id } => {
            roster_tx.send_modify(|roster| {
                roster.retain(|entry| entry.member_id != member_id);
            });
        }
        ServerEvent::History { messages } => {
            for message in messages {
                let _ = messages_tx.send(message);
            }
        }
        ServerEvent::Message { message } => {
            let _ = messages_tx.send(message);
        }
        ServerEvent::Pong => {}
        ServerEvent::Error { message } => {
            warn!(%message, "gateway rejected an operation");
        }
    }
}
