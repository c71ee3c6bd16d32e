//! Broadcast router: fans one core event out to every connection's
//! outbound queue without waiting on any of them.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::events::{ConnectionId, ServerEvent};

/// Best-effort, at-most-once fan-out. Each connection owns a bounded queue;
/// a full queue or a mid-close connection loses that one event for that one
/// connection. Presence drops self-heal via the next roster snapshot and
/// chat drops via the history replay on reconnect.
#[derive(Debug, Default)]
pub struct BroadcastRouter {
    queues: HashMap<ConnectionId, mpsc::Sender<ServerEvent>>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, connection_id: ConnectionId, queue: mpsc::Sender<ServerEvent>) {
        self.queues.insert(connection_id, queue);
    }

    pub fn detach(&mut self, connection_id: ConnectionId) {
        self.queues.remove(&connection_id);
    }

    /// Enqueue `event` on every attached connection. Never blocks and never
    /// fails; slow consumers only lose their own copy.
    pub fn broadcast(&self, event: &ServerEvent) {
        for (connection_id, queue) in &self.queues {
            match queue.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(%connection_id, "outbound queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%connection_id, "connection closing, dropping event");
                }
            }
        }
    }

    /// Enqueue an event for a single connection, same drop policy.
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(queue) = self.queues.get(&connection_id) {
            match queue.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!(%connection_id, "outbound queue full, dropping direct event");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%connection_id, "connection closing, dropping direct event");
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
