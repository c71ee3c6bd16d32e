//! # Amicale Realtime Core
//!
//! Single-process authoritative state for the portal's presence roster and
//! chat relay: who is online (collapsed across browser tabs), the recent
//! message window, and fan-out to every live connection.
//!
//! All mutations go through [`RealtimeCore`], which serializes them behind
//! one mutex. Connection registration, presence reduction, and the resulting
//! broadcast happen in the same locked step, so every client observes the
//! same total order of events.

pub mod error;
pub mod events;
pub mod history;
pub mod registry;
pub mod router;
pub mod tracker;

pub use error::RealtimeError;
pub use events::{ChatMessage, ClientFrame, ConnectionId, MemberId, PresenceEntry, ServerEvent};
pub use tracker::PresenceChange;

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::info;

use amicale_auth::MemberIdentity;
use amicale_config::RealtimeConfig;

use history::ChatHistoryBuffer;
use registry::ConnectionRegistry;
use router::BroadcastRouter;
use tracker::PresenceTracker;

struct CoreState {
    registry: ConnectionRegistry,
    tracker: PresenceTracker,
    history: ChatHistoryBuffer,
    router: BroadcastRouter,
}

/// Cloneable handle to the serialized realtime state.
///
/// Operations are applied strictly in arrival order. On a tab refresh the
/// browser usually opens the new socket before the old one closes, which
/// nets to "stayed online" with no presence events; if the close lands
/// first, a leave followed by a join is emitted. There is no batching.
#[derive(Clone)]
pub struct RealtimeCore {
    inner: Arc<Mutex<CoreState>>,
}

impl RealtimeCore {
    pub fn new(config: &RealtimeConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CoreState {
                registry: ConnectionRegistry::new(),
                tracker: PresenceTracker::new(),
                history: ChatHistoryBuffer::new(config.history_capacity),
                router: BroadcastRouter::new(),
            })),
        }
    }

    /// Register an authenticated connection and seed it.
    ///
    /// In one locked step: the connection is registered, the presence
    /// tracker reduces the add (emitting `presence.joined` to the *already*
    /// connected clients if this member just came online), and the new
    /// connection's queue receives the roster snapshot and chat history.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        identity: &MemberIdentity,
        queue: mpsc::Sender<ServerEvent>,
    ) -> Result<(), RealtimeError> {
        let mut state = self.inner.lock().await;

        state.registry.register(connection_id, identity.member_id)?;

        if let Some(PresenceChange::Joined(entry)) = state.tracker.connection_added(identity) {
            info!(member_id = entry.member_id, "member came online");
            state.router.broadcast(&ServerEvent::Joined {
                member_id: entry.member_id,
                first_name: entry.first_name,
                last_name: entry.last_name,
            });
        }

        // Attach after the join broadcast: the newcomer learns about itself
        // from the roster snapshot, not from its own join event.
        state.router.attach(connection_id, queue);
        state.router.send_to(
            connection_id,
            ServerEvent::Roster {
                members: state.tracker.snapshot(),
            },
        );
        state.router.send_to(
            connection_id,
            ServerEvent::History {
                messages: state.history.recent(),
            },
        );

        Ok(())
    }

    /// Remove a connection and emit `presence.left` if it was the member's
    /// last. Safe to call more than once for the same id.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut state = self.inner.lock().await;

        state.router.detach(connection_id);
        let Some(member_id) = state.registry.unregister(connection_id) else {
            return;
        };

        if let Some(PresenceChange::Left(member_id)) = state.tracker.connection_removed(member_id)
        {
            info!(member_id, "member went offline");
            state.router.broadcast(&ServerEvent::Left { member_id });
        }
    }

    /// Append a validated chat message and fan it out to every open
    /// connection, the author's included.
    pub async fn publish_chat(&self, author: &MemberIdentity, body: String) -> ChatMessage {
        let mut state = self.inner.lock().await;

        let message = state.history.append(author, body);
        state.router.broadcast(&ServerEvent::Message {
            message: message.clone(),
        });
        message
    }

    /// Enqueue an event for one connection (heartbeat replies, per-sender
    /// errors).
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        let state = self.inner.lock().await;
        state.router.send_to(connection_id, event);
    }

    pub async fn roster(&self) -> Vec<PresenceEntry> {
        self.inner.lock().await.tracker.snapshot()
    }

    pub async fn recent(&self) -> Vec<ChatMessage> {
        self.inner.lock().await.history.recent()
    }

    pub async fn connections_of(&self, member_id: MemberId) -> usize {
        self.inner.lock().await.registry.connections_of(member_id)
    }
}
