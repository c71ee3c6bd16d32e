//! Connection registry: the only owner of live connection records.

use std::collections::HashMap;
use std::time::Instant;

use crate::error::RealtimeError;
use crate::events::{ConnectionId, MemberId};

/// One live transport session bound to an authenticated member.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub member_id: MemberId,
    pub connected_at: Instant,
}

/// Tracks live connections. Lifecycle mutations happen here and nowhere else;
/// the core forwards every add/remove to the presence tracker in the same
/// locked step, so the roster never observably lags connection state.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly authenticated connection. The gateway assigns ids,
    /// so a duplicate indicates a bug upstream and is rejected.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        member_id: MemberId,
    ) -> Result<(), RealtimeError> {
        if self.connections.contains_key(&connection_id) {
            return Err(RealtimeError::DuplicateConnection(connection_id));
        }

        self.connections.insert(
            connection_id,
            Connection {
                id: connection_id,
                member_id,
                connected_at: Instant::now(),
            },
        );
        Ok(())
    }

    /// Remove a connection, returning the member it belonged to. Unknown ids
    /// are a no-op so double-close races stay harmless.
    pub fn unregister(&mut self, connection_id: ConnectionId) -> Option<MemberId> {
        self.connections
            .remove(&connection_id)
            .map(|connection| connection.member_id)
    }

    pub fn connections_of(&self, member_id: MemberId) -> usize {
        self.connections
            .values()
            .filter(|connection| connection.member_id == member_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
