use thiserror::Error;

use crate::events::ConnectionId;

#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The gateway assigns connection ids, so this indicates an upstream bug.
    #[error("connection id {0} is already registered")]
    DuplicateConnection(ConnectionId),
}
