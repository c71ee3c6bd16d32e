//! Wire protocol shared by the gateway and the client agent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MemberId = i64;
pub type ConnectionId = Uuid;

/// One member's aggregate online status, collapsed across their connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub member_id: MemberId,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    /// Live connections backing this entry; always >= 1 while the entry exists.
    pub connections: u32,
    /// RFC 3339 start of the current online period.
    pub online_since: String,
}

/// An immutable chat message as stored and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub author_id: MemberId,
    /// Display name captured at send time, never re-resolved.
    pub author_name: String,
    pub body: String,
    /// RFC 3339 send timestamp.
    pub sent_at: String,
}

/// Server -> client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Full roster snapshot, sent once on connect.
    #[serde(rename = "presence.roster")]
    Roster { members: Vec<PresenceEntry> },
    /// A member came online (their first connection).
    #[serde(rename = "presence.joined")]
    Joined {
        member_id: MemberId,
        first_name: String,
        last_name: String,
    },
    /// A member went offline (their last connection closed).
    #[serde(rename = "presence.left")]
    Left { member_id: MemberId },
    /// Recent messages, oldest-first, sent once on connect.
    #[serde(rename = "chat.history")]
    History { messages: Vec<ChatMessage> },
    /// One newly sent chat message.
    #[serde(rename = "chat.message")]
    Message { message: ChatMessage },
    /// Heartbeat response.
    #[serde(rename = "pong")]
    Pong,
    /// Error delivered to the offending sender only.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Client -> server operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "chat.send")]
    ChatSend { body: String },
    #[serde(rename = "ping")]
    Ping,
}
