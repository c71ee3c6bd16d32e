//! Bounded chat history, replayed to every client on connect.

use std::collections::VecDeque;

use chrono::Utc;

use amicale_auth::MemberIdentity;

use crate::events::ChatMessage;

/// Append-only buffer keeping the most recent messages, oldest evicted
/// first. Validation of bodies happens in the gateway before anything
/// reaches this buffer.
#[derive(Debug)]
pub struct ChatHistoryBuffer {
    capacity: usize,
    next_id: u64,
    messages: VecDeque<ChatMessage>,
}

impl ChatHistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            next_id: 1,
            messages: VecDeque::with_capacity(capacity),
        }
    }

    /// Store a message, assigning its id and timestamp, and return it for
    /// broadcasting.
    pub fn append(&mut self, author: &MemberIdentity, body: String) -> ChatMessage {
        let message = ChatMessage {
            id: self.next_id,
            author_id: author.member_id,
            author_name: author.display_name(),
            body,
            sent_at: Utc::now().to_rfc3339(),
        };
        self.next_id += 1;

        // capacity 0 means relay-only: nothing is retained for replay
        if self.capacity > 0 {
            while self.messages.len() >= self.capacity {
                self.messages.pop_front();
            }
            self.messages.push_back(message.clone());
        }
        message
    }

    /// Snapshot of retained messages, oldest-first. Replayable any number of
    /// times; never longer than the configured capacity.
    pub fn recent(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> MemberIdentity {
        MemberIdentity {
            member_id: 4,
            first_name: "Nadia".to_string(),
            last_name: "Bernard".to_string(),
            role: "member".to_string(),
        }
    }

    #[test]
    fn append_assigns_monotonic_ids_and_denormalized_author() {
        let mut buffer = ChatHistoryBuffer::new(10);

        let first = buffer.append(&author(), "one".to_string());
        let second = buffer.append(&author(), "two".to_string());

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.author_name, "Nadia Bernard");
        assert!(!first.sent_at.is_empty());
    }

    #[test]
    fn retention_window_evicts_oldest_first() {
        let mut buffer = ChatHistoryBuffer::new(3);
        for body in ["M1", "M2", "M3", "M4"] {
            buffer.append(&author(), body.to_string());
        }

        let recent = buffer.recent();
        let bodies: Vec<&str> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["M2", "M3", "M4"]);
    }

    #[test]
    fn recent_never_exceeds_capacity_and_stays_ordered() {
        let mut buffer = ChatHistoryBuffer::new(5);
        for i in 0..40 {
            buffer.append(&author(), format!("msg-{i}"));
        }

        let recent = buffer.recent();
        assert_eq!(recent.len(), 5);
        for pair in recent.windows(2) {
            assert!(pair[0].id < pair[1].id, "oldest-first ordering");
        }
        assert_eq!(recent.last().map(|m| m.body.as_str()), Some("msg-39"));
    }

    #[test]
    fn zero_capacity_retains_nothing_but_still_stamps_messages() {
        let mut buffer = ChatHistoryBuffer::new(0);

        for i in 0..5u64 {
            let message = buffer.append(&author(), format!("msg-{i}"));
            assert_eq!(message.id, i + 1);
        }

        assert!(buffer.recent().is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn recent_is_a_replayable_snapshot() {
        let mut buffer = ChatHistoryBuffer::new(3);
        buffer.append(&author(), "hello".to_string());

        assert_eq!(buffer.recent(), buffer.recent());
        assert_eq!(buffer.len(), 1);
    }
}
