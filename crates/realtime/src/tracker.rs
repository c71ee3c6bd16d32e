//! Presence tracker: reduces connection add/remove events into a
//! reference-counted roster of distinct online members.

use std::collections::HashMap;

use chrono::Utc;

use amicale_auth::MemberIdentity;

use crate::events::{MemberId, PresenceEntry};

/// Emitted when the distinct-member roster actually changes. Intermediate
/// transitions (second tab opens, first of two tabs closes) emit nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceChange {
    Joined(PresenceEntry),
    Left(MemberId),
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    entries: HashMap<MemberId, PresenceEntry>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection for `identity` registered. Returns `Joined` only when
    /// this is the member's first live connection.
    pub fn connection_added(&mut self, identity: &MemberIdentity) -> Option<PresenceChange> {
        if let Some(entry) = self.entries.get_mut(&identity.member_id) {
            entry.connections += 1;
            return None;
        }

        let entry = PresenceEntry {
            member_id: identity.member_id,
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            role: identity.role.clone(),
            connections: 1,
            online_since: Utc::now().to_rfc3339(),
        };
        self.entries.insert(identity.member_id, entry.clone());
        Some(PresenceChange::Joined(entry))
    }

    /// A connection for `member_id` closed. Returns `Left` only when it was
    /// the member's last live connection.
    pub fn connection_removed(&mut self, member_id: MemberId) -> Option<PresenceChange> {
        let entry = self.entries.get_mut(&member_id)?;

        entry.connections -= 1;
        if entry.connections == 0 {
            self.entries.remove(&member_id);
            return Some(PresenceChange::Left(member_id));
        }
        None
    }

    /// Roster snapshot used to seed newly connected clients. Sorted by
    /// member id so replays are deterministic.
    pub fn snapshot(&self) -> Vec<PresenceEntry> {
        let mut members: Vec<PresenceEntry> = self.entries.values().cloned().collect();
        members.sort_by_key(|entry| entry.member_id);
        members
    }

    pub fn online_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(member_id: i64, first: &str) -> MemberIdentity {
        MemberIdentity {
            member_id,
            first_name: first.to_string(),
            last_name: "Durand".to_string(),
            role: "member".to_string(),
        }
    }

    #[test]
    fn first_connection_joins_last_connection_leaves() {
        let mut tracker = PresenceTracker::new();
        let alice = identity(1, "Alice");

        let change = tracker.connection_added(&alice).expect("joined");
        assert!(matches!(change, PresenceChange::Joined(ref entry) if entry.member_id == 1));

        let change = tracker.connection_removed(1).expect("left");
        assert_eq!(change, PresenceChange::Left(1));
        assert_eq!(tracker.online_count(), 0);
    }

    #[test]
    fn k_simultaneous_connections_emit_exactly_one_join_and_one_leave() {
        let mut tracker = PresenceTracker::new();
        let alice = identity(1, "Alice");
        let k = 5;

        let mut changes = Vec::new();
        for _ in 0..k {
            changes.extend(tracker.connection_added(&alice));
        }
        for _ in 0..k {
            changes.extend(tracker.connection_removed(1));
        }

        assert_eq!(changes.len(), 2);
        assert!(matches!(changes[0], PresenceChange::Joined(_)));
        assert_eq!(changes[1], PresenceChange::Left(1));
    }

    #[test]
    fn snapshot_collapses_tabs_into_one_entry() {
        let mut tracker = PresenceTracker::new();
        let _ = tracker.connection_added(&identity(2, "Bob"));
        let _ = tracker.connection_added(&identity(2, "Bob"));
        let _ = tracker.connection_added(&identity(1, "Alice"));

        let roster = tracker.snapshot();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].member_id, 1);
        assert_eq!(roster[1].member_id, 2);
        assert_eq!(roster[1].connections, 2);
    }

    #[test]
    fn refresh_where_new_tab_registers_before_old_closes_stays_online() {
        let mut tracker = PresenceTracker::new();
        let alice = identity(1, "Alice");

        assert!(tracker.connection_added(&alice).is_some());
        // new tab registers first, then the old one closes
        assert!(tracker.connection_added(&alice).is_none());
        assert!(tracker.connection_removed(1).is_none());

        assert_eq!(tracker.online_count(), 1);
    }

    #[test]
    fn removal_of_unknown_member_is_a_no_op() {
        let mut tracker = PresenceTracker::new();
        assert!(tracker.connection_removed(99).is_none());
    }
}
