//! Hidden-event policy.
//!
//! Decides which events are noise for unread accounting, based on the per-room
//! visibility toggles.

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, MemberChange, TimelineEvent};

/// Per-room visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    /// Show events normally hidden (edits, unknown types)
    pub show_hidden_events: bool,
    /// Show read receipts
    pub show_read_receipts: bool,
    /// Show redacted events as placeholders
    pub show_redactions: bool,
    /// Show joins and leaves
    pub show_join_leaves: bool,
    /// Show avatar changes
    pub show_avatar_changes: bool,
    /// Show display name changes
    pub show_displayname_changes: bool,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            show_hidden_events: false,
            show_read_receipts: true,
            show_redactions: true,
            show_join_leaves: true,
            show_avatar_changes: true,
            show_displayname_changes: true,
        }
    }
}

impl VisibilityPolicy {
    /// Whether `event` is hidden under this policy.
    pub fn should_hide(&self, event: &TimelineEvent) -> bool {
        if event.redacted && !self.show_redactions {
            return true;
        }
        if event.replaces.is_some() && !self.show_hidden_events {
            return true;
        }

        match &event.kind {
            EventKind::Member { change } => match change {
                MemberChange::Joined | MemberChange::Left => !self.show_join_leaves,
                MemberChange::AvatarChanged => !self.show_avatar_changes,
                MemberChange::DisplayNameChanged => !self.show_displayname_changes,
                MemberChange::Invited | MemberChange::Banned => false,
            },
            EventKind::Reaction | EventKind::Redaction => true,
            EventKind::Other { .. } => !self.show_hidden_events,
            EventKind::Message { .. } | EventKind::Encryption | EventKind::PreviewUrls => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventId, RoomId, UserId};

    fn member(change: MemberChange) -> TimelineEvent {
        let mut event = TimelineEvent::text(
            EventId::from("$m"),
            RoomId::from("!r:x"),
            UserId::from("@bob:x"),
            "",
        );
        event.kind = EventKind::Member { change };
        event
    }

    #[test]
    fn join_leave_toggle() {
        let mut policy = VisibilityPolicy::default();
        assert!(!policy.should_hide(&member(MemberChange::Joined)));

        policy.show_join_leaves = false;
        assert!(policy.should_hide(&member(MemberChange::Joined)));
        assert!(policy.should_hide(&member(MemberChange::Left)));
        assert!(!policy.should_hide(&member(MemberChange::AvatarChanged)));
    }

    #[test]
    fn redactions_and_edits() {
        let mut policy = VisibilityPolicy::default();
        let mut event = TimelineEvent::text(EventId::from("$e"), RoomId::from("!r:x"), UserId::from("@bob:x"), "hi");
        event.redacted = true;
        assert!(!policy.should_hide(&event));

        policy.show_redactions = false;
        assert!(policy.should_hide(&event));

        event.redacted = false;
        event.replaces = Some(EventId::from("$orig"));
        assert!(policy.should_hide(&event));
    }

    #[test]
    fn plain_messages_never_hidden() {
        let policy = VisibilityPolicy {
            show_hidden_events: false,
            show_read_receipts: false,
            show_redactions: false,
            show_join_leaves: false,
            show_avatar_changes: false,
            show_displayname_changes: false,
        };
        let event = TimelineEvent::text(EventId::from("$e"), RoomId::from("!r:x"), UserId::from("@bob:x"), "hi");
        assert!(!policy.should_hide(&event));
    }
}
