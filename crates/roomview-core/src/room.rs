//! Locally known room snapshots.
//!
//! A [`RoomHandle`] is a value copy of what the room store knows about a room
//! at one point in time. Collaborators hand the controller a fresh handle on
//! every room mutation instead of patching fields in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{RoomId, TimelineId, UserId};

/// Event type for plain messages.
pub const EVENT_MESSAGE: &str = "m.room.message";

/// Event type for reactions.
pub const EVENT_REACTION: &str = "m.reaction";

/// Event type for redactions.
pub const EVENT_REDACTION: &str = "m.room.redaction";

/// Membership of a user in a room, as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    /// No relationship with the room
    #[default]
    None,
    /// Invited but not yet joined
    Invited,
    /// Joined member
    Joined,
    /// Left (or was kicked)
    Left,
    /// Banned from the room
    Banned,
}

/// Who may read the room history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryVisibility {
    /// Anyone, including non-members, may read the history
    WorldReadable,
    /// Members may read all history
    #[default]
    Shared,
    /// Members may read history since they were invited
    Invited,
    /// Members may read history since they joined
    Joined,
}

/// Lifecycle of a local (not yet created) room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalRoomState {
    /// Draft room, nothing sent yet
    New,
    /// Creation request in flight
    Creating,
    /// Server created the room
    Created,
    /// Creation failed
    Error,
}

/// Kind of room being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum RoomKind {
    /// Plain chat room
    #[default]
    Regular,
    /// Space (a room of rooms)
    Space,
    /// Room whose main content is a persistent call
    VideoRoom,
    /// Local draft room not yet created on the server
    Local(LocalRoomState),
}

/// Successor recorded by a tombstone state event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Room that replaces this one
    pub replacement_room: RoomId,
}

/// Power level table of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerLevels {
    /// Level of users without an explicit entry
    pub users_default: i64,
    /// Level required for message events without an explicit entry
    pub events_default: i64,
    /// Level required for state events without an explicit entry
    pub state_default: i64,
    /// Explicit user levels
    pub users: BTreeMap<UserId, i64>,
    /// Explicit event type requirements
    pub events: BTreeMap<String, i64>,
}

impl Default for PowerLevels {
    fn default() -> Self {
        Self {
            users_default: 0,
            events_default: 0,
            state_default: 50,
            users: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }
}

impl PowerLevels {
    /// Power level of `user`.
    pub fn user_level(&self, user: &UserId) -> i64 {
        self.users.get(user).copied().unwrap_or(self.users_default)
    }

    /// Level required to send `event_type`.
    pub fn required_for(&self, event_type: &str, is_state: bool) -> i64 {
        match self.events.get(event_type) {
            Some(level) => *level,
            None if is_state => self.state_default,
            None => self.events_default,
        }
    }

    /// Whether `user` may send a (non-state) event of `event_type`.
    pub fn may_send_event(&self, event_type: &str, user: &UserId) -> bool {
        self.user_level(user) >= self.required_for(event_type, false)
    }
}

/// Value snapshot of a locally known room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomHandle {
    /// Canonical id
    pub room_id: RoomId,
    /// Display name, if known
    pub name: Option<String>,
    /// Kind of room
    pub kind: RoomKind,
    /// Membership of the local user
    pub my_membership: Membership,
    /// Whether end-to-end encryption is enabled
    pub encrypted: bool,
    /// History visibility
    pub history_visibility: HistoryVisibility,
    /// Known members and their membership
    pub members: BTreeMap<UserId, Membership>,
    /// Power level table
    pub power_levels: PowerLevels,
    /// Successor room, if the room was upgraded
    pub tombstone: Option<Tombstone>,
    /// Who invited the local user, if invited
    pub inviter: Option<UserId>,
    /// Current live timeline generation
    pub live_timeline: TimelineId,
}

impl RoomHandle {
    /// New regular, unencrypted room with no members and default power levels.
    pub fn new(room_id: RoomId, my_membership: Membership) -> Self {
        Self {
            room_id,
            name: None,
            kind: RoomKind::Regular,
            my_membership,
            encrypted: false,
            history_visibility: HistoryVisibility::default(),
            members: BTreeMap::new(),
            power_levels: PowerLevels::default(),
            tombstone: None,
            inviter: None,
            live_timeline: TimelineId(0),
        }
    }

    /// Whether `user` is a current member (joined or invited).
    pub fn is_member(&self, user: &UserId) -> bool {
        matches!(self.members.get(user), Some(Membership::Joined | Membership::Invited))
    }

    /// Joined plus invited member count.
    pub fn joined_or_invited_count(&self) -> usize {
        self.members
            .values()
            .filter(|m| matches!(m, Membership::Joined | Membership::Invited))
            .count()
    }

    /// Whether the local user is joined.
    pub fn is_joined(&self) -> bool {
        self.my_membership == Membership::Joined
    }

    /// Whether `user` may send an event of `event_type` right now.
    ///
    /// Sending requires the local user to be joined.
    pub fn may_send_event(&self, event_type: &str, user: &UserId) -> bool {
        self.is_joined() && self.power_levels.may_send_event(event_type, user)
    }

    /// Whether anyone may read the history without joining.
    pub fn is_world_readable(&self) -> bool {
        self.history_visibility == HistoryVisibility::WorldReadable
    }

    /// Whether this is a local draft room.
    pub fn is_local(&self) -> bool {
        matches!(self.kind, RoomKind::Local(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_event_level_overrides_default() {
        let alice = UserId::from("@alice:example.org");
        let mut levels = PowerLevels::default();
        levels.events.insert(EVENT_REACTION.to_owned(), 10);

        assert!(levels.may_send_event(EVENT_MESSAGE, &alice));
        assert!(!levels.may_send_event(EVENT_REACTION, &alice));

        levels.users.insert(alice.clone(), 10);
        assert!(levels.may_send_event(EVENT_REACTION, &alice));
    }

    #[test]
    fn sending_requires_joined() {
        let alice = UserId::from("@alice:example.org");
        let mut room = RoomHandle::new(RoomId::from("!r:example.org"), Membership::Invited);
        assert!(!room.may_send_event(EVENT_MESSAGE, &alice));

        room.my_membership = Membership::Joined;
        assert!(room.may_send_event(EVENT_MESSAGE, &alice));
    }

    #[test]
    fn member_counts_ignore_departed() {
        let mut room = RoomHandle::new(RoomId::from("!r:example.org"), Membership::Joined);
        room.members.insert(UserId::from("@a:x"), Membership::Joined);
        room.members.insert(UserId::from("@b:x"), Membership::Invited);
        room.members.insert(UserId::from("@c:x"), Membership::Left);

        assert_eq!(room.joined_or_invited_count(), 2);
        assert!(!room.is_member(&UserId::from("@c:x")));
    }
}
