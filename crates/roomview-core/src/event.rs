//! Timeline events as seen by the room view.

use serde::{Deserialize, Serialize};

use crate::types::{EventId, RoomId, UserId};

/// Membership transition carried by a member event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberChange {
    /// User joined
    Joined,
    /// User left or was kicked
    Left,
    /// User was invited
    Invited,
    /// User was banned
    Banned,
    /// Avatar changed, membership unchanged
    AvatarChanged,
    /// Display name changed, membership unchanged
    DisplayNameChanged,
}

/// Content classification relevant to the room view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Message with a msgtype and plain-text body
    Message {
        /// `msgtype` field (e.g. `m.text`)
        msgtype: String,
        /// Plain-text body
        body: String,
    },
    /// Reaction annotation
    Reaction,
    /// Redaction of another event
    Redaction,
    /// Membership state event
    Member {
        /// What changed
        change: MemberChange,
    },
    /// Encryption enabled for the room
    Encryption,
    /// Room-level URL preview toggle
    PreviewUrls,
    /// Anything else
    Other {
        /// Matrix event type
        event_type: String,
    },
}

/// Decryption progress of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecryptionState {
    /// Never encrypted
    #[default]
    Plain,
    /// Decryption still in progress
    Pending,
    /// Decrypted successfully
    Decrypted,
    /// Decryption failed
    Failed,
}

/// One timeline event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event id
    pub event_id: EventId,
    /// Room the event belongs to
    pub room_id: RoomId,
    /// Sender
    pub sender: UserId,
    /// Content classification
    pub kind: EventKind,
    /// Decryption progress
    pub decryption: DecryptionState,
    /// Whether the event was redacted
    pub redacted: bool,
    /// Event this one edits, if it is an edit
    pub replaces: Option<EventId>,
    /// Thread root, if this event is a thread reply
    pub thread_root: Option<EventId>,
}

impl TimelineEvent {
    /// Plain `m.text` message.
    pub fn text(event_id: EventId, room_id: RoomId, sender: UserId, body: impl Into<String>) -> Self {
        Self {
            event_id,
            room_id,
            sender,
            kind: EventKind::Message { msgtype: "m.text".to_owned(), body: body.into() },
            decryption: DecryptionState::Plain,
            redacted: false,
            replaces: None,
            thread_root: None,
        }
    }

    /// Whether decryption is pending or failed.
    pub fn is_undecrypted(&self) -> bool {
        matches!(self.decryption, DecryptionState::Pending | DecryptionState::Failed)
    }
}

/// Which timeline set an event was delivered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineSet {
    /// The room's main, unfiltered timeline set
    #[default]
    Unfiltered,
    /// A filtered view (e.g. files panel)
    Filtered,
    /// The notification timeline
    Notifications,
}

/// Delivery context of a timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineDelivery {
    /// Timeline set the event arrived through
    pub timeline_set: TimelineSet,
    /// Event was prepended by back-pagination
    pub to_start: bool,
    /// Event arrived through live sync
    pub live: bool,
}

impl TimelineDelivery {
    /// Live sync delivery on the unfiltered timeline.
    pub fn live() -> Self {
        Self { timeline_set: TimelineSet::Unfiltered, to_start: false, live: true }
    }

    /// Back-pagination delivery on the unfiltered timeline.
    pub fn paginated() -> Self {
        Self { timeline_set: TimelineSet::Unfiltered, to_start: true, live: false }
    }
}

/// Context of a fetched event, used to route the initial event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Fetched event id
    pub event_id: EventId,
    /// Thread root, if the event belongs to a thread
    pub thread_root: Option<EventId>,
}

impl EventContext {
    /// Whether the event is a reply inside a thread (not the root itself).
    pub fn is_thread_reply(&self) -> bool {
        self.thread_root.as_ref().is_some_and(|root| *root != self.event_id)
    }
}
