//! Kind of room view.
//!
//! Every combination of room kind, membership and load progress maps to
//! exactly one [`ViewMode`], so renderers match exhaustively instead of
//! re-deriving the branch from loose flags.

use serde::Serialize;

use crate::{
    error::ResolutionError,
    room::{LocalRoomState, Membership, RoomHandle, RoomKind},
    types::UserId,
};

/// Tagged union of room views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    /// Local draft room whose creation is in flight
    LocalRoomCreating,
    /// Local draft room
    LocalRoom {
        /// Creation failed; offer a retry
        failed: bool,
    },
    /// No room object yet
    Loading {
        /// Show the room preview skeleton rather than a spinner
        preview_loading: bool,
    },
    /// No room object; join prompt
    Preview {
        /// The room refused a peek
        peek_refused: bool,
    },
    /// Terminal resolution failure
    Unavailable {
        /// Why the room cannot be shown
        cause: ResolutionError,
    },
    /// Video room the user cannot enter yet
    VideoRoomPreview,
    /// Pending invite
    Invite {
        /// Join in flight
        joining: bool,
        /// Rejection in flight
        rejecting: bool,
        /// Who sent the invite
        inviter: Option<UserId>,
    },
    /// Space home
    Space,
    /// Regular room timeline
    Room {
        /// Viewing through a peek session
        peeking: bool,
    },
}

/// Inputs of the view mode derivation.
#[derive(Debug, Clone, Copy)]
pub struct ViewModeInputs<'a> {
    /// Room object, if one exists
    pub room: Option<&'a RoomHandle>,
    /// Terminal resolution failure
    pub failure: Option<&'a ResolutionError>,
    /// Client finished its initial sync
    pub client_ready: bool,
    /// Alias resolution or room lookup in flight
    pub loading: bool,
    /// Peek in flight
    pub peek_loading: bool,
    /// Peek refused by the room
    pub peek_refused: bool,
    /// Peek session active
    pub peeking: bool,
    /// Join in flight
    pub joining: bool,
    /// Invite rejection in flight
    pub rejecting: bool,
    /// Video rooms feature enabled
    pub video_rooms_enabled: bool,
}

impl ViewMode {
    /// Derives the view mode.
    pub fn derive(inputs: ViewModeInputs<'_>) -> Self {
        if let Some(cause) = inputs.failure {
            return Self::Unavailable { cause: cause.clone() };
        }

        let Some(room) = inputs.room else {
            if !inputs.client_ready || inputs.loading || inputs.peek_loading {
                return Self::Loading { preview_loading: inputs.peek_loading || !inputs.client_ready };
            }
            return Self::Preview { peek_refused: inputs.peek_refused };
        };

        match room.kind {
            RoomKind::Local(LocalRoomState::Creating) => Self::LocalRoomCreating,
            RoomKind::Local(state) => Self::LocalRoom { failed: state == LocalRoomState::Error },
            RoomKind::VideoRoom if !(inputs.video_rooms_enabled && room.is_joined()) => Self::VideoRoomPreview,
            RoomKind::Space => Self::Space,
            _ if room.my_membership == Membership::Invited => Self::Invite {
                joining: inputs.joining,
                rejecting: inputs.rejecting,
                inviter: room.inviter.clone(),
            },
            RoomKind::Regular | RoomKind::VideoRoom => Self::Room { peeking: inputs.peeking },
        }
    }
}
