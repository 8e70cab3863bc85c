//! Controller configuration and per-mount view request.

use std::time::Duration;

use roomview_core::{
    reconciler::DEFAULT_EFFECT_HISTORY,
    throttle::DEFAULT_MEMBER_UPDATE_WINDOW,
    types::{EventId, RoomTarget, UserId},
};

/// Controller configuration.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Window of the member-update throttle
    pub member_update_throttle: Duration,
    /// Load the member list lazily once joined
    pub lazy_load_members: bool,
    /// Group calls feature; viewing a call takes over the main area
    pub group_calls_enabled: bool,
    /// Video rooms feature
    pub video_rooms_enabled: bool,
    /// Threads feature; thread replies never trigger chat effects
    pub threads_enabled: bool,
    /// Event ids remembered for effect deduplication
    pub effect_history: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            member_update_throttle: DEFAULT_MEMBER_UPDATE_WINDOW,
            lazy_load_members: true,
            group_calls_enabled: false,
            video_rooms_enabled: false,
            threads_enabled: true,
            effect_history: DEFAULT_EFFECT_HISTORY,
        }
    }
}

/// Out-of-band invite context (e.g. an emailed invite link).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InviteContext {
    /// Name of the inviter, as shown in the invite
    pub inviter_name: Option<String>,
    /// Signing URL to pass along with the join
    pub sign_url: Option<String>,
}

/// What the user asked to view, fixed for the controller's life.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    /// Alias or id of the room
    pub target: RoomTarget,
    /// Local user
    pub me: UserId,
    /// Local user is a guest
    pub is_guest: bool,
    /// Client crypto is available
    pub crypto_enabled: bool,
    /// Client finished its initial sync
    pub client_ready: bool,
    /// Caller explicitly asked to peek
    pub peek_requested: bool,
    /// Room directory reports world-readable history
    pub world_readable_hint: bool,
    /// Out-of-band invite context
    pub invite: Option<InviteContext>,
    /// Event to open the timeline on
    pub initial_event: Option<EventId>,
    /// Highlight the initial event
    pub highlighted: bool,
    /// A call is being viewed
    pub viewing_call: bool,
}

impl ViewRequest {
    /// Request for a joined member with crypto, client ready, no peeking.
    pub fn new(target: RoomTarget, me: UserId) -> Self {
        Self {
            target,
            me,
            is_guest: false,
            crypto_enabled: true,
            client_ready: true,
            peek_requested: false,
            world_readable_hint: false,
            invite: None,
            initial_event: None,
            highlighted: false,
            viewing_call: false,
        }
    }

    /// Whether peeking is wanted for this request.
    pub fn wants_peek(&self) -> bool {
        self.peek_requested || self.world_readable_hint
    }
}
