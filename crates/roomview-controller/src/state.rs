//! Published view state.

use roomview_core::{
    arbiter::PeekJoinState,
    error::{JoinError, LeaveError},
    identity::Identity,
    layout::{MainContent, WidgetLayout},
    room::{Membership, RoomHandle, Tombstone},
    scroll::{InitialEvent, ScrollAnchor},
    search::{RenderingMode, SearchView},
    settings::ViewSettings,
    trust::{Permissions, TrustStatus},
    types::{CallId, RoomTarget, TimelineId},
    view_mode::ViewMode,
};
use serde::Serialize;

/// Membership as the view presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMembership {
    /// No relationship
    #[default]
    None,
    /// Invited
    Invited,
    /// Joined
    Joined,
    /// Left or banned
    Left,
    /// Viewing through a peek session
    Peeking,
}

impl ViewMembership {
    /// Presented membership for a room membership.
    pub fn from_room(membership: Membership) -> Self {
        match membership {
            Membership::None => Self::None,
            Membership::Invited => Self::Invited,
            Membership::Joined => Self::Joined,
            Membership::Left | Membership::Banned => Self::Left,
        }
    }
}

/// Load progress of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    /// Resolving or looking up the room
    #[default]
    Loading,
    /// Peek in flight
    PeekLoading,
    /// Settled
    Ready,
    /// Join in flight
    Joining,
    /// Invite rejection in flight
    Rejecting,
}

/// Immutable snapshot of one room view.
///
/// Built from scratch by the controller after every event; consumers only
/// ever see whole snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomViewState {
    /// What the user asked to view
    pub target: RoomTarget,
    /// Resolution state
    pub identity: Identity,
    /// Adopted room snapshot
    pub room: Option<RoomHandle>,
    /// Presented membership
    pub membership: ViewMembership,
    /// Load progress
    pub load_phase: LoadPhase,
    /// Peek/join arbiter state
    pub peek_join: PeekJoinState,
    /// Kind of view
    pub view_mode: ViewMode,
    /// Tracked live timeline generation
    pub live_timeline: Option<TimelineId>,
    /// Unread events since the live end was last viewed
    pub unread_count: u64,
    /// Viewport shows the live end
    pub at_live_end: bool,
    /// Encryption shield
    pub trust_status: TrustStatus,
    /// Permission triple
    pub permissions: Permissions,
    /// Occupant of the main area
    pub main_content: MainContent,
    /// Rendering mode of the timeline area
    pub rendering: RenderingMode,
    /// Live search session
    pub search: Option<SearchView>,
    /// Viewport anchor
    pub scroll_anchor: Option<ScrollAnchor>,
    /// Event the timeline opens on
    pub initial_event: Option<InitialEvent>,
    /// Current settings
    pub settings: ViewSettings,
    /// URL previews shown
    pub show_url_previews: bool,
    /// Widget layout
    pub widgets: WidgetLayout,
    /// Apps drawer shown
    pub show_apps: bool,
    /// Active call of the room
    pub active_call: Option<CallId>,
    /// Right panel open
    pub right_panel_open: bool,
    /// Member list fully loaded
    pub members_loaded: bool,
    /// Member list failed to load; shown incomplete
    pub members_incomplete: bool,
    /// Room may be peeked (world-readable history)
    pub can_peek: bool,
    /// Successor room
    pub tombstone: Option<Tombstone>,
    /// Last join failure
    pub join_error: Option<JoinError>,
    /// Last invite rejection failure
    pub reject_error: Option<LeaveError>,
    /// Client finished its initial sync
    pub client_ready: bool,
}

impl RoomViewState {
    /// Snapshot before anything is known about `target`.
    pub(crate) fn initial(target: RoomTarget) -> Self {
        Self {
            identity: Identity::Unresolved(target.clone()),
            target,
            room: None,
            membership: ViewMembership::None,
            load_phase: LoadPhase::Loading,
            peek_join: PeekJoinState::NoAction,
            view_mode: ViewMode::Loading { preview_loading: false },
            live_timeline: None,
            unread_count: 0,
            at_live_end: false,
            trust_status: TrustStatus::Unknown,
            permissions: Permissions::none(),
            main_content: MainContent::Timeline,
            rendering: RenderingMode::Room,
            search: None,
            scroll_anchor: None,
            initial_event: None,
            settings: ViewSettings::default(),
            show_url_previews: false,
            widgets: WidgetLayout::default(),
            show_apps: false,
            active_call: None,
            right_panel_open: false,
            members_loaded: false,
            members_incomplete: false,
            can_peek: false,
            tombstone: None,
            join_error: None,
            reject_error: None,
            client_ready: false,
        }
    }
}
