//! Controller events and actions.

use roomview_core::{
    effects::ChatEffect,
    error::{FetchEventError, JoinError, LeaveError, MembersLoadError, PeekError, ResolutionError, SearchError, TrustError},
    event::{EventContext, TimelineDelivery, TimelineEvent},
    layout::{PanelCommand, RightPanelView, WidgetLayout},
    room::RoomHandle,
    scroll::{ScrollAnchor, ScrollState},
    search::{SearchId, SearchRequest, SearchScope},
    settings::{SettingKey, SettingValue},
    trust::TrustStatus,
    types::{CallId, EventId, RoomAlias, RoomId, TimelineId, UserId},
};
use serde::Serialize;

/// Kind of room state event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// `m.room.tombstone`
    Tombstone,
    /// `m.room.power_levels`
    PowerLevels,
    /// `m.room.encryption`
    Encryption,
    /// `m.room.history_visibility`
    HistoryVisibility,
    /// Any other state event
    Other,
}

/// Events the runtime feeds into the controller.
///
/// Sync sources, stores, the settings provider and user intents all arrive
/// here, as do the results of actions the controller asked for. The runtime
/// delivers them one at a time, in upstream order.
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulated clocks.
#[derive(Debug, Clone)]
pub enum ControllerEvent<I = std::time::Instant> {
    /// Directory answered an alias lookup.
    AliasResolved {
        /// Alias that was looked up.
        alias: RoomAlias,
        /// Resolved id or failure.
        result: Result<RoomId, ResolutionError>,
    },

    /// Local room store answered a lookup.
    RoomLookup {
        /// Room that was looked up.
        room_id: RoomId,
        /// Room snapshot, absent if unknown locally.
        room: Option<RoomHandle>,
    },

    /// Scroll-state store answered a lookup.
    ScrollStateLoaded {
        /// Room the state belongs to.
        room_id: RoomId,
        /// Persisted state, if any.
        state: Option<ScrollState>,
    },

    /// Peek attempt finished.
    PeekCompleted {
        /// Room that was peeked.
        room_id: RoomId,
        /// Room snapshot or classified failure.
        result: Result<RoomHandle, PeekError>,
    },

    /// Client finished its initial sync.
    ClientReady,

    /// User asked to join the room.
    JoinRequested,

    /// Join request failed.
    JoinFailed {
        /// Room the join was for.
        room_id: RoomId,
        /// Failure.
        error: JoinError,
    },

    /// User rejected the invite.
    RejectRequested {
        /// Also ignore the inviter.
        ignore_inviter: bool,
    },

    /// Leave issued by an invite rejection finished.
    RejectCompleted {
        /// Room that was left.
        room_id: RoomId,
        /// Outcome.
        result: Result<(), LeaveError>,
    },

    /// Local user's membership changed.
    MembershipChanged {
        /// Room snapshot after the change.
        room: RoomHandle,
    },

    /// Room became known locally (e.g. after a join or remote creation).
    RoomAppeared {
        /// Room snapshot.
        room: RoomHandle,
    },

    /// A state event changed the room.
    RoomStateChanged {
        /// Room snapshot after the change.
        room: RoomHandle,
        /// Kind of state event.
        change: StateChange,
    },

    /// Room member list changed.
    MembersChanged {
        /// Room snapshot after the change.
        room: RoomHandle,
    },

    /// Timeline event delivered.
    Timeline {
        /// The event.
        event: TimelineEvent,
        /// Delivery context.
        delivery: TimelineDelivery,
    },

    /// An event finished decrypting.
    EventDecrypted {
        /// The event after decryption.
        event: TimelineEvent,
    },

    /// Server-forced timeline discontinuity.
    TimelineReset {
        /// Room of the timeline.
        room_id: RoomId,
        /// New live timeline generation.
        timeline: TimelineId,
    },

    /// Room display name changed.
    RoomNameChanged {
        /// Room that was renamed.
        room_id: RoomId,
        /// New name.
        name: Option<String>,
    },

    /// A user's device verification changed.
    DeviceVerificationChanged {
        /// User whose devices changed.
        user_id: UserId,
    },

    /// A user's cross-signing trust changed.
    UserTrustChanged {
        /// User whose trust changed.
        user_id: UserId,
    },

    /// Local cross-signing keys changed.
    CrossSigningKeysChanged,

    /// Key backup status changed.
    KeyBackupStatusChanged,

    /// Shield computation finished.
    ShieldComputed {
        /// Generation the request was tagged with.
        generation: u64,
        /// Shield status or failure.
        result: Result<TrustStatus, TrustError>,
    },

    /// Lazy member loading finished.
    MembersLoaded {
        /// Room the members belong to.
        room_id: RoomId,
        /// Outcome.
        result: Result<(), MembersLoadError>,
    },

    /// Widget store or widget echo update.
    WidgetsChanged {
        /// Room the widgets belong to.
        room_id: RoomId,
        /// Widget layout.
        layout: WidgetLayout,
    },

    /// User rearranged the widget layout.
    WidgetLayoutChanged {
        /// Room the widgets belong to.
        room_id: RoomId,
        /// Widget layout.
        layout: WidgetLayout,
    },

    /// Call store reported the room's active call.
    ActiveCallChanged {
        /// Room of the call.
        room_id: RoomId,
        /// Active call, if any.
        call: Option<CallId>,
    },

    /// User started or stopped viewing the call.
    CallViewChanged {
        /// Whether the call is viewed.
        viewing: bool,
    },

    /// Right panel store update.
    RightPanelChanged {
        /// Right panel state.
        view: RightPanelView,
    },

    /// A watched setting changed.
    SettingChanged {
        /// Setting key.
        key: SettingKey,
        /// New value.
        value: SettingValue,
    },

    /// Room's aggregate notification state changed.
    NotificationStateChanged {
        /// Room of the notification state.
        room_id: RoomId,
        /// Whether the room is unread.
        unread: bool,
    },

    /// Timeline viewport moved.
    Scrolled {
        /// Viewport shows the live end.
        at_live_end: bool,
        /// Anchor of the viewport.
        anchor: Option<ScrollAnchor>,
    },

    /// User asked to jump to the live end.
    JumpToLive,

    /// User asked to show a specific event.
    JumpToEvent {
        /// Event to show.
        event_id: EventId,
        /// Highlight it.
        highlighted: bool,
    },

    /// Missing-event fetch finished.
    EventFetched {
        /// Requested event.
        event_id: EventId,
        /// Event context or failure.
        result: Result<EventContext, FetchEventError>,
    },

    /// User started a search.
    SearchRequested {
        /// Search term.
        term: String,
        /// Scope.
        scope: SearchScope,
    },

    /// Search backend progress or results.
    SearchProgress {
        /// Session the progress belongs to.
        id: SearchId,
        /// Results so far.
        result_count: u64,
        /// Backend still working.
        in_progress: bool,
    },

    /// Search backend failed.
    SearchFailed {
        /// Session that failed.
        id: SearchId,
        /// Failure.
        error: SearchError,
    },

    /// User cancelled the search.
    SearchCancelRequested,

    /// User toggled the search bar.
    SearchToggled,

    /// A search result from another room needs permalinks.
    PermalinksNeeded {
        /// Room of the result.
        room_id: RoomId,
    },

    /// Local user sent a message.
    MessageSent {
        /// Notifier would show the desktop-notification prompt.
        prompt_eligible: bool,
    },

    /// Local user sent the first message in a local draft room.
    LocalRoomMessage,

    /// Time tick for throttle processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// Join request options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinOptions {
    /// Signing URL from an out-of-band invite
    pub sign_url: Option<String>,
    /// Join accepts a pending invite
    pub via_invite: bool,
}

/// Fire-and-forget signals to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Signal {
    /// Play a chat effect
    Effect {
        /// Effect to play
        effect: ChatEffect,
    },
    /// Offer enabling desktop notifications
    PromptDesktopNotifications,
    /// Change the right panel
    RightPanel {
        /// Panel change
        command: PanelCommand,
    },
    /// Stop viewing the room's call
    StopViewingCall {
        /// Room of the call
        room_id: RoomId,
    },
    /// Open a thread instead of the main timeline
    ShowThread {
        /// Room of the thread
        room_id: RoomId,
        /// Thread root
        root: EventId,
        /// Event inside the thread to focus
        event_id: EventId,
    },
    /// Scroll the timeline to the live end
    ScrollToLive,
    /// Guest must register; the join resumes afterwards
    RequireRegistration {
        /// Room to join once registered
        room_id: RoomId,
    },
    /// Leave the room view for the home page
    ViewHome,
}

/// Actions the controller asks the runtime to perform.
///
/// Asynchronous operations report back as [`ControllerEvent`]s.
#[derive(Debug, Clone)]
pub enum ControllerAction {
    /// Snapshot changed; publish it.
    Publish,

    /// Resolve an alias through the directory.
    ResolveAlias {
        /// Alias to resolve.
        alias: RoomAlias,
    },

    /// Look the room up in the local store.
    LookupRoom {
        /// Room to look up.
        room_id: RoomId,
    },

    /// Load the persisted scroll state.
    LoadScrollState {
        /// Room to load for.
        room_id: RoomId,
    },

    /// Subscribe to the room's sync events.
    Subscribe {
        /// Room to subscribe to.
        room_id: RoomId,
    },

    /// Release the room subscription. Idempotent.
    Unsubscribe {
        /// Room to unsubscribe from.
        room_id: RoomId,
    },

    /// Watch setting keys.
    WatchSettings {
        /// Room scope, `None` for global keys.
        room_id: Option<RoomId>,
        /// Keys to watch.
        keys: Vec<SettingKey>,
    },

    /// Release every setting watch.
    UnwatchSettings,

    /// Attempt a peek.
    Peek {
        /// Room to peek into.
        room_id: RoomId,
    },

    /// Tear down the peek session.
    StopPeek,

    /// Join the room (fire-and-forget; success arrives as a membership change).
    Join {
        /// Room to join.
        room_id: RoomId,
        /// Join options.
        options: JoinOptions,
    },

    /// Leave the room.
    Leave {
        /// Room to leave.
        room_id: RoomId,
        /// User to ignore along with leaving.
        ignore: Option<UserId>,
    },

    /// Compute the trust shield.
    ComputeShield {
        /// Generation to echo back.
        generation: u64,
        /// Room snapshot to evaluate.
        room: RoomHandle,
    },

    /// Lazily load the member list.
    LoadMembers {
        /// Room to load.
        room_id: RoomId,
    },

    /// Fetch an event not available locally.
    FetchEvent {
        /// Room of the event.
        room_id: RoomId,
        /// Event to fetch.
        event_id: EventId,
    },

    /// Run a search.
    Search(SearchRequest),

    /// Persist the scroll state.
    PersistScroll {
        /// Room to persist for.
        room_id: RoomId,
        /// State, `None` to resume from the read marker.
        state: Option<ScrollState>,
    },

    /// Start a tracking permalink creator.
    StartPermalinks {
        /// Room of the creator.
        room_id: RoomId,
    },

    /// Load a one-shot permalink creator.
    LoadPermalinks {
        /// Room of the creator.
        room_id: RoomId,
    },

    /// Stop a permalink creator.
    StopPermalinks {
        /// Room of the creator.
        room_id: RoomId,
    },

    /// Create the real room from a local draft room.
    CreateFromLocalRoom {
        /// Local room id.
        room_id: RoomId,
    },

    /// Remove a local draft room from the store.
    RemoveLocalRoom {
        /// Local room id.
        room_id: RoomId,
    },

    /// Forward a signal to consumers.
    Signal(Signal),
}
