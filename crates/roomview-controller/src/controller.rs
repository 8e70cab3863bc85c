//! Room session controller.
//!
//! The `RoomController` is the single writer over every component of one room
//! view. Events are applied one at a time; each call to [`RoomController::handle`]
//! returns the actions the runtime must perform, followed by
//! [`ControllerAction::Publish`] if the snapshot changed.
//!
//! The controller is bound to one room target for its whole life. Events
//! addressed to any other room are ignored, and once [`RoomController::teardown`]
//! has run no event mutates anything again.

use roomview_core::{
    arbiter::{JoinStep, PeekJoinArbiter, PeekOutcome, PeekStep},
    env::Environment,
    error::{FetchEventError, JoinError, LeaveError, MembersLoadError, PeekError, ResolutionError, SearchError, TrustError},
    event::{EventContext, TimelineDelivery, TimelineEvent},
    identity::{Identity, IdentityResolver, ResolveStep},
    layout::{LayoutArbiter, MainContent, PanelCommand, RightPanelPhase, RightPanelView, WidgetLayout},
    permalinks::{PermalinkMode, PermalinkRegistry},
    reconciler::{ReconcileContext, TimelineReconciler},
    room::{Membership, RoomHandle, RoomKind},
    scroll::{ScrollAnchor, ScrollState, ScrollTracker},
    search::{SearchId, SearchManager, SearchScope},
    settings::{SettingKey, SettingValue, ViewSettings},
    throttle::Throttle,
    trust::{Permissions, ShieldStep, TrustEvaluator, TrustStatus, TrustTrigger},
    types::{CallId, EventId, RoomAlias, RoomId, TimelineId},
    view_mode::{ViewMode, ViewModeInputs},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::{ControllerConfig, ViewRequest},
    error::ControllerError,
    event::{ControllerAction, ControllerEvent, JoinOptions, Signal, StateChange},
    state::{LoadPhase, RoomViewState, ViewMembership},
};

type Actions = Vec<ControllerAction>;

/// Room session controller.
///
/// Owns the identity resolver, peek/join arbiter, timeline reconciler, trust
/// evaluator, layout arbiter, search manager and scroll tracker of one room
/// view, and the published [`RoomViewState`].
pub struct RoomController<E: Environment> {
    env: E,
    config: ControllerConfig,
    request: ViewRequest,

    resolver: IdentityResolver,
    arbiter: PeekJoinArbiter,
    reconciler: TimelineReconciler,
    trust: TrustEvaluator,
    layout: LayoutArbiter,
    search: SearchManager,
    scroll: ScrollTracker,
    permalinks: PermalinkRegistry,
    member_updates: Throttle<E::Instant>,
    settings: ViewSettings,

    room: Option<RoomHandle>,
    permissions: Permissions,
    can_peek: bool,
    show_url_previews: bool,
    right_panel: RightPanelView,
    notification_unread: bool,
    client_ready: bool,

    started: bool,
    subscribed: Option<RoomId>,
    lookup_pending: bool,
    peek_refused: bool,
    rejecting: bool,
    join_error: Option<JoinError>,
    reject_error: Option<LeaveError>,
    members_requested: bool,
    members_loaded: bool,
    members_incomplete: bool,
    pending_jump: Option<(EventId, bool)>,

    torn_down: bool,
    snapshot: RoomViewState,
}

impl<E: Environment> RoomController<E> {
    /// Controller for one view request. Nothing happens until
    /// [`start`](Self::start).
    pub fn new(env: E, config: ControllerConfig, request: ViewRequest) -> Self {
        let member_updates = Throttle::new(config.member_update_throttle);
        let reconciler = TimelineReconciler::new(config.effect_history);
        let members_loaded = !config.lazy_load_members;

        Self {
            resolver: IdentityResolver::new(request.target.clone()),
            arbiter: PeekJoinArbiter::new(),
            reconciler,
            trust: TrustEvaluator::new(),
            layout: LayoutArbiter::new(request.viewing_call),
            search: SearchManager::new(),
            scroll: ScrollTracker::new(),
            permalinks: PermalinkRegistry::new(),
            member_updates,
            settings: ViewSettings::default(),
            room: None,
            permissions: Permissions::none(),
            can_peek: request.world_readable_hint,
            show_url_previews: false,
            right_panel: RightPanelView::default(),
            notification_unread: false,
            client_ready: request.client_ready,
            started: false,
            subscribed: None,
            lookup_pending: false,
            peek_refused: false,
            rejecting: false,
            join_error: None,
            reject_error: None,
            members_requested: false,
            members_loaded,
            members_incomplete: false,
            pending_jump: None,
            torn_down: false,
            snapshot: RoomViewState::initial(request.target.clone()),
            env,
            config,
            request,
        }
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> &RoomViewState {
        &self.snapshot
    }

    /// Whether teardown has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Resolved room id, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        self.resolver.room_id()
    }

    /// The view request this controller serves.
    pub fn request(&self) -> &ViewRequest {
        &self.request
    }

    /// Starts resolution and the global settings watch. Runs at most once.
    pub fn start(&mut self) -> Actions {
        if self.torn_down || self.started {
            return Vec::new();
        }
        self.started = true;

        let mut actions =
            vec![ControllerAction::WatchSettings { room_id: None, keys: SettingKey::GLOBAL.to_vec() }];

        match self.resolver.begin() {
            ResolveStep::Resolved(room_id) => self.on_resolved(room_id, &mut actions),
            ResolveStep::ResolveAlias(alias) => {
                info!(%alias, "resolving room alias");
                actions.push(ControllerAction::ResolveAlias { alias });
            },
            ResolveStep::AlreadyStarted => {},
        }

        self.publish(&mut actions);
        actions
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// - `ControllerError` if a user intent is not possible in the current
    ///   state; nothing was changed in that case
    pub fn handle(&mut self, event: ControllerEvent<E::Instant>) -> Result<Actions, ControllerError> {
        if self.torn_down {
            debug!("event after teardown ignored");
            return Ok(Vec::new());
        }

        let mut actions = self.dispatch(event)?;
        self.publish(&mut actions);
        Ok(actions)
    }

    /// Tears the view down.
    ///
    /// The gate closes before any cleanup is emitted; the last published
    /// snapshot stays final. Idempotent.
    pub fn teardown(&mut self) -> Actions {
        if std::mem::replace(&mut self.torn_down, true) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        let room_id = self.resolver.room_id().cloned();

        if let (Some(room_id), Some(_)) = (&room_id, &self.room) {
            actions.push(ControllerAction::PersistScroll {
                room_id: room_id.clone(),
                state: self.scroll.persisted(),
            });
        }
        if self.arbiter.close() {
            actions.push(ControllerAction::StopPeek);
        }
        for room_id in self.permalinks.stop_all() {
            actions.push(ControllerAction::StopPermalinks { room_id });
        }
        if self.search.cancel() {
            debug!("search cancelled at teardown");
        }
        self.member_updates.cancel();

        // Identity may have failed since subscribing
        if let Some(room_id) = self.subscribed.take() {
            actions.push(ControllerAction::Unsubscribe { room_id });
        }
        if self.started {
            actions.push(ControllerAction::UnwatchSettings);
        }
        if let Some(room) = self.room.as_ref().filter(|room| room.is_local()) {
            actions.push(ControllerAction::RemoveLocalRoom { room_id: room.room_id.clone() });
        }

        info!(room = %self.request.target, "room view torn down");
        actions
    }

    fn dispatch(&mut self, event: ControllerEvent<E::Instant>) -> Result<Actions, ControllerError> {
        match event {
            ControllerEvent::AliasResolved { alias, result } => Ok(self.handle_alias_resolved(&alias, result)),
            ControllerEvent::RoomLookup { room_id, room } => Ok(self.handle_room_lookup(&room_id, room)),
            ControllerEvent::ScrollStateLoaded { room_id, state } => {
                Ok(self.handle_scroll_state_loaded(&room_id, state))
            },
            ControllerEvent::PeekCompleted { room_id, result } => Ok(self.handle_peek_completed(&room_id, result)),
            ControllerEvent::ClientReady => Ok(self.handle_client_ready()),
            ControllerEvent::JoinRequested => self.handle_join_requested(),
            ControllerEvent::JoinFailed { room_id, error } => Ok(self.handle_join_failed(&room_id, error)),
            ControllerEvent::RejectRequested { ignore_inviter } => self.handle_reject_requested(ignore_inviter),
            ControllerEvent::RejectCompleted { room_id, result } => Ok(self.handle_reject_completed(&room_id, result)),
            ControllerEvent::MembershipChanged { room } => Ok(self.handle_membership_changed(room)),
            ControllerEvent::RoomAppeared { room } => Ok(self.handle_room_appeared(room)),
            ControllerEvent::RoomStateChanged { room, change } => Ok(self.handle_state_changed(room, change)),
            ControllerEvent::MembersChanged { room } => Ok(self.handle_members_changed(room)),
            ControllerEvent::Timeline { event, delivery } => Ok(self.handle_timeline(&event, delivery)),
            ControllerEvent::EventDecrypted { event } => Ok(self.handle_event_decrypted(&event)),
            ControllerEvent::TimelineReset { room_id, timeline } => Ok(self.handle_timeline_reset(&room_id, timeline)),
            ControllerEvent::RoomNameChanged { room_id, name } => Ok(self.handle_room_name_changed(&room_id, name)),
            ControllerEvent::DeviceVerificationChanged { user_id } => {
                Ok(self.recompute_trust_now(TrustTrigger::DeviceVerification(user_id)))
            },
            ControllerEvent::UserTrustChanged { user_id } => {
                Ok(self.recompute_trust_now(TrustTrigger::UserTrust(user_id)))
            },
            ControllerEvent::CrossSigningKeysChanged => Ok(self.recompute_trust_now(TrustTrigger::CrossSigningKeys)),
            ControllerEvent::KeyBackupStatusChanged => Ok(self.recompute_trust_now(TrustTrigger::KeyBackup)),
            ControllerEvent::ShieldComputed { generation, result } => {
                Ok(self.handle_shield_computed(generation, result))
            },
            ControllerEvent::MembersLoaded { room_id, result } => Ok(self.handle_members_loaded(&room_id, result)),
            ControllerEvent::WidgetsChanged { room_id, layout } => Ok(self.handle_widgets(&room_id, layout, false)),
            ControllerEvent::WidgetLayoutChanged { room_id, layout } => {
                Ok(self.handle_widgets(&room_id, layout, true))
            },
            ControllerEvent::ActiveCallChanged { room_id, call } => Ok(self.handle_active_call(&room_id, call)),
            ControllerEvent::CallViewChanged { viewing } => Ok(self.handle_call_view(viewing)),
            ControllerEvent::RightPanelChanged { view } => {
                self.right_panel = view;
                Ok(Vec::new())
            },
            ControllerEvent::SettingChanged { key, value } => Ok(self.handle_setting(key, value)),
            ControllerEvent::NotificationStateChanged { room_id, unread } => {
                if self.resolver.accepts(&room_id) {
                    self.notification_unread = unread;
                }
                Ok(Vec::new())
            },
            ControllerEvent::Scrolled { at_live_end, anchor } => Ok(self.handle_scrolled(at_live_end, anchor)),
            ControllerEvent::JumpToLive => Ok(self.handle_jump_to_live()),
            ControllerEvent::JumpToEvent { event_id, highlighted } => self.handle_jump_to_event(event_id, highlighted),
            ControllerEvent::EventFetched { event_id, result } => Ok(self.handle_event_fetched(&event_id, result)),
            ControllerEvent::SearchRequested { term, scope } => self.handle_search_requested(term, scope),
            ControllerEvent::SearchProgress { id, result_count, in_progress } => {
                Ok(self.handle_search_progress(id, result_count, in_progress))
            },
            ControllerEvent::SearchFailed { id, error } => Ok(self.handle_search_failed(id, error)),
            ControllerEvent::SearchCancelRequested => {
                self.search.cancel();
                Ok(Vec::new())
            },
            ControllerEvent::SearchToggled => self.handle_search_toggled(),
            ControllerEvent::PermalinksNeeded { room_id } => Ok(self.handle_permalinks_needed(room_id)),
            ControllerEvent::MessageSent { prompt_eligible } => Ok(self.handle_message_sent(prompt_eligible)),
            ControllerEvent::LocalRoomMessage => self.handle_local_room_message(),
            ControllerEvent::Tick { now } => Ok(self.handle_tick(now)),
        }
    }

    fn on_resolved(&mut self, room_id: RoomId, actions: &mut Actions) {
        self.subscribed = Some(room_id.clone());
        actions.push(ControllerAction::Subscribe { room_id: room_id.clone() });
        actions.push(ControllerAction::WatchSettings {
            room_id: Some(room_id.clone()),
            keys: SettingKey::ROOM.to_vec(),
        });

        match self.request.initial_event.clone() {
            Some(event_id) => {
                self.pending_jump = Some((event_id.clone(), self.request.highlighted));
                actions.push(ControllerAction::FetchEvent { room_id: room_id.clone(), event_id });
            },
            None => actions.push(ControllerAction::LoadScrollState { room_id: room_id.clone() }),
        }

        self.lookup_pending = true;
        actions.push(ControllerAction::LookupRoom { room_id });
    }

    fn handle_alias_resolved(&mut self, alias: &RoomAlias, result: Result<RoomId, ResolutionError>) -> Actions {
        let mut actions = Vec::new();
        match self.resolver.on_alias_resolved(alias, result) {
            Some(room_id) => {
                info!(%alias, %room_id, "alias resolved");
                self.on_resolved(room_id, &mut actions);
            },
            None if self.resolver.is_failed() => {
                error!(%alias, identity = ?self.resolver.identity(), "alias resolution failed");
            },
            None => debug!(%alias, "unexpected alias answer ignored"),
        }
        actions
    }

    fn handle_room_lookup(&mut self, room_id: &RoomId, room: Option<RoomHandle>) -> Actions {
        if !self.resolver.accepts(room_id) || !self.lookup_pending {
            debug!(%room_id, "room lookup ignored");
            return Vec::new();
        }
        self.lookup_pending = false;

        let mut actions = Vec::new();
        match room {
            Some(room) => self.attach_room(room, &mut actions),
            None => self.setup_room(&mut actions),
        }
        actions
    }

    fn handle_scroll_state_loaded(&mut self, room_id: &RoomId, state: Option<ScrollState>) -> Actions {
        if self.resolver.accepts(room_id) && self.scroll.restore(state) {
            debug!(%room_id, "scroll state restored");
        }
        Vec::new()
    }

    fn handle_peek_completed(&mut self, room_id: &RoomId, result: Result<RoomHandle, PeekError>) -> Actions {
        if !self.resolver.accepts(room_id) {
            debug!(%room_id, "peek result for another room ignored");
            return Vec::new();
        }

        let (result, room) = match result {
            Ok(room) => (Ok(()), Some(room)),
            Err(err) => (Err(err), None),
        };

        let mut actions = Vec::new();
        match self.arbiter.on_peek_result(result) {
            PeekOutcome::Peeking => {
                info!(%room_id, "peeking");
                if let Some(room) = room.filter(|_| self.room.is_none()) {
                    self.load_room(room, &mut actions);
                }
            },
            PeekOutcome::Refused => {
                info!(%room_id, "peek refused; showing join prompt");
                self.peek_refused = true;
            },
            PeekOutcome::Fatal(err) => {
                error!(%room_id, %err, "peek failed");
                self.resolver.fail(err.into());
            },
            PeekOutcome::Ignored => debug!(%room_id, "late peek result ignored"),
        }
        actions
    }

    fn handle_client_ready(&mut self) -> Actions {
        if std::mem::replace(&mut self.client_ready, true) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.resolver.room_id().is_some() && !self.lookup_pending && self.room.is_none() {
            self.setup_room(&mut actions);
        }
        actions
    }

    fn handle_join_requested(&mut self) -> Result<Actions, ControllerError> {
        let room_id = self.resolver.room_id().cloned().ok_or(ControllerError::Unresolved { operation: "join" })?;

        let action = match self.arbiter.request_join(self.request.is_guest) {
            JoinStep::Join => {
                info!(%room_id, "joining");
                self.join_error = None;
                let via_invite = self.room.as_ref().is_some_and(|room| room.my_membership == Membership::Invited);
                let sign_url = self.request.invite.as_ref().and_then(|invite| invite.sign_url.clone());
                ControllerAction::Join { room_id, options: JoinOptions { sign_url, via_invite } }
            },
            JoinStep::DeferUntilRegistered => {
                info!(%room_id, "guest join deferred until registration");
                ControllerAction::Signal(Signal::RequireRegistration { room_id })
            },
            JoinStep::AlreadyJoining => {
                debug!(%room_id, "join already in flight");
                return Ok(Vec::new());
            },
        };
        Ok(vec![action])
    }

    fn handle_join_failed(&mut self, room_id: &RoomId, error: JoinError) -> Actions {
        if self.resolver.accepts(room_id) && self.arbiter.is_joining() {
            warn!(%room_id, %error, "join failed");
            self.arbiter.on_join_failed();
            self.join_error = Some(error);
        }
        Vec::new()
    }

    fn handle_reject_requested(&mut self, ignore_inviter: bool) -> Result<Actions, ControllerError> {
        let room = self.room.as_ref().ok_or(ControllerError::NoRoom { operation: "reject invite" })?;
        if room.my_membership != Membership::Invited {
            return Err(ControllerError::NoInvite);
        }

        let ignore = if ignore_inviter { room.inviter.clone() } else { None };
        let room_id = room.room_id.clone();
        info!(%room_id, ignore_inviter, "rejecting invite");

        self.rejecting = true;
        self.reject_error = None;
        Ok(vec![ControllerAction::Leave { room_id, ignore }])
    }

    fn handle_reject_completed(&mut self, room_id: &RoomId, result: Result<(), LeaveError>) -> Actions {
        if !self.resolver.accepts(room_id) || !self.rejecting {
            return Vec::new();
        }
        self.rejecting = false;

        match result {
            Ok(()) => vec![ControllerAction::Signal(Signal::ViewHome)],
            Err(err) => {
                warn!(%room_id, %err, "failed to reject invite");
                self.reject_error = Some(err);
                Vec::new()
            },
        }
    }

    fn handle_membership_changed(&mut self, room: RoomHandle) -> Actions {
        if !self.resolver.accepts(&room.room_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.room.is_none() {
            self.attach_room(room, &mut actions);
        } else {
            debug!(membership = ?room.my_membership, "membership changed");
            self.adopt(room, &mut actions);
            self.load_members_if_joined(&mut actions);
            self.recompute_trust(TrustTrigger::Membership, &mut actions);
        }
        actions
    }

    fn handle_room_appeared(&mut self, room: RoomHandle) -> Actions {
        if !self.resolver.accepts(&room.room_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.room.is_none() {
            self.attach_room(room, &mut actions);
        } else {
            self.adopt(room, &mut actions);
            self.recompute_layout(&mut actions);
        }
        actions
    }

    fn handle_state_changed(&mut self, room: RoomHandle, change: StateChange) -> Actions {
        if !self.resolver.accepts(&room.room_id) || self.room.is_none() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if change == StateChange::Tombstone
            && let Some(tombstone) = &room.tombstone
        {
            info!(replacement = %tombstone.replacement_room, "room was upgraded");
        }
        self.adopt(room, &mut actions);
        if change == StateChange::Encryption {
            self.recompute_trust(TrustTrigger::EncryptionEnabled, &mut actions);
        }
        actions
    }

    fn handle_members_changed(&mut self, room: RoomHandle) -> Actions {
        if !self.resolver.accepts(&room.room_id) || self.room.is_none() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.adopt(room, &mut actions);
        if self.member_updates.request(self.env.now()) {
            self.recompute_trust(TrustTrigger::Members, &mut actions);
        }
        actions
    }

    fn handle_timeline(&mut self, event: &TimelineEvent, delivery: TimelineDelivery) -> Actions {
        let Some(room_id) = self.resolver.room_id() else {
            return Vec::new();
        };
        if self.room.is_none() {
            debug!(event_id = %event.event_id, "timeline event before room load ignored");
            return Vec::new();
        }

        let ctx = ReconcileContext {
            room_id,
            me: &self.request.me,
            joining: self.arbiter.is_joining(),
            search_shown: self.search.is_shown(),
            at_live_end: self.scroll.at_live_end(),
            notification_unread: self.notification_unread,
            threads_enabled: self.config.threads_enabled,
            policy: &self.settings.visibility,
        };
        let outcome = match self.reconciler.on_timeline_event(event, delivery, &ctx) {
            Ok(outcome) => outcome,
            Err(reason) => {
                debug!(event_id = %event.event_id, ?reason, "timeline event discarded");
                return Vec::new();
            },
        };

        let mut actions = Vec::new();
        if outcome.encryption_enabled {
            if let Some(room) = self.room.as_mut() {
                room.encrypted = true;
            }
            self.recompute_trust(TrustTrigger::EncryptionEnabled, &mut actions);
        }
        if outcome.url_previews_changed {
            self.refresh_url_previews();
        }
        actions.extend(outcome.effects.into_iter().map(|effect| ControllerAction::Signal(Signal::Effect { effect })));
        actions
    }

    fn handle_event_decrypted(&mut self, event: &TimelineEvent) -> Actions {
        let Some(room_id) = self.resolver.room_id() else {
            return Vec::new();
        };
        if self.room.is_none() || !self.client_ready {
            return Vec::new();
        }

        let ctx = ReconcileContext {
            room_id,
            me: &self.request.me,
            joining: self.arbiter.is_joining(),
            search_shown: self.search.is_shown(),
            at_live_end: self.scroll.at_live_end(),
            notification_unread: self.notification_unread,
            threads_enabled: self.config.threads_enabled,
            policy: &self.settings.visibility,
        };
        self.reconciler
            .on_decrypted(event, &ctx)
            .into_iter()
            .map(|effect| ControllerAction::Signal(Signal::Effect { effect }))
            .collect()
    }

    fn handle_timeline_reset(&mut self, room_id: &RoomId, timeline: TimelineId) -> Actions {
        if !self.resolver.accepts(room_id) {
            return Vec::new();
        }

        if self.reconciler.on_timeline_reset(timeline) {
            info!(%room_id, timeline = timeline.0, "live timeline reset");
            self.scroll.invalidate();
            if let Some(room) = self.room.as_mut() {
                room.live_timeline = timeline;
            }
        } else {
            debug!(%room_id, timeline = timeline.0, "timeline reset to the current generation ignored");
        }
        Vec::new()
    }

    fn handle_room_name_changed(&mut self, room_id: &RoomId, name: Option<String>) -> Actions {
        if self.resolver.accepts(room_id)
            && let Some(room) = self.room.as_mut()
        {
            room.name = name;
        }
        Vec::new()
    }

    fn recompute_trust_now(&mut self, trigger: TrustTrigger) -> Actions {
        let mut actions = Vec::new();
        self.recompute_trust(trigger, &mut actions);
        actions
    }

    fn handle_shield_computed(&mut self, generation: u64, result: Result<TrustStatus, TrustError>) -> Actions {
        if let Err(err) = &result {
            warn!(generation, %err, "shield computation failed; showing warning");
        }
        if !self.trust.on_computed(generation, result) {
            debug!(generation, latest = self.trust.generation(), "stale shield result dropped");
        }
        Vec::new()
    }

    fn handle_members_loaded(&mut self, room_id: &RoomId, result: Result<(), MembersLoadError>) -> Actions {
        if !self.resolver.accepts(room_id) {
            return Vec::new();
        }

        match result {
            Ok(()) => {
                self.members_loaded = true;
                self.members_incomplete = false;
            },
            Err(err) => {
                warn!(%room_id, %err, "failed to load members; member list will appear incomplete");
                self.members_incomplete = true;
            },
        }
        Vec::new()
    }

    fn handle_widgets(&mut self, room_id: &RoomId, widgets: WidgetLayout, user_change: bool) -> Actions {
        if !self.resolver.accepts(room_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        self.layout.set_widgets(widgets);
        self.recompute_layout(&mut actions);

        if user_change && widgets.has_maximised_widget {
            self.right_panel = RightPanelView { open: true, phase: RightPanelPhase::Timeline };
            actions.push(ControllerAction::Signal(Signal::RightPanel { command: PanelCommand::ShowTimeline }));
        }
        actions
    }

    fn handle_active_call(&mut self, room_id: &RoomId, call: Option<CallId>) -> Actions {
        if !self.resolver.accepts(room_id) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.layout.set_active_call(call) {
            info!(%room_id, "viewed call ended");
            actions.push(ControllerAction::Signal(Signal::StopViewingCall { room_id: room_id.clone() }));
        }
        self.recompute_layout(&mut actions);
        actions
    }

    fn handle_call_view(&mut self, viewing: bool) -> Actions {
        let mut actions = Vec::new();
        self.layout.set_viewing_call(viewing);
        self.recompute_layout(&mut actions);
        actions
    }

    fn handle_setting(&mut self, key: SettingKey, value: SettingValue) -> Actions {
        match self.settings.apply(key, value) {
            Ok(true) if key.affects_url_previews() => self.refresh_url_previews(),
            Ok(_) => {},
            Err(err) => warn!(%err, "setting update ignored"),
        }
        Vec::new()
    }

    fn handle_scrolled(&mut self, at_live_end: bool, anchor: Option<ScrollAnchor>) -> Actions {
        self.scroll.on_scroll(at_live_end, anchor);
        if at_live_end && !self.search.is_shown() && self.reconciler.mark_read() {
            debug!("live end viewed; unread count reset");
        }
        Vec::new()
    }

    fn handle_jump_to_live(&mut self) -> Actions {
        self.scroll.clear_highlight();
        self.pending_jump = None;
        vec![ControllerAction::Signal(Signal::ScrollToLive)]
    }

    fn handle_jump_to_event(&mut self, event_id: EventId, highlighted: bool) -> Result<Actions, ControllerError> {
        let room_id =
            self.resolver.room_id().cloned().ok_or(ControllerError::Unresolved { operation: "jump to event" })?;

        self.pending_jump = Some((event_id.clone(), highlighted));
        Ok(vec![ControllerAction::FetchEvent { room_id, event_id }])
    }

    fn handle_event_fetched(&mut self, event_id: &EventId, result: Result<EventContext, FetchEventError>) -> Actions {
        let Some((pending, highlighted)) = self.pending_jump.take_if(|(pending, _)| *pending == *event_id) else {
            debug!(%event_id, "unexpected event fetch ignored");
            return Vec::new();
        };
        let Some(room_id) = self.resolver.room_id().cloned() else {
            return Vec::new();
        };

        match result {
            Ok(context) => {
                let thread_reply = self.config.threads_enabled && context.is_thread_reply();
                match context.thread_root {
                    Some(root) if thread_reply => {
                        vec![ControllerAction::Signal(Signal::ShowThread { room_id, root, event_id: pending })]
                    },
                    _ => {
                        if self.search.cancel() {
                            debug!("search cancelled by event focus");
                        }
                        self.scroll.focus(pending, highlighted, true);
                        Vec::new()
                    },
                }
            },
            Err(err) => {
                warn!(%room_id, %event_id, %err, "cannot show event");
                Vec::new()
            },
        }
    }

    fn handle_search_requested(&mut self, term: String, scope: SearchScope) -> Result<Actions, ControllerError> {
        let room_id = self.resolver.room_id().ok_or(ControllerError::Unresolved { operation: "search" })?;
        let content = self.layout.content();
        if content != MainContent::Timeline {
            return Err(ControllerError::SearchUnavailable { content });
        }

        let nonce = self.env.random_u64() as u32;
        let request = self.search.start(term, scope, room_id, self.env.unix_millis(), nonce);
        info!(id = %request.id, ?scope, "search started");
        Ok(vec![ControllerAction::Search(request)])
    }

    fn handle_search_progress(&mut self, id: SearchId, result_count: u64, in_progress: bool) -> Actions {
        if !self.search.on_progress(id, result_count, in_progress) {
            debug!(%id, "stale search progress dropped");
        }
        Vec::new()
    }

    fn handle_search_failed(&mut self, id: SearchId, error: SearchError) -> Actions {
        if self.search.on_failed(id, error.clone()) {
            warn!(%id, %error, "search failed");
        }
        Vec::new()
    }

    fn handle_search_toggled(&mut self) -> Result<Actions, ControllerError> {
        let content = self.layout.content();
        if !self.search.is_shown() && content != MainContent::Timeline {
            return Err(ControllerError::SearchUnavailable { content });
        }
        self.search.toggle();
        Ok(Vec::new())
    }

    fn handle_permalinks_needed(&mut self, room_id: RoomId) -> Actions {
        let primary = self.resolver.accepts(&room_id);
        match self.permalinks.ensure(&room_id, primary) {
            Some(PermalinkMode::Tracking) => vec![ControllerAction::StartPermalinks { room_id }],
            Some(PermalinkMode::Snapshot) => vec![ControllerAction::LoadPermalinks { room_id }],
            None => Vec::new(),
        }
    }

    fn handle_message_sent(&mut self, prompt_eligible: bool) -> Actions {
        let shared = self.room.as_ref().is_some_and(|room| room.joined_or_invited_count() > 1);
        if shared && prompt_eligible {
            vec![ControllerAction::Signal(Signal::PromptDesktopNotifications)]
        } else {
            Vec::new()
        }
    }

    fn handle_local_room_message(&mut self) -> Result<Actions, ControllerError> {
        let room = self.room.as_ref().ok_or(ControllerError::NoRoom { operation: "create local room" })?;
        if !room.is_local() {
            debug!(room_id = %room.room_id, "message in a regular room");
            return Ok(Vec::new());
        }
        Ok(vec![ControllerAction::CreateFromLocalRoom { room_id: room.room_id.clone() }])
    }

    fn handle_tick(&mut self, now: E::Instant) -> Actions {
        let mut actions = Vec::new();
        if self.member_updates.poll(now) {
            self.recompute_trust(TrustTrigger::Members, &mut actions);
        }
        actions
    }

    /// Loads a room object first seen through the store and settles the peek
    /// session against it.
    fn attach_room(&mut self, room: RoomHandle, actions: &mut Actions) {
        self.load_room(room, actions);
        self.setup_room(actions);
    }

    fn load_room(&mut self, room: RoomHandle, actions: &mut Actions) {
        info!(room_id = %room.room_id, membership = ?room.my_membership, "room loaded");

        if self.permalinks.ensure(&room.room_id, true).is_some() {
            actions.push(ControllerAction::StartPermalinks { room_id: room.room_id.clone() });
        }
        if self.reconciler.live_timeline().is_some_and(|tracked| tracked != room.live_timeline) {
            self.scroll.invalidate();
        }
        self.reconciler.track(room.live_timeline);
        self.adopt(room, actions);
        self.load_members_if_joined(actions);
        self.recompute_trust(TrustTrigger::RoomLoaded, actions);
        self.recompute_layout(actions);

        if self.layout.content() != MainContent::Timeline && self.notification_unread {
            self.right_panel = RightPanelView { open: true, phase: RightPanelPhase::Timeline };
            actions.push(ControllerAction::Signal(Signal::RightPanel { command: PanelCommand::ShowTimeline }));
        }
    }

    fn setup_room(&mut self, actions: &mut Actions) {
        let Some(room_id) = self.resolver.room_id().cloned() else {
            return;
        };

        let had_session = self.arbiter.has_open_session();
        let should_peek = self.client_ready && self.request.wants_peek();
        match self.arbiter.setup(self.room.as_ref(), should_peek) {
            PeekStep::Attempt => {
                info!(%room_id, "attempting peek");
                actions.push(ControllerAction::Peek { room_id });
            },
            PeekStep::Stop if had_session => {
                info!(%room_id, "room known locally; stopping peek");
                actions.push(ControllerAction::StopPeek);
            },
            PeekStep::Stop | PeekStep::Idle => {},
        }
    }

    /// Replaces the room snapshot and everything derived from it.
    fn adopt(&mut self, room: RoomHandle, actions: &mut Actions) {
        self.can_peek = room.is_world_readable();
        self.permissions = Permissions::compute(&room, &self.request.me);
        self.show_url_previews = self.settings.url_previews_for(room.encrypted);

        let membership = room.my_membership;
        self.room = Some(room);

        if self.arbiter.on_membership(membership) == PeekStep::Stop {
            info!("joined; stopping peek");
            actions.push(ControllerAction::StopPeek);
        }
        if membership == Membership::Joined {
            self.join_error = None;
        }
    }

    fn load_members_if_joined(&mut self, actions: &mut Actions) {
        if self.members_requested || !self.config.lazy_load_members {
            return;
        }
        if let Some(room) = self.room.as_ref().filter(|room| room.is_joined()) {
            self.members_requested = true;
            actions.push(ControllerAction::LoadMembers { room_id: room.room_id.clone() });
        }
    }

    /// Recomputes the permission triple and the shield together.
    fn recompute_trust(&mut self, trigger: TrustTrigger, actions: &mut Actions) {
        let Some(room) = &self.room else {
            return;
        };
        if !trigger.concerns(room) {
            debug!(?trigger, "trust trigger for a non-member ignored");
            return;
        }

        self.permissions = Permissions::compute(room, &self.request.me);
        match self.trust.evaluate(room, self.request.crypto_enabled) {
            ShieldStep::Settled(status) => debug!(?trigger, ?status, "shield settled"),
            ShieldStep::Compute { generation } => {
                actions.push(ControllerAction::ComputeShield { generation, room: room.clone() });
            },
        }
    }

    fn recompute_layout(&mut self, actions: &mut Actions) {
        let is_video_room = self.config.video_rooms_enabled
            && self.room.as_ref().is_some_and(|room| room.kind == RoomKind::VideoRoom);
        let change = self.layout.recompute(is_video_room, self.config.group_calls_enabled, self.right_panel);

        if let Some(command) = change.panel {
            if command == PanelCommand::DemoteToSummary {
                self.right_panel = RightPanelView { open: false, phase: RightPanelPhase::RoomSummary };
            }
            actions.push(ControllerAction::Signal(Signal::RightPanel { command }));
        }

        if change.content_changed {
            let content = self.layout.content();
            info!(?content, "main content changed");
            if content != MainContent::Timeline && self.search.cancel() {
                debug!("search cancelled by layout change");
            }
        }
    }

    fn refresh_url_previews(&mut self) {
        self.show_url_previews =
            self.room.as_ref().is_some_and(|room| self.settings.url_previews_for(room.encrypted));
    }

    fn publish(&mut self, actions: &mut Actions) {
        let next = self.build_snapshot();
        if next != self.snapshot {
            self.snapshot = next;
            actions.push(ControllerAction::Publish);
        }
    }

    fn build_snapshot(&self) -> RoomViewState {
        let identity = self.resolver.identity();
        let failure = match identity {
            Identity::Error(cause) => Some(cause),
            _ => None,
        };
        let loading = matches!(identity, Identity::Unresolved(_) | Identity::Resolving(_)) || self.lookup_pending;
        let joining = self.arbiter.is_joining();
        let peek_loading = self.arbiter.is_peek_pending();

        let load_phase = if self.rejecting {
            LoadPhase::Rejecting
        } else if joining {
            LoadPhase::Joining
        } else if peek_loading {
            LoadPhase::PeekLoading
        } else if loading && failure.is_none() {
            LoadPhase::Loading
        } else {
            LoadPhase::Ready
        };

        let membership = if self.arbiter.is_peeking() {
            ViewMembership::Peeking
        } else {
            self.room.as_ref().map_or(ViewMembership::None, |room| ViewMembership::from_room(room.my_membership))
        };

        let view_mode = ViewMode::derive(ViewModeInputs {
            room: self.room.as_ref(),
            failure,
            client_ready: self.client_ready,
            loading,
            peek_loading,
            peek_refused: self.peek_refused,
            peeking: self.arbiter.is_peeking(),
            joining,
            rejecting: self.rejecting,
            video_rooms_enabled: self.config.video_rooms_enabled,
        });

        let widgets = self.layout.widgets();
        RoomViewState {
            target: self.resolver.target().clone(),
            identity: identity.clone(),
            room: self.room.clone(),
            membership,
            load_phase,
            peek_join: self.arbiter.state(),
            view_mode,
            live_timeline: self.reconciler.live_timeline(),
            unread_count: self.reconciler.unread_count(),
            at_live_end: self.scroll.at_live_end(),
            trust_status: self.trust.status(),
            permissions: self.permissions,
            main_content: self.layout.content(),
            rendering: self.search.mode(),
            search: self.search.view().cloned(),
            scroll_anchor: self.scroll.anchor().cloned(),
            initial_event: self.scroll.initial_event().cloned(),
            settings: self.settings,
            show_url_previews: self.show_url_previews,
            widgets,
            show_apps: widgets.show_apps(),
            active_call: self.layout.active_call().cloned(),
            right_panel_open: self.right_panel.open,
            members_loaded: self.members_loaded,
            members_incomplete: self.members_incomplete,
            can_peek: self.can_peek,
            tombstone: self.room.as_ref().and_then(|room| room.tombstone.clone()),
            join_error: self.join_error.clone(),
            reject_error: self.reject_error.clone(),
            client_ready: self.client_ready,
        }
    }
}
