//! Sans-IO harness around one room controller.
//!
//! The harness plays the runtime's role without tasks or channels. Store
//! reads complete immediately and queue their result behind the current
//! event, exactly like the runtime's inbound channel. Async collaborator work
//! is parked as a [`PendingOp`] until the test completes it, in any order, so
//! late and out-of-order results can be explored exhaustively.
//!
//! Every published snapshot is recorded into a [`SystemSnapshot`] for the
//! invariant checks.

use std::{collections::VecDeque, time::Duration};

use roomview_controller::{
    ControllerAction, ControllerConfig, ControllerError, ControllerEvent, RoomController, RoomViewState, Signal,
    ViewRequest,
};
use roomview_core::{
    env::Environment,
    error::SearchError,
    event::{TimelineDelivery, TimelineEvent},
    layout::WidgetLayout,
    room::{Membership, RoomHandle},
    scroll::ScrollAnchor,
    search::{SearchRequest, SearchScope},
    settings::{SettingKey, SettingValue},
    types::{CallId, EventId, RoomAlias, RoomId, TimelineId, UserId},
};
use tracing::debug;

use crate::{
    invariants::{InvariantRegistry, SystemSnapshot, Violation},
    operation::{Body, Completion, Operation, Sender},
    sim_env::{SimEnv, SimInstant},
    sim_world::SimWorld,
};

/// Upper bound on completions processed by [`ControllerHarness::settle`].
const MAX_SETTLE_STEPS: usize = 256;

/// Async collaborator work awaiting completion.
#[derive(Debug, Clone)]
pub enum PendingOp {
    /// Directory lookup.
    ResolveAlias(RoomAlias),
    /// Peek attempt.
    Peek(RoomId),
    /// Join request.
    Join(RoomId),
    /// Invite rejection.
    Leave(RoomId),
    /// Shield computation.
    ComputeShield {
        /// Generation to echo back.
        generation: u64,
    },
    /// Lazy member loading.
    LoadMembers(RoomId),
    /// Missing-event fetch.
    FetchEvent(EventId),
    /// Search session.
    Search(SearchRequest),
}

/// Deterministic harness driving one [`RoomController`].
pub struct ControllerHarness {
    env: SimEnv,
    world: SimWorld,
    controller: RoomController<SimEnv>,
    inbox: VecDeque<ControllerEvent<SimInstant>>,
    pending: VecDeque<PendingOp>,
    actions: Vec<ControllerAction>,
    signals: Vec<Signal>,
    rejections: Vec<ControllerError>,
    history: SystemSnapshot,
    subscribed: Option<RoomId>,
    next_event: u64,
}

impl std::fmt::Debug for ControllerHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHarness")
            .field("pending", &self.pending.len())
            .field("states", &self.history.states.len())
            .field("torn_down", &self.controller.is_torn_down())
            .finish_non_exhaustive()
    }
}

impl ControllerHarness {
    /// Harness with the default controller configuration.
    pub fn new(world: SimWorld, request: ViewRequest) -> Self {
        Self::with_config(world, request, ControllerConfig::default())
    }

    /// Harness with an explicit controller configuration.
    pub fn with_config(world: SimWorld, request: ViewRequest, config: ControllerConfig) -> Self {
        let env = SimEnv::default();
        let mut history = SystemSnapshot::for_user(request.me.clone());
        let controller = RoomController::new(env.clone(), config, request);
        history.record(controller.snapshot().clone());

        Self {
            env,
            world,
            controller,
            inbox: VecDeque::new(),
            pending: VecDeque::new(),
            actions: Vec::new(),
            signals: Vec::new(),
            rejections: Vec::new(),
            history,
            subscribed: None,
            next_event: 0,
        }
    }

    /// Starts the controller and runs every synchronous follow-up.
    pub fn start(&mut self) {
        let actions = self.controller.start();
        self.execute(actions);
        self.drain_inbox();
    }

    /// Delivers one event and runs every synchronous follow-up.
    ///
    /// # Errors
    ///
    /// Returns the controller's rejection of a user intent. Nothing changed
    /// in that case.
    pub fn deliver(&mut self, event: ControllerEvent<SimInstant>) -> Result<(), ControllerError> {
        let result = self.process(event);
        self.drain_inbox();
        result
    }

    /// Delivers a sync notification if the view is subscribed to its room.
    ///
    /// Returns whether the event was delivered.
    pub fn deliver_sync(&mut self, event: ControllerEvent<SimInstant>) -> bool {
        if self.subscribed.is_none() {
            return false;
        }
        if let Err(err) = self.deliver(event) {
            debug!(%err, "sync event rejected");
        }
        true
    }

    /// Finishes the oldest in-flight operation. Returns false if none was.
    pub fn complete_next(&mut self) -> bool {
        let Some(op) = self.pending.pop_front() else {
            return false;
        };
        self.complete(op);
        true
    }

    /// Finishes the newest in-flight operation. Returns false if none was.
    pub fn complete_last(&mut self) -> bool {
        let Some(op) = self.pending.pop_back() else {
            return false;
        };
        self.complete(op);
        true
    }

    /// Finishes the in-flight operation at `index`, oldest first.
    pub fn complete_at(&mut self, index: usize) -> bool {
        let Some(op) = self.pending.remove(index) else {
            return false;
        };
        self.complete(op);
        true
    }

    /// Finishes in-flight operations until none remain.
    ///
    /// Completions may start more work; processing stops after a fixed
    /// number of steps.
    pub fn settle(&mut self) {
        for _ in 0..MAX_SETTLE_STEPS {
            if !self.complete_next() {
                return;
            }
        }
        debug!(pending = self.pending.len(), "settle step limit reached");
    }

    /// Moves the virtual clock and delivers a tick.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();
        if let Err(err) = self.deliver(ControllerEvent::Tick { now }) {
            debug!(%err, "tick rejected");
        }
    }

    /// Tears the view down.
    ///
    /// In-flight work is abandoned, as the runtime cancels its tasks.
    pub fn teardown(&mut self) {
        let actions = self.controller.teardown();
        self.history.mark_torn_down();
        self.pending.clear();
        self.execute(actions);
        self.drain_inbox();
    }

    /// Applies a generated operation.
    ///
    /// Rejected intents are recorded, not returned.
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::LiveMessage { sender, body } => {
                if let Some(event) = self.message(*sender, *body) {
                    self.deliver_sync(ControllerEvent::Timeline { event, delivery: TimelineDelivery::live() });
                }
            },
            Operation::PaginatedMessage { body } => {
                if let Some(event) = self.message(Sender::Alice, *body) {
                    self.deliver_sync(ControllerEvent::Timeline { event, delivery: TimelineDelivery::paginated() });
                }
            },
            Operation::Scroll { at_live_end } => {
                let anchor = if *at_live_end {
                    ScrollAnchor::StuckToBottom
                } else {
                    ScrollAnchor::Event { event_id: EventId::from("$e0"), pixel_offset: 120 }
                };
                self.intent(ControllerEvent::Scrolled { at_live_end: *at_live_end, anchor: Some(anchor) });
            },
            Operation::TimelineReset { generation } => {
                if let Some(room_id) = self.subscribed.clone() {
                    let timeline = TimelineId(u64::from(*generation));
                    self.deliver_sync(ControllerEvent::TimelineReset { room_id, timeline });
                }
            },
            Operation::Join => self.intent(ControllerEvent::JoinRequested),
            Operation::RejectInvite { ignore_inviter } => {
                self.intent(ControllerEvent::RejectRequested { ignore_inviter: *ignore_inviter });
            },
            Operation::MembersChanged => {
                if let Some(mut room) = self.controller.snapshot().room.clone() {
                    let bob = UserId::from("@bob:sim");
                    let toggled =
                        if room.is_member(&bob) { Membership::Left } else { Membership::Joined };
                    room.members.insert(bob, toggled);
                    self.world.put_room(room.clone());
                    self.deliver_sync(ControllerEvent::MembersChanged { room });
                }
            },
            Operation::ClientReady => self.intent(ControllerEvent::ClientReady),
            Operation::Search { all_rooms } => {
                let scope = if *all_rooms { SearchScope::All } else { SearchScope::Room };
                self.intent(ControllerEvent::SearchRequested { term: "needle".to_owned(), scope });
            },
            Operation::CancelSearch => self.intent(ControllerEvent::SearchCancelRequested),
            Operation::ToggleSearch => self.intent(ControllerEvent::SearchToggled),
            Operation::MaximiseWidget { maximised } => {
                if let Some(room_id) = self.controller.room_id().cloned() {
                    let layout = WidgetLayout { has_maximised_widget: *maximised, ..WidgetLayout::default() };
                    self.intent(ControllerEvent::WidgetLayoutChanged { room_id, layout });
                }
            },
            Operation::ActiveCall { active } => {
                if let Some(room_id) = self.controller.room_id().cloned() {
                    let call = active.then(|| CallId::from("call-1"));
                    self.intent(ControllerEvent::ActiveCallChanged { room_id, call });
                }
            },
            Operation::ViewCall { viewing } => self.intent(ControllerEvent::CallViewChanged { viewing: *viewing }),
            Operation::JumpToLive => self.intent(ControllerEvent::JumpToLive),
            Operation::JumpToEvent { event } => {
                let event_id = EventId::new(format!("$e{}", event % 8));
                self.intent(ControllerEvent::JumpToEvent { event_id, highlighted: true });
            },
            Operation::DeviceVerified => {
                self.intent(ControllerEvent::DeviceVerificationChanged { user_id: UserId::from("@alice:sim") });
            },
            Operation::UrlPreviews { enabled } => self.intent(ControllerEvent::SettingChanged {
                key: SettingKey::UrlPreviewsEnabled,
                value: SettingValue::Bool(*enabled),
            }),
            Operation::NotificationState { unread } => {
                if let Some(room_id) = self.controller.room_id().cloned() {
                    self.intent(ControllerEvent::NotificationStateChanged { room_id, unread: *unread });
                }
            },
            Operation::Complete(Completion::Oldest) => {
                self.complete_next();
            },
            Operation::Complete(Completion::Newest) => {
                self.complete_last();
            },
            Operation::Settle => self.settle(),
            Operation::AdvanceTime { millis } => self.advance(Duration::from_millis(u64::from(*millis))),
            Operation::Teardown => self.teardown(),
        }
    }

    /// Checks every standard invariant against the recorded history.
    ///
    /// # Errors
    ///
    /// Returns every violated invariant.
    pub fn check_invariants(&self) -> Result<(), Vec<Violation>> {
        InvariantRegistry::standard().check_all(&self.history)
    }

    /// Current snapshot.
    pub fn state(&self) -> &RoomViewState {
        self.controller.snapshot()
    }

    /// The controller under test.
    pub fn controller(&self) -> &RoomController<SimEnv> {
        &self.controller
    }

    /// Simulated collaborators.
    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Simulated collaborators, for changing answers mid-test.
    pub fn world_mut(&mut self) -> &mut SimWorld {
        &mut self.world
    }

    /// Virtual environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// In-flight operations, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingOp> {
        self.pending.iter()
    }

    /// Every action the controller emitted, in order.
    pub fn actions(&self) -> &[ControllerAction] {
        &self.actions
    }

    /// Whether a matching action was emitted.
    pub fn emitted(&self, pred: impl Fn(&ControllerAction) -> bool) -> bool {
        self.actions.iter().any(pred)
    }

    /// Every signal sent to consumers, in order.
    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// Intents the controller rejected.
    pub fn rejections(&self) -> &[ControllerError] {
        &self.rejections
    }

    /// Recorded history.
    pub fn history(&self) -> &SystemSnapshot {
        &self.history
    }

    /// Room the view is subscribed to.
    pub fn subscribed(&self) -> Option<&RoomId> {
        self.subscribed.as_ref()
    }

    fn intent(&mut self, event: ControllerEvent<SimInstant>) {
        if let Err(err) = self.deliver(event) {
            debug!(%err, "intent rejected");
            self.rejections.push(err);
        }
    }

    fn message(&mut self, sender: Sender, body: Body) -> Option<TimelineEvent> {
        let room_id = self.subscribed.clone()?;
        let sender = match sender {
            Sender::Me => self.world.me().clone(),
            Sender::Alice => UserId::from("@alice:sim"),
            Sender::Bob => UserId::from("@bob:sim"),
        };
        let event_id = EventId::new(format!("$m{}", self.next_event));
        self.next_event += 1;
        Some(TimelineEvent::text(event_id, room_id, sender, body.text()))
    }

    fn process(&mut self, event: ControllerEvent<SimInstant>) -> Result<(), ControllerError> {
        let actions = self.controller.handle(event)?;
        self.execute(actions);
        if self.controller.is_torn_down() {
            self.history.record(self.controller.snapshot().clone());
        }
        Ok(())
    }

    fn drain_inbox(&mut self) {
        while let Some(event) = self.inbox.pop_front() {
            if let Err(err) = self.process(event) {
                debug!(%err, "queued event rejected");
            }
        }
    }

    fn execute(&mut self, actions: Vec<ControllerAction>) {
        for action in actions {
            self.execute_one(&action);
            self.actions.push(action);
        }
    }

    fn execute_one(&mut self, action: &ControllerAction) {
        match action {
            ControllerAction::Publish => self.history.record(self.controller.snapshot().clone()),
            ControllerAction::Signal(signal) => self.signals.push(signal.clone()),

            ControllerAction::LookupRoom { room_id } => {
                let room = self.world.lookup_room(room_id);
                self.inbox.push_back(ControllerEvent::RoomLookup { room_id: room_id.clone(), room });
            },
            ControllerAction::LoadScrollState { room_id } => {
                let state = self.world.scroll_state(room_id);
                self.inbox.push_back(ControllerEvent::ScrollStateLoaded { room_id: room_id.clone(), state });
            },
            ControllerAction::Subscribe { room_id } => self.subscribed = Some(room_id.clone()),
            ControllerAction::Unsubscribe { .. } => self.subscribed = None,
            ControllerAction::WatchSettings { keys, .. } => {
                for (key, value) in self.world.settings_for(keys) {
                    self.inbox.push_back(ControllerEvent::SettingChanged { key, value });
                }
            },
            ControllerAction::PersistScroll { room_id, state } => {
                self.world.set_scroll_state(room_id, state.clone());
            },
            ControllerAction::CreateFromLocalRoom { room_id } => {
                if let Some(room) = self.world.create_from_local_room(room_id) {
                    self.inbox.push_back(ControllerEvent::RoomAppeared { room });
                }
            },
            ControllerAction::RemoveLocalRoom { room_id } => self.world.remove_local_room(room_id),
            ControllerAction::Peek { room_id } => {
                self.history.peek_session_open = true;
                self.pending.push_back(PendingOp::Peek(room_id.clone()));
            },
            ControllerAction::StopPeek => self.history.peek_session_open = false,

            ControllerAction::ResolveAlias { alias } => self.pending.push_back(PendingOp::ResolveAlias(alias.clone())),
            ControllerAction::Join { room_id, .. } => self.pending.push_back(PendingOp::Join(room_id.clone())),
            ControllerAction::Leave { room_id, .. } => self.pending.push_back(PendingOp::Leave(room_id.clone())),
            ControllerAction::ComputeShield { generation, .. } => {
                self.pending.push_back(PendingOp::ComputeShield { generation: *generation });
            },
            ControllerAction::LoadMembers { room_id } => {
                self.pending.push_back(PendingOp::LoadMembers(room_id.clone()));
            },
            ControllerAction::FetchEvent { event_id, .. } => {
                self.pending.push_back(PendingOp::FetchEvent(event_id.clone()));
            },
            ControllerAction::Search(request) => self.pending.push_back(PendingOp::Search(request.clone())),

            ControllerAction::UnwatchSettings
            | ControllerAction::StartPermalinks { .. }
            | ControllerAction::LoadPermalinks { .. }
            | ControllerAction::StopPermalinks { .. } => {},
        }
    }

    fn complete(&mut self, op: PendingOp) {
        debug!(?op, "completing");
        let events = match op {
            PendingOp::ResolveAlias(alias) => {
                let result = self.world.resolve_alias(&alias);
                vec![ControllerEvent::AliasResolved { alias, result }]
            },
            PendingOp::Peek(room_id) => {
                let result = self.world.peek(&room_id);
                if result.is_err() {
                    self.history.peek_session_open = false;
                }
                vec![ControllerEvent::PeekCompleted { room_id, result }]
            },
            PendingOp::Join(room_id) => match self.world.join(&room_id) {
                Ok(room) => self.sync_only(ControllerEvent::MembershipChanged { room }),
                Err(error) => vec![ControllerEvent::JoinFailed { room_id, error }],
            },
            PendingOp::Leave(room_id) => match self.world.leave(&room_id) {
                Ok(left) => {
                    let mut events = left
                        .map(|room| self.sync_only(ControllerEvent::MembershipChanged { room }))
                        .unwrap_or_default();
                    events.push(ControllerEvent::RejectCompleted { room_id, result: Ok(()) });
                    events
                },
                Err(err) => vec![ControllerEvent::RejectCompleted { room_id, result: Err(err) }],
            },
            PendingOp::ComputeShield { generation } => {
                vec![ControllerEvent::ShieldComputed { generation, result: self.world.compute_shield() }]
            },
            PendingOp::LoadMembers(room_id) => {
                vec![ControllerEvent::MembersLoaded { room_id, result: self.world.load_members() }]
            },
            PendingOp::FetchEvent(event_id) => {
                let result = self.world.fetch_event(&event_id);
                vec![ControllerEvent::EventFetched { event_id, result }]
            },
            PendingOp::Search(request) => vec![self.search_result(&request)],
        };

        for event in events {
            if let Err(err) = self.deliver(event) {
                debug!(%err, "completion rejected");
            }
        }
    }

    fn sync_only(&self, event: ControllerEvent<SimInstant>) -> Vec<ControllerEvent<SimInstant>> {
        if self.subscribed.is_some() { vec![event] } else { Vec::new() }
    }

    fn search_result(&self, request: &SearchRequest) -> ControllerEvent<SimInstant> {
        let id = request.id;
        if request.cancel.is_cancelled() {
            return ControllerEvent::SearchFailed { id, error: SearchError::Cancelled };
        }
        match self.world.search() {
            Ok(result_count) => ControllerEvent::SearchProgress { id, result_count, in_progress: false },
            Err(error) => ControllerEvent::SearchFailed { id, error },
        }
    }
}

/// Builds a joined room with two other members.
pub fn joined_room(room_id: &str, me: &UserId) -> RoomHandle {
    let mut room = RoomHandle::new(RoomId::from(room_id), Membership::Joined);
    room.members.insert(me.clone(), Membership::Joined);
    room.members.insert(UserId::from("@alice:sim"), Membership::Joined);
    room.members.insert(UserId::from("@bob:sim"), Membership::Joined);
    room
}
