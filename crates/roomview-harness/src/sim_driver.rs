//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` backs the async [`roomview_app::Runtime`] with a [`SimWorld`]
//! so the same runtime code runs in production and in tests. Every call is
//! recorded, and each async operation can be held at a gate until the test
//! releases it, which makes cancellation races reproducible.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use roomview_app::{Driver, EventSink};
use roomview_controller::{ControllerEvent, JoinOptions};
use roomview_core::{
    error::{FetchEventError, JoinError, LeaveError, MembersLoadError, PeekError, ResolutionError, SearchError, TrustError},
    event::EventContext,
    room::RoomHandle,
    scroll::ScrollState,
    search::SearchRequest,
    settings::SettingKey,
    trust::TrustStatus,
    types::{EventId, RoomAlias, RoomId, UserId},
};
use tokio::sync::watch;
use tracing::debug;

use crate::{sim_env::SimInstant, sim_world::SimWorld};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Async operation that can be held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gate {
    /// Alias resolution
    Resolve,
    /// Peek
    Peek,
    /// Join
    Join,
    /// Leave
    Leave,
    /// Shield computation
    Shield,
    /// Lazy member loading
    Members,
    /// Event fetch
    Fetch,
    /// Search
    Search,
}

impl Gate {
    const ALL: [Self; 8] =
        [Self::Resolve, Self::Peek, Self::Join, Self::Leave, Self::Shield, Self::Members, Self::Fetch, Self::Search];
}

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `subscribe`
    Subscribe(RoomId),
    /// `unsubscribe`
    Unsubscribe(RoomId),
    /// `watch_settings`
    WatchSettings(Option<RoomId>),
    /// `unwatch_settings`
    UnwatchSettings,
    /// `lookup_room`
    LookupRoom(RoomId),
    /// `scroll_state`
    ScrollState(RoomId),
    /// `set_scroll_state`
    SetScrollState(RoomId, Option<ScrollState>),
    /// `stop_peek`
    StopPeek,
    /// `start_permalinks`
    StartPermalinks(RoomId),
    /// `load_permalinks`
    LoadPermalinks(RoomId),
    /// `stop_permalinks`
    StopPermalinks(RoomId),
    /// `create_from_local_room`
    CreateFromLocalRoom(RoomId),
    /// `remove_local_room`
    RemoveLocalRoom(RoomId),
    /// `resolve_alias`
    ResolveAlias(RoomAlias),
    /// `peek`
    Peek(RoomId),
    /// `join`
    Join(RoomId, JoinOptions),
    /// `leave`
    Leave(RoomId, Option<UserId>),
    /// `compute_shield`
    ComputeShield(RoomId),
    /// `load_members`
    LoadMembers(RoomId),
    /// `fetch_event`
    FetchEvent(EventId),
    /// `search`
    Search(String),
}

struct SharedState {
    world: SimWorld,
    calls: Vec<DriverCall>,
    rooms: BTreeMap<RoomId, EventSink<SimInstant>>,
    settings: Vec<EventSink<SimInstant>>,
    refuse_subscriptions: bool,
}

/// Simulation driver for deterministic testing.
///
/// Clones share the world, the call log and the gates.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    gates: Arc<BTreeMap<Gate, watch::Sender<bool>>>,
}

impl std::fmt::Debug for SimDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimDriver").field("calls", &self.lock().calls.len()).finish_non_exhaustive()
    }
}

impl SimDriver {
    /// Driver over `world` with every gate open.
    pub fn new(world: SimWorld) -> Self {
        let state = SharedState {
            world,
            calls: Vec::new(),
            rooms: BTreeMap::new(),
            settings: Vec::new(),
            refuse_subscriptions: false,
        };
        let gates = Gate::ALL.into_iter().map(|gate| (gate, watch::Sender::new(false))).collect();
        Self { state: Arc::new(Mutex::new(state)), gates: Arc::new(gates) }
    }

    /// Makes every later subscription fail.
    pub fn refuse_subscriptions(&self) {
        self.lock().refuse_subscriptions = true;
    }

    /// Holds operations of one kind until [`release`](Self::release).
    pub fn hold(&self, gate: Gate) {
        if let Some(tx) = self.gates.get(&gate) {
            tx.send_replace(true);
        }
    }

    /// Lets held operations of one kind complete.
    pub fn release(&self, gate: Gate) {
        if let Some(tx) = self.gates.get(&gate) {
            tx.send_replace(false);
        }
    }

    /// Runs `f` against the world.
    pub fn with_world<T>(&self, f: impl FnOnce(&mut SimWorld) -> T) -> T {
        f(&mut self.lock().world)
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Whether a matching call was made.
    pub fn called(&self, pred: impl Fn(&DriverCall) -> bool) -> bool {
        self.lock().calls.iter().any(pred)
    }

    /// Whether the view still holds a subscription to `room_id`.
    pub fn is_subscribed(&self, room_id: &RoomId) -> bool {
        self.lock().rooms.contains_key(room_id)
    }

    /// Delivers a sync notification to the subscriber of `room_id`.
    ///
    /// Returns false if nobody is subscribed or the runtime stopped.
    pub fn deliver(&self, room_id: &RoomId, event: ControllerEvent<SimInstant>) -> bool {
        let sink = self.lock().rooms.get(room_id).cloned();
        sink.is_some_and(|sink| sink.send(event))
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DriverCall) {
        debug!(?call, "driver call");
        self.lock().calls.push(call);
    }

    async fn pass(&self, gate: Gate) {
        let Some(tx) = self.gates.get(&gate) else {
            return;
        };
        let mut rx = tx.subscribe();
        if rx.wait_for(|held| !*held).await.is_err() {
            debug!(?gate, "gate dropped");
        }
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    fn subscribe(&self, room_id: &RoomId, sink: EventSink<SimInstant>) -> Result<(), Self::Error> {
        self.record(DriverCall::Subscribe(room_id.clone()));
        let mut state = self.lock();
        if state.refuse_subscriptions {
            return Err(SimDriverError(format!("subscription to {room_id} refused")));
        }
        state.rooms.insert(room_id.clone(), sink);
        Ok(())
    }

    fn unsubscribe(&self, room_id: &RoomId) {
        self.record(DriverCall::Unsubscribe(room_id.clone()));
        self.lock().rooms.remove(room_id);
    }

    fn watch_settings(&self, room_id: Option<&RoomId>, keys: &[SettingKey], sink: EventSink<SimInstant>) {
        self.record(DriverCall::WatchSettings(room_id.cloned()));
        let values = self.lock().world.settings_for(keys);
        for (key, value) in values {
            sink.send(ControllerEvent::SettingChanged { key, value });
        }
        self.lock().settings.push(sink);
    }

    fn unwatch_settings(&self) {
        self.record(DriverCall::UnwatchSettings);
        self.lock().settings.clear();
    }

    fn lookup_room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.record(DriverCall::LookupRoom(room_id.clone()));
        self.lock().world.lookup_room(room_id)
    }

    fn scroll_state(&self, room_id: &RoomId) -> Option<ScrollState> {
        self.record(DriverCall::ScrollState(room_id.clone()));
        self.lock().world.scroll_state(room_id)
    }

    fn set_scroll_state(&self, room_id: &RoomId, state: Option<ScrollState>) {
        self.record(DriverCall::SetScrollState(room_id.clone(), state.clone()));
        self.lock().world.set_scroll_state(room_id, state);
    }

    fn stop_peek(&self) {
        self.record(DriverCall::StopPeek);
    }

    fn start_permalinks(&self, room_id: &RoomId) {
        self.record(DriverCall::StartPermalinks(room_id.clone()));
    }

    fn load_permalinks(&self, room_id: &RoomId) {
        self.record(DriverCall::LoadPermalinks(room_id.clone()));
    }

    fn stop_permalinks(&self, room_id: &RoomId) {
        self.record(DriverCall::StopPermalinks(room_id.clone()));
    }

    fn create_from_local_room(&self, room_id: &RoomId) {
        self.record(DriverCall::CreateFromLocalRoom(room_id.clone()));
        let room = self.lock().world.create_from_local_room(room_id);
        if let Some(room) = room {
            self.deliver(room_id, ControllerEvent::RoomAppeared { room });
        }
    }

    fn remove_local_room(&self, room_id: &RoomId) {
        self.record(DriverCall::RemoveLocalRoom(room_id.clone()));
        self.lock().world.remove_local_room(room_id);
    }

    async fn resolve_alias(&self, alias: RoomAlias) -> Result<RoomId, ResolutionError> {
        self.record(DriverCall::ResolveAlias(alias.clone()));
        self.pass(Gate::Resolve).await;
        self.lock().world.resolve_alias(&alias)
    }

    async fn peek(&self, room_id: RoomId) -> Result<RoomHandle, PeekError> {
        self.record(DriverCall::Peek(room_id.clone()));
        self.pass(Gate::Peek).await;
        self.lock().world.peek(&room_id)
    }

    async fn join(&self, room_id: RoomId, options: JoinOptions) -> Result<(), JoinError> {
        self.record(DriverCall::Join(room_id.clone(), options));
        self.pass(Gate::Join).await;
        let room = self.lock().world.join(&room_id)?;
        self.deliver(&room_id, ControllerEvent::MembershipChanged { room });
        Ok(())
    }

    async fn leave(&self, room_id: RoomId, ignore: Option<UserId>) -> Result<(), LeaveError> {
        self.record(DriverCall::Leave(room_id.clone(), ignore));
        self.pass(Gate::Leave).await;
        let left = self.lock().world.leave(&room_id)?;
        if let Some(room) = left {
            self.deliver(&room_id, ControllerEvent::MembershipChanged { room });
        }
        Ok(())
    }

    async fn compute_shield(&self, room: RoomHandle) -> Result<TrustStatus, TrustError> {
        self.record(DriverCall::ComputeShield(room.room_id));
        self.pass(Gate::Shield).await;
        self.lock().world.compute_shield()
    }

    async fn load_members(&self, room_id: RoomId) -> Result<(), MembersLoadError> {
        self.record(DriverCall::LoadMembers(room_id));
        self.pass(Gate::Members).await;
        self.lock().world.load_members()
    }

    async fn fetch_event(&self, _room_id: RoomId, event_id: EventId) -> Result<EventContext, FetchEventError> {
        self.record(DriverCall::FetchEvent(event_id.clone()));
        self.pass(Gate::Fetch).await;
        self.lock().world.fetch_event(&event_id)
    }

    async fn search(&self, request: SearchRequest) -> Result<u64, SearchError> {
        self.record(DriverCall::Search(request.term.clone()));
        tokio::select! {
            () = request.cancel.cancelled() => return Err(SearchError::Cancelled),
            () = self.pass(Gate::Search) => {},
        }
        self.lock().world.search()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use roomview_core::room::Membership;
    use tokio::sync::mpsc;

    use super::*;

    fn driver() -> SimDriver {
        let room = RoomHandle::new(RoomId::from("!r:x"), Membership::Invited);
        SimDriver::new(SimWorld::new(UserId::from("@me:x")).with_room(room))
    }

    #[tokio::test]
    async fn join_notifies_subscriber() {
        let driver = driver();
        let (tx, mut rx) = mpsc::unbounded_channel();
        driver.subscribe(&RoomId::from("!r:x"), EventSink::new(tx)).unwrap();

        driver.join(RoomId::from("!r:x"), JoinOptions::default()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ControllerEvent::MembershipChanged { room } if room.is_joined()));
        assert!(driver.called(|call| matches!(call, DriverCall::Join(..))));
    }

    #[tokio::test(start_paused = true)]
    async fn held_gate_blocks_until_released() {
        let driver = driver();
        driver.hold(Gate::Peek);

        let task = tokio::spawn({
            let driver = driver.clone();
            async move { driver.peek(RoomId::from("!r:x")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert!(driver.called(|call| matches!(call, DriverCall::Peek(_))));

        driver.release(Gate::Peek);
        assert_eq!(task.await.unwrap(), Err(PeekError::NotFound));
    }

    #[test]
    fn unsubscribe_drops_sink() {
        let driver = driver();
        let (tx, _rx) = mpsc::unbounded_channel();
        driver.subscribe(&RoomId::from("!r:x"), EventSink::new(tx)).unwrap();
        assert!(driver.is_subscribed(&RoomId::from("!r:x")));

        driver.unsubscribe(&RoomId::from("!r:x"));
        assert!(!driver.is_subscribed(&RoomId::from("!r:x")));
        assert!(!driver.deliver(&RoomId::from("!r:x"), ControllerEvent::ClientReady));
    }
}
