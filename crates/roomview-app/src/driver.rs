//! Driver trait for abstracting the room view's collaborators.
//!
//! The [`Driver`] trait decouples the runtime from the sync client, room
//! store, trust subsystem, search backend and the small per-room stores the
//! view reads and writes. Production wires these to a real client; the
//! simulation harness wires them to in-memory fakes with controllable
//! latency.

use std::{future::Future, ops::Sub, time::Duration};

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
use tokio::sync::mpsc;

/// Sending half of the runtime's inbound channel.
///
/// Handed to push-style collaborators (sync source, settings provider) so
/// their notifications are serialized with everything else the controller
/// sees.
#[derive(Debug, Clone)]
pub struct EventSink<I> {
    tx: mpsc::UnboundedSender<ControllerEvent<I>>,
}

impl<I> EventSink<I> {
    /// Sink feeding `tx`.
    pub fn new(tx: mpsc::UnboundedSender<ControllerEvent<I>>) -> Self {
        Self { tx }
    }

    /// Delivers an event. Returns false once the runtime has stopped.
    pub fn send(&self, event: ControllerEvent<I>) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the runtime has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Abstracts every collaborator of the room view.
///
/// Synchronous methods are cheap store reads or fire-and-forget
/// notifications. Asynchronous methods are suspension points; the runtime
/// runs them on background tasks and feeds their results back through the
/// inbound channel, dropping them if the view was torn down meanwhile.
///
/// # Implementations
///
/// - **Production**: adapter over a chat client SDK
/// - **Simulation**: `SimDriver` with hold/release gates and call recording
pub trait Driver: Clone + Send + Sync + 'static {
    /// Collaborator error (subscription failures).
    type Error: std::error::Error + Send + Sync + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration> + 'static;

    /// Subscribes to the room's sync events.
    ///
    /// Timeline, decryption, reset, name, state and membership notifications
    /// for `room_id` are delivered to `sink` in upstream order.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync source cannot serve the room.
    fn subscribe(&self, room_id: &RoomId, sink: EventSink<Self::Instant>) -> Result<(), Self::Error>;

    /// Releases the room subscription. Idempotent.
    fn unsubscribe(&self, room_id: &RoomId);

    /// Watches setting keys, delivering current values and later changes as
    /// `SettingChanged` events.
    fn watch_settings(&self, room_id: Option<&RoomId>, keys: &[SettingKey], sink: EventSink<Self::Instant>);

    /// Releases every setting watch of this view.
    fn unwatch_settings(&self);

    /// Local room store lookup.
    fn lookup_room(&self, room_id: &RoomId) -> Option<RoomHandle>;

    /// Persisted scroll state of a room.
    fn scroll_state(&self, room_id: &RoomId) -> Option<ScrollState>;

    /// Persists the scroll state; `None` resumes from the read marker.
    fn set_scroll_state(&self, room_id: &RoomId, state: Option<ScrollState>);

    /// Tears down the peek session. Idempotent.
    fn stop_peek(&self);

    /// Starts a tracking permalink creator.
    fn start_permalinks(&self, room_id: &RoomId);

    /// Loads a one-shot permalink creator.
    fn load_permalinks(&self, room_id: &RoomId);

    /// Stops a permalink creator.
    fn stop_permalinks(&self, room_id: &RoomId);

    /// Creates the real room from a local draft room.
    fn create_from_local_room(&self, room_id: &RoomId);

    /// Removes a local draft room.
    fn remove_local_room(&self, room_id: &RoomId);

    /// Resolves an alias through the room directory.
    fn resolve_alias(&self, alias: RoomAlias) -> impl Future<Output = Result<RoomId, ResolutionError>> + Send;

    /// Peeks into a room the local user is not a member of.
    fn peek(&self, room_id: RoomId) -> impl Future<Output = Result<RoomHandle, PeekError>> + Send;

    /// Sends a join request.
    ///
    /// Completion is observed through a membership change, not through the
    /// returned value; only failures are reported here.
    fn join(&self, room_id: RoomId, options: JoinOptions) -> impl Future<Output = Result<(), JoinError>> + Send;

    /// Leaves the room, optionally ignoring a user as well.
    fn leave(&self, room_id: RoomId, ignore: Option<UserId>) -> impl Future<Output = Result<(), LeaveError>> + Send;

    /// Computes the trust shield of an encrypted room.
    fn compute_shield(&self, room: RoomHandle) -> impl Future<Output = Result<TrustStatus, TrustError>> + Send;

    /// Loads the full member list.
    fn load_members(&self, room_id: RoomId) -> impl Future<Output = Result<(), MembersLoadError>> + Send;

    /// Fetches an event not available locally.
    fn fetch_event(
        &self,
        room_id: RoomId,
        event_id: EventId,
    ) -> impl Future<Output = Result<EventContext, FetchEventError>> + Send;

    /// Runs a search and returns the result count.
    ///
    /// Implementations should observe `request.cancel`; the runtime also
    /// drops the result once the token fires.
    fn search(&self, request: SearchRequest) -> impl Future<Output = Result<u64, SearchError>> + Send;
}
