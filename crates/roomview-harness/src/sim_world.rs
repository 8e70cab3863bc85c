//! In-memory collaborators of a room view.
//!
//! `SimWorld` stands in for the room directory, the local room store, the
//! remote server (peek, join, leave), the trust subsystem, the search
//! backend, the settings provider and the scroll-state store. Answers are
//! configured up front with the `with_*` builders and computed at the moment
//! an operation completes, so a test can change the world while an operation
//! is in flight.

use std::collections::BTreeMap;

use roomview_core::{
    error::{
        FetchEventError, JoinError, LeaveError, MembersLoadError, PeekError, ResolutionError, SearchError, TrustError,
    },
    event::EventContext,
    room::{LocalRoomState, Membership, RoomHandle, RoomKind},
    scroll::ScrollState,
    settings::{SettingKey, SettingValue},
    trust::TrustStatus,
    types::{EventId, RoomAlias, RoomId, UserId},
};

/// Simulated collaborators.
#[derive(Debug, Clone)]
pub struct SimWorld {
    me: UserId,
    rooms: BTreeMap<RoomId, RoomHandle>,
    directory: BTreeMap<RoomAlias, Result<RoomId, ResolutionError>>,
    remote: BTreeMap<RoomId, Result<RoomHandle, PeekError>>,
    join_failures: BTreeMap<RoomId, JoinError>,
    leave_failure: Option<LeaveError>,
    shield: Result<TrustStatus, TrustError>,
    members_failure: Option<MembersLoadError>,
    events: BTreeMap<EventId, EventContext>,
    scroll_states: BTreeMap<RoomId, ScrollState>,
    search: Result<u64, SearchError>,
    settings: BTreeMap<SettingKey, SettingValue>,
}

impl SimWorld {
    /// Empty world for local user `me`.
    ///
    /// Unknown aliases and rooms are not found, shields compute as normal and
    /// searches find nothing.
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            rooms: BTreeMap::new(),
            directory: BTreeMap::new(),
            remote: BTreeMap::new(),
            join_failures: BTreeMap::new(),
            leave_failure: None,
            shield: Ok(TrustStatus::Normal),
            members_failure: None,
            events: BTreeMap::new(),
            scroll_states: BTreeMap::new(),
            search: Ok(0),
            settings: BTreeMap::new(),
        }
    }

    /// Local user.
    pub fn me(&self) -> &UserId {
        &self.me
    }

    /// Adds a room to the local store.
    #[must_use]
    pub fn with_room(mut self, room: RoomHandle) -> Self {
        self.rooms.insert(room.room_id.clone(), room);
        self
    }

    /// Publishes an alias in the directory.
    #[must_use]
    pub fn with_alias(mut self, alias: &str, room_id: &str) -> Self {
        self.directory.insert(RoomAlias::from(alias), Ok(RoomId::from(room_id)));
        self
    }

    /// Makes the directory answer an alias with an error.
    #[must_use]
    pub fn with_alias_error(mut self, alias: &str, err: ResolutionError) -> Self {
        self.directory.insert(RoomAlias::from(alias), Err(err));
        self
    }

    /// Adds a room the server lets us peek into.
    #[must_use]
    pub fn with_remote_room(mut self, room: RoomHandle) -> Self {
        self.remote.insert(room.room_id.clone(), Ok(room));
        self
    }

    /// Makes peeking into a room fail.
    #[must_use]
    pub fn with_peek_error(mut self, room_id: &str, err: PeekError) -> Self {
        self.remote.insert(RoomId::from(room_id), Err(err));
        self
    }

    /// Makes joining a room fail.
    #[must_use]
    pub fn with_join_failure(mut self, room_id: &str, err: JoinError) -> Self {
        self.join_failures.insert(RoomId::from(room_id), err);
        self
    }

    /// Makes every leave fail.
    #[must_use]
    pub fn with_leave_failure(mut self, err: LeaveError) -> Self {
        self.leave_failure = Some(err);
        self
    }

    /// Sets the shield computation result.
    #[must_use]
    pub fn with_shield(mut self, result: Result<TrustStatus, TrustError>) -> Self {
        self.shield = result;
        self
    }

    /// Makes lazy member loading fail.
    #[must_use]
    pub fn with_members_failure(mut self, err: MembersLoadError) -> Self {
        self.members_failure = Some(err);
        self
    }

    /// Makes an event fetchable.
    #[must_use]
    pub fn with_event(mut self, context: EventContext) -> Self {
        self.events.insert(context.event_id.clone(), context);
        self
    }

    /// Stores a persisted scroll state.
    #[must_use]
    pub fn with_scroll_state(mut self, room_id: &str, state: ScrollState) -> Self {
        self.scroll_states.insert(RoomId::from(room_id), state);
        self
    }

    /// Sets the search backend answer.
    #[must_use]
    pub fn with_search(mut self, result: Result<u64, SearchError>) -> Self {
        self.search = result;
        self
    }

    /// Sets a setting value.
    #[must_use]
    pub fn with_setting(mut self, key: SettingKey, value: SettingValue) -> Self {
        self.settings.insert(key, value);
        self
    }

    /// Changes the shield result for later computations.
    pub fn set_shield(&mut self, result: Result<TrustStatus, TrustError>) {
        self.shield = result;
    }

    /// Replaces a room in the local store.
    pub fn put_room(&mut self, room: RoomHandle) {
        self.rooms.insert(room.room_id.clone(), room);
    }

    /// Local store lookup.
    pub fn lookup_room(&self, room_id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(room_id).cloned()
    }

    /// Directory lookup.
    pub fn resolve_alias(&self, alias: &RoomAlias) -> Result<RoomId, ResolutionError> {
        self.directory.get(alias).cloned().unwrap_or(Err(ResolutionError::NotFound))
    }

    /// Peek into a room.
    pub fn peek(&self, room_id: &RoomId) -> Result<RoomHandle, PeekError> {
        self.remote.get(room_id).cloned().unwrap_or(Err(PeekError::NotFound))
    }

    /// Joins a room and stores the joined snapshot.
    pub fn join(&mut self, room_id: &RoomId) -> Result<RoomHandle, JoinError> {
        if let Some(err) = self.join_failures.get(room_id) {
            return Err(err.clone());
        }

        let mut room = self
            .rooms
            .get(room_id)
            .cloned()
            .or_else(|| self.remote.get(room_id).and_then(|peeked| peeked.clone().ok()))
            .unwrap_or_else(|| RoomHandle::new(room_id.clone(), Membership::None));
        room.my_membership = Membership::Joined;
        room.inviter = None;
        room.members.insert(self.me.clone(), Membership::Joined);

        self.rooms.insert(room_id.clone(), room.clone());
        Ok(room)
    }

    /// Leaves a room. Returns the stored snapshot after leaving, if the room
    /// was known.
    pub fn leave(&mut self, room_id: &RoomId) -> Result<Option<RoomHandle>, LeaveError> {
        if let Some(err) = &self.leave_failure {
            return Err(err.clone());
        }

        let me = self.me.clone();
        Ok(self.rooms.get_mut(room_id).map(|room| {
            room.my_membership = Membership::Left;
            room.members.insert(me, Membership::Left);
            room.clone()
        }))
    }

    /// Shield computation.
    pub fn compute_shield(&self) -> Result<TrustStatus, TrustError> {
        self.shield.clone()
    }

    /// Lazy member loading.
    pub fn load_members(&self) -> Result<(), MembersLoadError> {
        self.members_failure.clone().map_or(Ok(()), Err)
    }

    /// Event fetch.
    pub fn fetch_event(&self, event_id: &EventId) -> Result<EventContext, FetchEventError> {
        self.events.get(event_id).cloned().ok_or(FetchEventError::NotFound)
    }

    /// Search backend.
    pub fn search(&self) -> Result<u64, SearchError> {
        self.search.clone()
    }

    /// Persisted scroll state.
    pub fn scroll_state(&self, room_id: &RoomId) -> Option<ScrollState> {
        self.scroll_states.get(room_id).cloned()
    }

    /// Persists or clears a scroll state.
    pub fn set_scroll_state(&mut self, room_id: &RoomId, state: Option<ScrollState>) {
        match state {
            Some(state) => self.scroll_states.insert(room_id.clone(), state),
            None => self.scroll_states.remove(room_id),
        };
    }

    /// Current values of `keys` that the provider knows.
    pub fn settings_for(&self, keys: &[SettingKey]) -> Vec<(SettingKey, SettingValue)> {
        keys.iter().filter_map(|key| self.settings.get(key).map(|value| (*key, *value))).collect()
    }

    /// Starts creating the real room behind a local draft room.
    pub fn create_from_local_room(&mut self, room_id: &RoomId) -> Option<RoomHandle> {
        let room = self.rooms.get_mut(room_id)?;
        room.kind = RoomKind::Local(LocalRoomState::Creating);
        Some(room.clone())
    }

    /// Removes a local draft room.
    pub fn remove_local_room(&mut self, room_id: &RoomId) {
        if self.rooms.get(room_id).is_some_and(RoomHandle::is_local) {
            self.rooms.remove(room_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn me() -> UserId {
        UserId::from("@me:x")
    }

    #[test]
    fn join_stores_joined_snapshot() {
        let invited = RoomHandle::new(RoomId::from("!r:x"), Membership::Invited);
        let mut world = SimWorld::new(me()).with_room(invited);

        let joined = world.join(&RoomId::from("!r:x")).unwrap();
        assert_eq!(joined.my_membership, Membership::Joined);
        assert!(joined.is_member(&me()));
        assert_eq!(world.lookup_room(&RoomId::from("!r:x")), Some(joined));
    }

    #[test]
    fn join_failure_leaves_store_untouched() {
        let mut world =
            SimWorld::new(me()).with_join_failure("!r:x", JoinError::Forbidden("banned".to_owned()));

        assert!(world.join(&RoomId::from("!r:x")).is_err());
        assert!(world.lookup_room(&RoomId::from("!r:x")).is_none());
    }

    #[test]
    fn unknown_things_are_not_found() {
        let world = SimWorld::new(me());
        assert_eq!(world.resolve_alias(&RoomAlias::from("#a:x")), Err(ResolutionError::NotFound));
        assert_eq!(world.peek(&RoomId::from("!r:x")), Err(PeekError::NotFound));
        assert_eq!(world.fetch_event(&EventId::from("$e")), Err(FetchEventError::NotFound));
    }

    #[test]
    fn only_local_rooms_are_removed() {
        let mut local = RoomHandle::new(RoomId::from("!local:x"), Membership::Joined);
        local.kind = RoomKind::Local(LocalRoomState::New);
        let regular = RoomHandle::new(RoomId::from("!r:x"), Membership::Joined);
        let mut world = SimWorld::new(me()).with_room(local).with_room(regular);

        world.remove_local_room(&RoomId::from("!local:x"));
        world.remove_local_room(&RoomId::from("!r:x"));

        assert!(world.lookup_room(&RoomId::from("!local:x")).is_none());
        assert!(world.lookup_room(&RoomId::from("!r:x")).is_some());
    }
}
