//! Observable state snapshots for invariant checking.
//!
//! A [`SystemSnapshot`] holds every room view state published so far, plus
//! the few collaborator facts the controller cannot see in its own snapshot.
//! Invariants operate on snapshots rather than live state so a check always
//! sees one consistent history.

use roomview_controller::RoomViewState;
use roomview_core::types::UserId;

/// History of one room view.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Local user.
    pub me: Option<UserId>,
    /// Every state observed, oldest first.
    pub states: Vec<RoomViewState>,
    /// Index into `states` of the state current at teardown.
    pub torn_down_at: Option<usize>,
    /// Collaborator still holds a peek session for this view.
    pub peek_session_open: bool,
}

impl SystemSnapshot {
    /// Create an empty snapshot (nothing observed).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot for local user `me`.
    pub fn for_user(me: UserId) -> Self {
        Self { me: Some(me), ..Self::default() }
    }

    /// Records an observed state.
    pub fn record(&mut self, state: RoomViewState) {
        self.states.push(state);
    }

    /// Marks the most recent state as the one current at teardown.
    pub fn mark_torn_down(&mut self) {
        if self.torn_down_at.is_none() {
            self.torn_down_at = self.states.len().checked_sub(1);
        }
    }

    /// Most recent state.
    pub fn latest(&self) -> Option<&RoomViewState> {
        self.states.last()
    }

    /// Consecutive state pairs, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = (&RoomViewState, &RoomViewState)> {
        self.states.iter().zip(self.states.iter().skip(1))
    }
}

#[cfg(test)]
mod tests {
    use roomview_core::types::RoomTarget;

    use super::*;

    fn state() -> RoomViewState {
        let mut request = roomview_controller::ViewRequest::new(RoomTarget::parse("!r:x"), UserId::from("@me:x"));
        request.client_ready = true;
        let env = crate::SimEnv::default();
        roomview_controller::RoomController::new(env, roomview_controller::ControllerConfig::default(), request)
            .snapshot()
            .clone()
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert!(snapshot.states.is_empty());
        assert!(snapshot.latest().is_none());
        assert_eq!(snapshot.transitions().count(), 0);
    }

    #[test]
    fn teardown_marks_latest_state_once() {
        let mut snapshot = SystemSnapshot::for_user(UserId::from("@me:x"));
        snapshot.record(state());
        snapshot.record(state());
        snapshot.mark_torn_down();
        snapshot.record(state());
        snapshot.mark_torn_down();

        assert_eq!(snapshot.torn_down_at, Some(1));
        assert_eq!(snapshot.transitions().count(), 2);
    }
}
