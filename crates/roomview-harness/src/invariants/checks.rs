//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use roomview_controller::{LoadPhase, RoomViewState, ViewMembership};
use roomview_core::{
    arbiter::PeekJoinState,
    identity::Identity,
    layout::MainContent,
    room::Membership,
    search::RenderingMode,
    trust::Permissions,
};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

fn violation(invariant: &'static str, message: String) -> InvariantResult {
    Err(Violation { invariant, message })
}

fn room_joined(state: &RoomViewState) -> bool {
    state.room.as_ref().is_some_and(|room| room.my_membership == Membership::Joined)
}

/// Nothing changes once the view is torn down.
///
/// Every state recorded after teardown must equal the state current at
/// teardown. A late collaborator result leaking through would show up here.
pub struct NoMutationAfterTeardown;

impl Invariant for NoMutationAfterTeardown {
    fn name(&self) -> &'static str {
        "no_mutation_after_teardown"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(at) = state.torn_down_at else {
            return Ok(());
        };
        let Some(frozen) = state.states.get(at) else {
            return Ok(());
        };

        for (offset, later) in state.states.iter().skip(at + 1).enumerate() {
            if later != frozen {
                return violation(
                    self.name(),
                    format!("state {} differs from the state at teardown ({at})", at + 1 + offset),
                );
            }
        }
        Ok(())
    }
}

/// Peeking and being joined are mutually exclusive.
///
/// No snapshot may present a peek session for a joined room, and once the
/// room is joined the collaborator must not still hold a peek session.
pub struct PeekJoinExclusive;

impl Invariant for PeekJoinExclusive {
    fn name(&self) -> &'static str {
        "peek_join_exclusive"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (index, view) in state.states.iter().enumerate() {
            let peeking = view.membership == ViewMembership::Peeking || view.peek_join == PeekJoinState::Peeking;
            if peeking && room_joined(view) {
                return violation(self.name(), format!("state {index}: peeking into a joined room"));
            }
        }

        if state.peek_session_open
            && state.torn_down_at.is_none()
            && state.latest().is_some_and(room_joined)
        {
            return violation(self.name(), "peek session still open after joining".to_owned());
        }
        Ok(())
    }
}

/// The permission triple always matches the adopted room.
///
/// All three capabilities are computed together; a snapshot whose triple
/// differs from a fresh computation exposed a partial update.
pub struct PermissionsConsistent;

impl Invariant for PermissionsConsistent {
    fn name(&self) -> &'static str {
        "permissions_consistent"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let Some(me) = &state.me else {
            return Ok(());
        };

        for (index, view) in state.states.iter().enumerate() {
            let expected = view.room.as_ref().map_or_else(Permissions::none, |room| Permissions::compute(room, me));
            if view.permissions != expected {
                return violation(
                    self.name(),
                    format!("state {index}: permissions {:?}, room grants {expected:?}", view.permissions),
                );
            }
        }
        Ok(())
    }
}

/// Search only ever replaces the timeline.
///
/// While the main area shows a call or a maximised widget, neither the search
/// rendering mode nor a live search session may be visible.
pub struct SearchRequiresTimeline;

impl Invariant for SearchRequiresTimeline {
    fn name(&self) -> &'static str {
        "search_requires_timeline"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (index, view) in state.states.iter().enumerate() {
            if view.search.is_some() && view.rendering != RenderingMode::Search {
                return violation(self.name(), format!("state {index}: live search while rendering the room"));
            }
            if view.rendering == RenderingMode::Search && view.main_content != MainContent::Timeline {
                return violation(
                    self.name(),
                    format!("state {index}: search shown over {:?}", view.main_content),
                );
            }
        }
        Ok(())
    }
}

/// The load phase agrees with the peek/join arbiter.
pub struct LoadPhaseConsistent;

impl Invariant for LoadPhaseConsistent {
    fn name(&self) -> &'static str {
        "load_phase_consistent"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (index, view) in state.states.iter().enumerate() {
            let consistent = match (view.load_phase, view.peek_join) {
                (LoadPhase::Joining, arbiter) => arbiter == PeekJoinState::Joining,
                (LoadPhase::PeekLoading, arbiter) => arbiter == PeekJoinState::PeekPending,
                (LoadPhase::Rejecting, _) => true,
                (_, PeekJoinState::Joining | PeekJoinState::PeekPending) => false,
                _ => true,
            };
            if !consistent {
                return violation(
                    self.name(),
                    format!("state {index}: load phase {:?} with arbiter {:?}", view.load_phase, view.peek_join),
                );
            }
        }
        Ok(())
    }
}

/// Room identity only moves forward.
///
/// Unresolved, then resolving, then resolved, then (possibly) failed. A
/// resolved id never changes and a failure is terminal.
pub struct IdentityMonotone;

impl IdentityMonotone {
    fn rank(identity: &Identity) -> u8 {
        match identity {
            Identity::Unresolved(_) => 0,
            Identity::Resolving(_) => 1,
            Identity::Resolved(_) => 2,
            Identity::Error(_) => 3,
        }
    }
}

impl Invariant for IdentityMonotone {
    fn name(&self) -> &'static str {
        "identity_monotone"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (prev, next) in state.transitions() {
            let moved_back = Self::rank(&next.identity) < Self::rank(&prev.identity);
            let changed_settled = match (&prev.identity, &next.identity) {
                (Identity::Resolved(a), Identity::Resolved(b)) => a != b,
                (Identity::Error(_), other) => *other != prev.identity,
                _ => false,
            };
            if moved_back || changed_settled {
                return violation(self.name(), format!("identity {:?} -> {:?}", prev.identity, next.identity));
            }
        }
        Ok(())
    }
}

/// The unread counter only drops by being cleared at the live end.
pub struct UnreadResetOnlyAtLiveEnd;

impl Invariant for UnreadResetOnlyAtLiveEnd {
    fn name(&self) -> &'static str {
        "unread_reset_only_at_live_end"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (prev, next) in state.transitions() {
            if next.unread_count < prev.unread_count && (next.unread_count != 0 || !next.at_live_end) {
                return violation(
                    self.name(),
                    format!(
                        "unread {} -> {} with at_live_end={}",
                        prev.unread_count, next.unread_count, next.at_live_end
                    ),
                );
            }
        }
        Ok(())
    }
}

/// Replacing the live timeline drops the scroll anchor.
pub struct LiveTimelineInvalidatesAnchor;

impl Invariant for LiveTimelineInvalidatesAnchor {
    fn name(&self) -> &'static str {
        "live_timeline_invalidates_anchor"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for (prev, next) in state.transitions() {
            let replaced = matches!((prev.live_timeline, next.live_timeline), (Some(a), Some(b)) if a != b);
            if replaced && next.scroll_anchor.is_some() {
                return violation(
                    self.name(),
                    format!("timeline {:?} -> {:?} kept anchor {:?}", prev.live_timeline, next.live_timeline, next.scroll_anchor),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use roomview_controller::{ControllerConfig, RoomController, ViewRequest};
    use roomview_core::{
        room::RoomHandle,
        scroll::ScrollAnchor,
        types::{EventId, RoomId, RoomTarget, TimelineId, UserId},
    };

    use super::*;
    use crate::SimEnv;

    fn me() -> UserId {
        UserId::from("@me:x")
    }

    fn base() -> RoomViewState {
        let request = ViewRequest::new(RoomTarget::parse("!r:x"), me());
        RoomController::new(SimEnv::default(), ControllerConfig::default(), request).snapshot().clone()
    }

    fn history(states: Vec<RoomViewState>) -> SystemSnapshot {
        SystemSnapshot { me: Some(me()), states, torn_down_at: None, peek_session_open: false }
    }

    #[test]
    fn mutation_after_teardown_is_caught() {
        let mut changed = base();
        changed.unread_count = 3;
        let mut snapshot = history(vec![base(), base(), changed]);
        snapshot.torn_down_at = Some(1);

        assert!(NoMutationAfterTeardown.check(&snapshot).is_err());

        snapshot.states.truncate(2);
        assert!(NoMutationAfterTeardown.check(&snapshot).is_ok());
    }

    #[test]
    fn peeking_joined_room_is_caught() {
        let room = RoomHandle::new(RoomId::from("!r:x"), Membership::Joined);
        let mut joined = base();
        joined.permissions = Permissions::compute(&room, &me());
        joined.room = Some(room);
        joined.membership = ViewMembership::Peeking;

        assert!(PeekJoinExclusive.check(&history(vec![joined.clone()])).is_err());

        joined.membership = ViewMembership::Joined;
        joined.peek_join = PeekJoinState::Joined;
        let mut snapshot = history(vec![joined]);
        assert!(PeekJoinExclusive.check(&snapshot).is_ok());

        snapshot.peek_session_open = true;
        assert!(PeekJoinExclusive.check(&snapshot).is_err());
    }

    #[test]
    fn partial_permissions_are_caught() {
        let mut state = base();
        let mut room = RoomHandle::new(RoomId::from("!r:x"), Membership::Joined);
        room.members.insert(me(), Membership::Joined);
        state.permissions = Permissions::compute(&room, &me());
        state.room = Some(room);
        assert!(PermissionsConsistent.check(&history(vec![state.clone()])).is_ok());

        state.permissions.can_react = false;
        assert!(PermissionsConsistent.check(&history(vec![state])).is_err());
    }

    #[test]
    fn search_over_call_is_caught() {
        let mut state = base();
        state.rendering = RenderingMode::Search;
        state.main_content = MainContent::Call;

        assert!(SearchRequiresTimeline.check(&history(vec![state])).is_err());
    }

    #[test]
    fn joining_phase_without_join_is_caught() {
        let mut state = base();
        state.load_phase = LoadPhase::Joining;
        assert!(LoadPhaseConsistent.check(&history(vec![state.clone()])).is_err());

        state.peek_join = PeekJoinState::Joining;
        assert!(LoadPhaseConsistent.check(&history(vec![state])).is_ok());
    }

    #[test]
    fn identity_regression_is_caught() {
        let mut resolved = base();
        resolved.identity = Identity::Resolved(RoomId::from("!r:x"));
        let mut other = base();
        other.identity = Identity::Resolved(RoomId::from("!other:x"));

        assert!(IdentityMonotone.check(&history(vec![base(), resolved.clone()])).is_ok());
        assert!(IdentityMonotone.check(&history(vec![resolved.clone(), base()])).is_err());
        assert!(IdentityMonotone.check(&history(vec![resolved, other])).is_err());
    }

    #[test]
    fn unread_drop_off_live_end_is_caught() {
        let mut unread = base();
        unread.unread_count = 2;
        let mut cleared = base();
        cleared.unread_count = 0;

        assert!(UnreadResetOnlyAtLiveEnd.check(&history(vec![unread.clone(), cleared.clone()])).is_err());

        cleared.at_live_end = true;
        assert!(UnreadResetOnlyAtLiveEnd.check(&history(vec![unread, cleared])).is_ok());
    }

    #[test]
    fn kept_anchor_across_reset_is_caught() {
        let mut before = base();
        before.live_timeline = Some(TimelineId(1));
        before.scroll_anchor = Some(ScrollAnchor::Event { event_id: EventId::from("$e"), pixel_offset: 4 });
        let mut after = before.clone();
        after.live_timeline = Some(TimelineId(2));

        assert!(LiveTimelineInvalidatesAnchor.check(&history(vec![before.clone(), after.clone()])).is_err());

        after.scroll_anchor = None;
        assert!(LiveTimelineInvalidatesAnchor.check(&history(vec![before, after])).is_ok());
    }
}
