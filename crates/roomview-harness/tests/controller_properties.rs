//! Property tests for the room session controller.
//!
//! Random operation sequences are applied to views of differently shaped
//! rooms; every invariant is checked after every step.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: (RoomShape, Vec<Operation>)
//!                          │
//!                          ▼
//!                  ControllerHarness ──> SystemSnapshot ──> InvariantRegistry
//! ```

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use roomview_controller::{ControllerEvent, ViewRequest};
use roomview_core::{
    event::{TimelineDelivery, TimelineEvent},
    identity::Identity,
    room::{HistoryVisibility, Membership, RoomHandle},
    search::SearchScope,
    types::{EventId, RoomId, RoomTarget, UserId},
};
use roomview_harness::{
    Body, Completion, ControllerHarness, InvariantRegistry, Operation, PendingOp, Sender, SimWorld, SystemSnapshot,
    joined_room,
};

fn me() -> UserId {
    UserId::from("@me:sim")
}

/// Starting situation of a view.
#[derive(Debug, Clone, Copy)]
enum RoomShape {
    Joined,
    EncryptedJoined,
    Invited,
    Peekable,
    ViaAlias,
    NotReady,
}

fn shape_strategy() -> impl Strategy<Value = RoomShape> {
    prop_oneof![
        Just(RoomShape::Joined),
        Just(RoomShape::EncryptedJoined),
        Just(RoomShape::Invited),
        Just(RoomShape::Peekable),
        Just(RoomShape::ViaAlias),
        Just(RoomShape::NotReady),
    ]
}

fn harness(shape: RoomShape) -> ControllerHarness {
    let room_id = "!r:sim";
    let mut request = ViewRequest::new(RoomTarget::parse(room_id), me());
    let world = SimWorld::new(me());

    let world = match shape {
        RoomShape::Joined => world.with_room(joined_room(room_id, &me())),
        RoomShape::EncryptedJoined => {
            let mut room = joined_room(room_id, &me());
            room.encrypted = true;
            world.with_room(room)
        },
        RoomShape::Invited => {
            let mut room = RoomHandle::new(RoomId::from(room_id), Membership::Invited);
            room.members.insert(me(), Membership::Invited);
            room.inviter = Some(UserId::from("@alice:sim"));
            world.with_room(room)
        },
        RoomShape::Peekable | RoomShape::NotReady => {
            let mut room = RoomHandle::new(RoomId::from(room_id), Membership::None);
            room.history_visibility = HistoryVisibility::WorldReadable;
            request.world_readable_hint = true;
            request.client_ready = !matches!(shape, RoomShape::NotReady);
            world.with_remote_room(room)
        },
        RoomShape::ViaAlias => {
            request = ViewRequest::new(RoomTarget::parse("#lobby:sim"), me());
            world.with_alias("#lobby:sim", room_id).with_room(joined_room(room_id, &me()))
        },
    };

    let mut harness = ControllerHarness::new(world, request);
    harness.start();
    harness
}

fn sender_strategy() -> impl Strategy<Value = Sender> {
    prop_oneof![Just(Sender::Me), Just(Sender::Alice), Just(Sender::Bob)]
}

fn body_strategy() -> impl Strategy<Value = Body> {
    prop_oneof![Just(Body::Plain), Just(Body::Confetti), Just(Body::Snow)]
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        4 => (sender_strategy(), body_strategy()).prop_map(|(sender, body)| Operation::LiveMessage { sender, body }),
        1 => body_strategy().prop_map(|body| Operation::PaginatedMessage { body }),
        3 => any::<bool>().prop_map(|at_live_end| Operation::Scroll { at_live_end }),
        1 => (0u8..4).prop_map(|generation| Operation::TimelineReset { generation }),
        2 => Just(Operation::Join),
        1 => any::<bool>().prop_map(|ignore_inviter| Operation::RejectInvite { ignore_inviter }),
        2 => Just(Operation::MembersChanged),
        1 => Just(Operation::ClientReady),
        2 => any::<bool>().prop_map(|all_rooms| Operation::Search { all_rooms }),
        1 => Just(Operation::CancelSearch),
        1 => Just(Operation::ToggleSearch),
        1 => any::<bool>().prop_map(|maximised| Operation::MaximiseWidget { maximised }),
        1 => any::<bool>().prop_map(|active| Operation::ActiveCall { active }),
        1 => any::<bool>().prop_map(|viewing| Operation::ViewCall { viewing }),
        1 => Just(Operation::JumpToLive),
        1 => any::<u8>().prop_map(|event| Operation::JumpToEvent { event }),
        1 => Just(Operation::DeviceVerified),
        1 => any::<bool>().prop_map(|enabled| Operation::UrlPreviews { enabled }),
        1 => any::<bool>().prop_map(|unread| Operation::NotificationState { unread }),
        4 => Just(Operation::Complete(Completion::Oldest)),
        2 => Just(Operation::Complete(Completion::Newest)),
        1 => Just(Operation::Settle),
        1 => (0u16..2000).prop_map(|millis| Operation::AdvanceTime { millis }),
        1 => Just(Operation::Teardown),
    ]
}

fn live_message(index: usize, sender: &str) -> ControllerEvent<roomview_harness::SimInstant> {
    ControllerEvent::Timeline {
        event: TimelineEvent::text(
            EventId::new(format!("$p{index}")),
            RoomId::from("!r:sim"),
            UserId::from(sender),
            "hi",
        ),
        delivery: TimelineDelivery::live(),
    }
}

proptest! {
    /// Invariants hold after every step of arbitrary operation sequences.
    #[test]
    fn prop_invariants_hold(
        shape in shape_strategy(),
        ops in prop::collection::vec(operation_strategy(), 0..60),
    ) {
        let mut harness = harness(shape);
        let invariants = InvariantRegistry::standard();

        for op in &ops {
            harness.apply(op);
            let result = invariants.check_all(harness.history());
            prop_assert!(result.is_ok(), "Invariant violated after {:?}: {:?}", op, result);
        }

        harness.teardown();
        prop_assert!(invariants.check_all(harness.history()).is_ok());
    }

    /// Nothing changes after teardown, whatever arrives.
    #[test]
    fn prop_teardown_is_final(
        shape in shape_strategy(),
        before in prop::collection::vec(operation_strategy(), 0..30),
        after in prop::collection::vec(operation_strategy(), 0..30),
    ) {
        let mut harness = harness(shape);
        for op in &before {
            harness.apply(op);
        }
        harness.teardown();
        let frozen = harness.state().clone();

        for op in &after {
            harness.apply(op);
        }
        prop_assert_eq!(harness.state(), &frozen);
        prop_assert!(harness.pending().next().is_none());
    }

    /// Away from the live end, every live event from someone else counts once.
    #[test]
    fn prop_unread_counts_other_senders(senders in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut harness = harness(RoomShape::Joined);
        harness.deliver(ControllerEvent::Scrolled { at_live_end: false, anchor: None }).unwrap();

        for (index, from_alice) in senders.iter().enumerate() {
            let sender = if *from_alice { "@alice:sim" } else { "@me:sim" };
            harness.deliver(live_message(index, sender)).unwrap();
        }

        let expected = senders.iter().filter(|from_alice| **from_alice).count() as u64;
        prop_assert_eq!(harness.state().unread_count, expected);

        harness.deliver(ControllerEvent::Scrolled { at_live_end: true, anchor: None }).unwrap();
        prop_assert_eq!(harness.state().unread_count, 0);
    }

    /// Only the newest search session survives, whatever order results arrive in.
    #[test]
    fn prop_newest_search_wins(terms in prop::collection::vec("[a-z]{1,6}", 1..6), reverse in any::<bool>()) {
        let mut harness = harness(RoomShape::Joined);
        harness.settle();

        for term in &terms {
            harness
                .deliver(ControllerEvent::SearchRequested { term: term.clone(), scope: SearchScope::Room })
                .unwrap();
        }

        let live: Vec<_> = harness
            .pending()
            .filter_map(|op| match op {
                PendingOp::Search(request) => Some(!request.cancel.is_cancelled()),
                _ => None,
            })
            .collect();
        prop_assert_eq!(live.iter().filter(|live| **live).count(), 1);
        prop_assert_eq!(live.last(), Some(&true));

        while if reverse { harness.complete_last() } else { harness.complete_next() } {}

        let search = harness.state().search.clone();
        prop_assert_eq!(search.as_ref().map(|search| search.term.as_str()), terms.last().map(String::as_str));
        prop_assert_eq!(search.and_then(|search| search.result_count), Some(0));
    }
}

#[test]
fn identity_regression_is_detected() {
    let mut harness = harness(RoomShape::Joined);
    let resolved = harness.state().clone();
    let mut regressed = resolved.clone();
    regressed.identity = Identity::Unresolved(RoomTarget::parse("!r:sim"));

    let mut snapshot = SystemSnapshot::for_user(me());
    snapshot.record(resolved);
    snapshot.record(regressed);

    let violations = InvariantRegistry::standard().check_all(&snapshot).unwrap_err();
    assert!(violations.iter().any(|v| v.invariant == "identity_monotone"));
    harness.teardown();
}

#[test]
fn open_peek_session_after_join_is_detected() {
    let harness = harness(RoomShape::Joined);
    let mut snapshot = harness.history().clone();
    snapshot.peek_session_open = true;

    let violations = InvariantRegistry::standard().check_all(&snapshot).unwrap_err();
    assert!(violations.iter().any(|v| v.invariant == "peek_join_exclusive"));
}
