//! Fuzz target for the room session controller
//!
//! Feeds arbitrary interleavings of notifications, user intents and async
//! completions into one view and checks every invariant after each step.
//!
//! # Strategy
//!
//! - Starting rooms: joined, encrypted, invited, world-readable (peekable),
//!   alias target, client not yet ready
//! - Completions: oldest or newest in-flight operation finishes next, so
//!   results arrive in any order relative to later intents
//! - Teardown mid-sequence, followed by more input
//!
//! # Invariants
//!
//! - Identity never moves back to unresolved
//! - Peek session never open while joined
//! - Permissions always match the adopted room
//! - Search only shown over the timeline
//! - Unread counter only cleared at the live end
//! - Nothing published after teardown

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use roomview_controller::ViewRequest;
use roomview_core::{
    room::{HistoryVisibility, Membership, RoomHandle},
    types::{RoomId, RoomTarget, UserId},
};
use roomview_harness::{ControllerHarness, InvariantRegistry, Operation, SimWorld, joined_room};

const ROOM: &str = "!fuzz:sim";

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Start {
    Joined,
    Encrypted,
    Invited,
    Peekable { ready: bool },
    Alias,
}

#[derive(Debug, Arbitrary)]
struct Input {
    start: Start,
    ops: Vec<Operation>,
}

fn harness(start: Start) -> ControllerHarness {
    let me = UserId::from("@me:sim");
    let world = SimWorld::new(me.clone());
    let mut request = ViewRequest::new(RoomTarget::parse(ROOM), me.clone());

    let world = match start {
        Start::Joined => world.with_room(joined_room(ROOM, &me)),
        Start::Encrypted => {
            let mut room = joined_room(ROOM, &me);
            room.encrypted = true;
            world.with_room(room)
        }
        Start::Invited => {
            let mut room = RoomHandle::new(RoomId::from(ROOM), Membership::Invited);
            room.members.insert(me.clone(), Membership::Invited);
            room.inviter = Some(UserId::from("@alice:sim"));
            world.with_room(room)
        }
        Start::Peekable { ready } => {
            let mut room = RoomHandle::new(RoomId::from(ROOM), Membership::None);
            room.history_visibility = HistoryVisibility::WorldReadable;
            request.world_readable_hint = true;
            request.client_ready = ready;
            world.with_remote_room(room)
        }
        Start::Alias => {
            request = ViewRequest::new(RoomTarget::parse("#fuzz:sim"), me.clone());
            world.with_alias("#fuzz:sim", ROOM).with_room(joined_room(ROOM, &me))
        }
    };

    let mut harness = ControllerHarness::new(world, request);
    harness.start();
    harness
}

fuzz_target!(|input: Input| {
    let mut harness = harness(input.start);
    let invariants = InvariantRegistry::standard();

    for op in &input.ops {
        harness.apply(op);
        invariants.assert_all(harness.history(), &format!("after {op:?}"));
    }

    harness.settle();
    invariants.assert_all(harness.history(), "after settle");

    harness.teardown();
    invariants.assert_all(harness.history(), "after teardown");
});
