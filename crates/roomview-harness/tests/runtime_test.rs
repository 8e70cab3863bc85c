//! End-to-end tests running the async runtime against the simulated driver.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use roomview_app::{Runtime, RuntimeConfig, RuntimeError, RuntimeHandle};
use roomview_controller::{ControllerEvent, LoadPhase, RoomViewState, Signal, ViewMembership, ViewRequest};
use roomview_core::{
    effects::ChatEffect,
    event::{TimelineDelivery, TimelineEvent},
    room::{HistoryVisibility, Membership, RoomHandle},
    types::{EventId, RoomId, RoomTarget, UserId},
};
use roomview_harness::{DriverCall, Gate, SimDriver, SimEnv, SimInstant, SimWorld, joined_room};
use tokio::task::JoinHandle;

const ROOM: &str = "!r:sim";

fn me() -> UserId {
    UserId::from("@me:sim")
}

fn launch(driver: &SimDriver, request: ViewRequest) -> (JoinHandle<Result<(), RuntimeError>>, RuntimeHandle<SimInstant>) {
    let (runtime, handle) = Runtime::new(driver.clone(), SimEnv::with_seed(7), RuntimeConfig::default(), request);
    (tokio::spawn(runtime.run()), handle)
}

async fn wait_for(handle: &RuntimeHandle<SimInstant>, pred: impl FnMut(&RoomViewState) -> bool) -> RoomViewState {
    let mut rx = handle.watch();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred)).await.unwrap().unwrap();
    state.clone()
}

#[tokio::test(start_paused = true)]
async fn invite_then_join_through_driver() {
    let mut room = RoomHandle::new(RoomId::from(ROOM), Membership::Invited);
    room.members.insert(me(), Membership::Invited);
    room.inviter = Some(UserId::from("@alice:sim"));
    let driver = SimDriver::new(SimWorld::new(me()).with_room(room));

    let (task, handle) = launch(&driver, ViewRequest::new(RoomTarget::parse(ROOM), me()));
    wait_for(&handle, |s| s.membership == ViewMembership::Invited && s.load_phase == LoadPhase::Ready).await;

    assert!(handle.send(ControllerEvent::JoinRequested));
    let joined = wait_for(&handle, |s| s.membership == ViewMembership::Joined).await;
    assert!(joined.join_error.is_none());
    assert!(joined.room.as_ref().is_some_and(RoomHandle::is_joined));

    handle.shutdown();
    task.await.unwrap().unwrap();

    assert!(driver.called(|call| matches!(call, DriverCall::Join(..))));
    assert!(driver.called(|call| matches!(call, DriverCall::Unsubscribe(_))));
    assert!(!driver.is_subscribed(&RoomId::from(ROOM)));
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_peek_discards_result() {
    let mut room = RoomHandle::new(RoomId::from(ROOM), Membership::None);
    room.history_visibility = HistoryVisibility::WorldReadable;
    let driver = SimDriver::new(SimWorld::new(me()).with_remote_room(room));
    driver.hold(Gate::Peek);

    let mut request = ViewRequest::new(RoomTarget::parse(ROOM), me());
    request.world_readable_hint = true;
    let (task, handle) = launch(&driver, request);

    let loading = wait_for(&handle, |s| s.load_phase == LoadPhase::PeekLoading).await;
    handle.shutdown();
    task.await.unwrap().unwrap();

    driver.release(Gate::Peek);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(handle.snapshot(), loading);
    assert!(!handle.send(ControllerEvent::ClientReady));
    assert!(driver.called(|call| matches!(call, DriverCall::StopPeek)));
    assert!(driver.called(|call| matches!(call, DriverCall::Unsubscribe(_))));
}

#[tokio::test(start_paused = true)]
async fn refused_subscription_stops_runtime() {
    let driver = SimDriver::new(SimWorld::new(me()).with_room(joined_room(ROOM, &me())));
    driver.refuse_subscriptions();

    let (task, _handle) = launch(&driver, ViewRequest::new(RoomTarget::parse(ROOM), me()));
    let result = tokio::time::timeout(Duration::from_secs(5), task).await.unwrap().unwrap();

    assert!(matches!(result, Err(RuntimeError::Subscribe { .. })), "unexpected result: {result:?}");
    assert!(driver.called(|call| matches!(call, DriverCall::UnwatchSettings)));
}

#[tokio::test(start_paused = true)]
async fn live_effect_reaches_signal_receivers() {
    let driver = SimDriver::new(SimWorld::new(me()).with_room(joined_room(ROOM, &me())));
    let (task, handle) = launch(&driver, ViewRequest::new(RoomTarget::parse(ROOM), me()));
    let mut signals = handle.signals();
    wait_for(&handle, |s| s.load_phase == LoadPhase::Ready && s.room.is_some()).await;

    assert!(handle.send(ControllerEvent::NotificationStateChanged { room_id: RoomId::from(ROOM), unread: true }));
    let party = TimelineEvent::text(EventId::from("$party"), RoomId::from(ROOM), UserId::from("@alice:sim"), "🎉");
    assert!(driver.deliver(&RoomId::from(ROOM), ControllerEvent::Timeline {
        event: party,
        delivery: TimelineDelivery::live(),
    }));

    let effect = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Signal::Effect { effect } = signals.recv().await.unwrap() {
                return effect;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(effect, ChatEffect::Confetti);

    handle.shutdown();
    task.await.unwrap().unwrap();
}
