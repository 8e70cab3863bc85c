//! Scripted room view sessions.
//!
//! Each scenario builds a simulated world, runs the real runtime over a
//! [`SimDriver`] and plays user intents against it, waiting for the published
//! snapshot to reach each expected state before the next step.

use std::time::Duration;

use clap::ValueEnum;
use roomview_app::{Runtime, RuntimeConfig, RuntimeError, RuntimeHandle};
use roomview_controller::{ControllerEvent, LoadPhase, RoomViewState, ViewMembership, ViewRequest};
use roomview_core::{
    event::{TimelineDelivery, TimelineEvent},
    room::{HistoryVisibility, Membership, RoomHandle},
    search::SearchScope,
    types::{EventId, RoomId, RoomTarget, UserId},
};
use roomview_harness::{Body, SimDriver, SimEnv, SimInstant, SimWorld, joined_room};
use thiserror::Error;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{info, warn};

/// Longest wait for any single step.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Room an alias target resolves to.
const RESOLVED_ROOM: &str = "!resolved:sim";

const LOCAL_USER: &str = "@sim-user:sim";
const OTHER_USER: &str = "@alice:sim";

/// Scripted session to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Accept a pending invite
    InviteJoin,
    /// Peek a world-readable room, then join it
    PeekJoin,
    /// Reject a pending invite and ignore the inviter
    RejectInvite,
    /// Receive messages away from the live end, some carrying effects
    Effects,
    /// Search the room
    Search,
}

/// Scenario failures.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// A step did not complete in time.
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The runtime stopped before a step completed.
    #[error("runtime stopped before {0}")]
    Stopped(&'static str),

    /// The runtime failed.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// The runtime task panicked or was cancelled.
    #[error("runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs `scenario` against `target` and returns the final snapshot.
pub async fn run(scenario: Scenario, target: &str, seed: u64) -> Result<RoomViewState, ScenarioError> {
    let me = UserId::from(LOCAL_USER);
    let target = RoomTarget::parse(target);
    let room_id = match &target {
        RoomTarget::Id(room_id) => room_id.clone(),
        RoomTarget::Alias(_) => RoomId::from(RESOLVED_ROOM),
    };

    let mut world = SimWorld::new(me.clone());
    if let RoomTarget::Alias(alias) = &target {
        world = world.with_alias(alias.as_str(), room_id.as_str());
    }

    let mut request = ViewRequest::new(target, me.clone());
    let world = match scenario {
        Scenario::InviteJoin | Scenario::RejectInvite => world.with_room(invited_room(&room_id, &me)),
        Scenario::PeekJoin => {
            request.world_readable_hint = true;
            world.with_remote_room(public_room(&room_id))
        },
        Scenario::Effects | Scenario::Search => world.with_room(joined_room(room_id.as_str(), &me)).with_search(Ok(3)),
    };

    info!(?scenario, room_id = %room_id, seed, "session starting");
    let session = Session::start(SimDriver::new(world), SimEnv::with_seed(seed), request);
    let scripted = script(scenario, &session, &room_id).await;
    let last = session.finish().await?;
    scripted.map(|()| last)
}

async fn script(scenario: Scenario, session: &Session, room_id: &RoomId) -> Result<(), ScenarioError> {
    match scenario {
        Scenario::InviteJoin => {
            session.wait("invite", |s| s.membership == ViewMembership::Invited && s.load_phase == LoadPhase::Ready).await?;
            session.send("join request", ControllerEvent::JoinRequested)?;
            session.wait("join", |s| s.membership == ViewMembership::Joined).await?;
        },
        Scenario::PeekJoin => {
            session.wait("peek", |s| s.membership == ViewMembership::Peeking).await?;
            session.send("join request", ControllerEvent::JoinRequested)?;
            session.wait("join", |s| s.membership == ViewMembership::Joined).await?;
        },
        Scenario::RejectInvite => {
            session.wait("invite", |s| s.membership == ViewMembership::Invited && s.load_phase == LoadPhase::Ready).await?;
            session.send("reject request", ControllerEvent::RejectRequested { ignore_inviter: true })?;
            session.wait("rejection", |s| s.membership == ViewMembership::Left && s.load_phase == LoadPhase::Ready).await?;
        },
        Scenario::Effects => {
            session.wait("room", |s| s.room.is_some() && s.load_phase == LoadPhase::Ready).await?;
            session.send("notification state", ControllerEvent::NotificationStateChanged {
                room_id: room_id.clone(),
                unread: true,
            })?;
            session.send("scroll", ControllerEvent::Scrolled { at_live_end: false, anchor: None })?;

            let bodies = [Body::Plain, Body::Confetti, Body::Snow];
            for (index, body) in bodies.into_iter().enumerate() {
                let event = TimelineEvent::text(
                    EventId::new(format!("$sim{index}")),
                    room_id.clone(),
                    UserId::from(OTHER_USER),
                    body.text(),
                );
                if !session.driver.deliver(room_id, ControllerEvent::Timeline { event, delivery: TimelineDelivery::live() }) {
                    return Err(ScenarioError::Stopped("timeline delivery"));
                }
            }
            session.wait("unread messages", |s| s.unread_count == bodies.len() as u64).await?;

            session.send("scroll", ControllerEvent::Scrolled { at_live_end: true, anchor: None })?;
            session.wait("read", |s| s.unread_count == 0).await?;
        },
        Scenario::Search => {
            session.wait("room", |s| s.room.is_some() && s.load_phase == LoadPhase::Ready).await?;
            session.send("search", ControllerEvent::SearchRequested {
                term: "lunch".to_owned(),
                scope: SearchScope::Room,
            })?;
            session
                .wait("search results", |s| s.search.as_ref().is_some_and(|search| search.result_count.is_some()))
                .await?;
        },
    }
    Ok(())
}

/// One running view and its log observers.
struct Session {
    driver: SimDriver,
    handle: RuntimeHandle<SimInstant>,
    runtime: JoinHandle<Result<(), RuntimeError>>,
    observers: Vec<JoinHandle<()>>,
}

impl Session {
    fn start(driver: SimDriver, env: SimEnv, request: ViewRequest) -> Self {
        let (runtime, handle) = Runtime::new(driver.clone(), env, RuntimeConfig::default(), request);

        let mut snapshots = handle.watch();
        let snapshot_log = tokio::spawn(async move {
            while snapshots.changed().await.is_ok() {
                let state = snapshots.borrow_and_update().clone();
                info!(
                    membership = ?state.membership,
                    load_phase = ?state.load_phase,
                    view_mode = ?state.view_mode,
                    unread = state.unread_count,
                    trust = ?state.trust_status,
                    "snapshot"
                );
            }
        });

        let mut signals = handle.signals();
        let signal_log = tokio::spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(signal) => info!(?signal, "signal"),
                    Err(RecvError::Lagged(skipped)) => warn!(skipped, "signal log lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { driver, handle, runtime: tokio::spawn(runtime.run()), observers: vec![snapshot_log, signal_log] }
    }

    fn send(&self, what: &'static str, event: ControllerEvent<SimInstant>) -> Result<(), ScenarioError> {
        if self.handle.send(event) { Ok(()) } else { Err(ScenarioError::Stopped(what)) }
    }

    async fn wait(
        &self,
        what: &'static str,
        pred: impl FnMut(&RoomViewState) -> bool,
    ) -> Result<RoomViewState, ScenarioError> {
        let mut snapshots = self.handle.watch();
        let state = tokio::time::timeout(STEP_TIMEOUT, snapshots.wait_for(pred))
            .await
            .map_err(|_| ScenarioError::Timeout(what))?
            .map_err(|_| ScenarioError::Stopped(what))?
            .clone();
        info!(step = what, "reached");
        Ok(state)
    }

    /// Tears the view down and returns its last snapshot.
    async fn finish(self) -> Result<RoomViewState, ScenarioError> {
        self.handle.shutdown();
        self.runtime.await??;

        let last = self.handle.snapshot();
        drop(self.handle);
        for observer in self.observers {
            observer.await?;
        }
        info!(calls = self.driver.calls().len(), "session finished");
        Ok(last)
    }
}

fn invited_room(room_id: &RoomId, me: &UserId) -> RoomHandle {
    let mut room = RoomHandle::new(room_id.clone(), Membership::Invited);
    room.members.insert(me.clone(), Membership::Invited);
    room.members.insert(UserId::from(OTHER_USER), Membership::Joined);
    room.inviter = Some(UserId::from(OTHER_USER));
    room
}

fn public_room(room_id: &RoomId) -> RoomHandle {
    let mut room = RoomHandle::new(room_id.clone(), Membership::None);
    room.history_visibility = HistoryVisibility::WorldReadable;
    room.members.insert(UserId::from(OTHER_USER), Membership::Joined);
    room
}
