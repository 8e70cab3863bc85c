//! Room view runtime.
//!
//! The runtime is the single owner of a [`RoomController`]. Sync
//! notifications, user intents, settings updates and async completions all
//! arrive on one inbound channel and are applied strictly one at a time;
//! snapshots go out on a `watch` channel and signals on a `broadcast`
//! channel.
//!
//! Every async operation runs on a background task holding a child of the
//! runtime's work token. Teardown closes the controller's gate first, then
//! cancels the work token, then releases subscriptions.

use std::future::Future;

use roomview_controller::{ControllerAction, ControllerEvent, RoomController, RoomViewState, Signal, ViewRequest};
use roomview_core::{env::Environment, error::SearchError};
use tokio::{
    sync::{broadcast, mpsc, watch},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Driver, EventSink, RuntimeConfig, RuntimeError};

/// Handle for consumers of a running room view.
#[derive(Debug, Clone)]
pub struct RuntimeHandle<I> {
    events: EventSink<I>,
    snapshots: watch::Receiver<RoomViewState>,
    signals: broadcast::Sender<Signal>,
    shutdown: CancellationToken,
}

impl<I> RuntimeHandle<I> {
    /// Delivers a user intent or external notification.
    ///
    /// Returns false once the runtime has stopped.
    pub fn send(&self, event: ControllerEvent<I>) -> bool {
        self.events.send(event)
    }

    /// Sink for collaborators that push events.
    pub fn sink(&self) -> EventSink<I>
    where
        I: Clone,
    {
        self.events.clone()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RoomViewState {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn watch(&self) -> watch::Receiver<RoomViewState> {
        self.snapshots.clone()
    }

    /// New receiver for signals sent from now on.
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.signals.subscribe()
    }

    /// Requests teardown. The runtime finishes the current event first.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether teardown was requested.
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

/// Runtime owning one room view.
///
/// # Type Parameters
///
/// - `D`: Collaborator driver
/// - `E`: Environment (clocks, randomness)
pub struct Runtime<D, E>
where
    D: Driver,
    E: Environment,
{
    driver: D,
    env: E,
    config: RuntimeConfig,
    controller: RoomController<E>,
    inbound_tx: mpsc::UnboundedSender<ControllerEvent<E::Instant>>,
    inbound_rx: mpsc::UnboundedReceiver<ControllerEvent<E::Instant>>,
    snapshots: watch::Sender<RoomViewState>,
    signals: broadcast::Sender<Signal>,
    shutdown: CancellationToken,
    work: CancellationToken,
}

impl<D, E> Runtime<D, E>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
{
    /// Creates a runtime and the handle consumers use to talk to it.
    pub fn new(driver: D, env: E, config: RuntimeConfig, request: ViewRequest) -> (Self, RuntimeHandle<E::Instant>) {
        let controller = RoomController::new(env.clone(), config.controller.clone(), request);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (snapshots, snapshot_rx) = watch::channel(controller.snapshot().clone());
        let (signals, _) = broadcast::channel(config.signal_capacity.max(1));
        let shutdown = CancellationToken::new();

        let handle = RuntimeHandle {
            events: EventSink::new(inbound_tx.clone()),
            snapshots: snapshot_rx,
            signals: signals.clone(),
            shutdown: shutdown.clone(),
        };

        let runtime = Self {
            driver,
            env,
            config,
            controller,
            inbound_tx,
            inbound_rx,
            snapshots,
            signals,
            shutdown,
            work: CancellationToken::new(),
        };
        (runtime, handle)
    }

    /// Runs the view until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the event source refuses the room subscription.
    /// The view is torn down before the error is returned.
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        let actions = self.controller.start();
        let result = self.run_loop(actions).await;
        self.teardown();
        result
    }

    async fn run_loop(&mut self, initial: Vec<ControllerAction>) -> Result<(), RuntimeError> {
        self.execute(initial)?;

        let mut tick_interval = tokio::time::interval(self.config.tick_interval);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => return Ok(()),

                Some(event) = self.inbound_rx.recv() => self.apply(event)?,

                _ = tick_interval.tick() => {
                    let now = self.env.now();
                    self.apply(ControllerEvent::Tick { now })?;
                }
            }
        }
    }

    fn apply(&mut self, event: ControllerEvent<E::Instant>) -> Result<(), RuntimeError> {
        match self.controller.handle(event) {
            Ok(actions) => self.execute(actions),
            Err(err) => {
                warn!(%err, "event rejected");
                Ok(())
            },
        }
    }

    fn teardown(&mut self) {
        let actions = self.controller.teardown();
        self.work.cancel();
        if let Err(err) = self.execute(actions) {
            warn!(%err, "cleanup failed");
        }
        info!("runtime stopped");
    }

    fn sink(&self) -> EventSink<E::Instant> {
        EventSink::new(self.inbound_tx.clone())
    }

    /// Executes controller actions in order.
    fn execute(&mut self, actions: Vec<ControllerAction>) -> Result<(), RuntimeError> {
        for action in actions {
            match action {
                ControllerAction::Publish => {
                    self.snapshots.send_replace(self.controller.snapshot().clone());
                },
                ControllerAction::Signal(signal) => {
                    if self.signals.send(signal).is_err() {
                        debug!("signal dropped; no receivers");
                    }
                },

                ControllerAction::LookupRoom { room_id } => {
                    let room = self.driver.lookup_room(&room_id);
                    self.enqueue(ControllerEvent::RoomLookup { room_id, room });
                },
                ControllerAction::LoadScrollState { room_id } => {
                    let state = self.driver.scroll_state(&room_id);
                    self.enqueue(ControllerEvent::ScrollStateLoaded { room_id, state });
                },
                ControllerAction::Subscribe { room_id } => {
                    self.driver
                        .subscribe(&room_id, self.sink())
                        .map_err(|e| RuntimeError::Subscribe { room_id, reason: e.to_string() })?;
                },
                ControllerAction::Unsubscribe { room_id } => self.driver.unsubscribe(&room_id),
                ControllerAction::WatchSettings { room_id, keys } => {
                    self.driver.watch_settings(room_id.as_ref(), &keys, self.sink());
                },
                ControllerAction::UnwatchSettings => self.driver.unwatch_settings(),
                ControllerAction::StopPeek => self.driver.stop_peek(),
                ControllerAction::PersistScroll { room_id, state } => self.driver.set_scroll_state(&room_id, state),
                ControllerAction::StartPermalinks { room_id } => self.driver.start_permalinks(&room_id),
                ControllerAction::LoadPermalinks { room_id } => self.driver.load_permalinks(&room_id),
                ControllerAction::StopPermalinks { room_id } => self.driver.stop_permalinks(&room_id),
                ControllerAction::CreateFromLocalRoom { room_id } => self.driver.create_from_local_room(&room_id),
                ControllerAction::RemoveLocalRoom { room_id } => self.driver.remove_local_room(&room_id),

                ControllerAction::ResolveAlias { alias } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.resolve_alias(alias.clone()).await;
                        Some(ControllerEvent::AliasResolved { alias, result })
                    });
                },
                ControllerAction::Peek { room_id } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.peek(room_id.clone()).await;
                        Some(ControllerEvent::PeekCompleted { room_id, result })
                    });
                },
                ControllerAction::Join { room_id, options } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let error = driver.join(room_id.clone(), options).await.err()?;
                        Some(ControllerEvent::JoinFailed { room_id, error })
                    });
                },
                ControllerAction::Leave { room_id, ignore } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.leave(room_id.clone(), ignore).await;
                        Some(ControllerEvent::RejectCompleted { room_id, result })
                    });
                },
                ControllerAction::ComputeShield { generation, room } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.compute_shield(room).await;
                        Some(ControllerEvent::ShieldComputed { generation, result })
                    });
                },
                ControllerAction::LoadMembers { room_id } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.load_members(room_id.clone()).await;
                        Some(ControllerEvent::MembersLoaded { room_id, result })
                    });
                },
                ControllerAction::FetchEvent { room_id, event_id } => {
                    let driver = self.driver.clone();
                    self.spawn(async move {
                        let result = driver.fetch_event(room_id, event_id.clone()).await;
                        Some(ControllerEvent::EventFetched { event_id, result })
                    });
                },
                ControllerAction::Search(request) => {
                    let driver = self.driver.clone();
                    let id = request.id;
                    let cancel = request.cancel.clone();
                    self.spawn(async move {
                        let result = tokio::select! {
                            () = cancel.cancelled() => Err(SearchError::Cancelled),
                            result = driver.search(request) => result,
                        };
                        Some(match result {
                            Ok(result_count) => ControllerEvent::SearchProgress { id, result_count, in_progress: false },
                            Err(error) => ControllerEvent::SearchFailed { id, error },
                        })
                    });
                },
            }
        }
        Ok(())
    }

    /// Re-enters the inbound channel behind anything already queued.
    fn enqueue(&self, event: ControllerEvent<E::Instant>) {
        if self.inbound_tx.send(event).is_err() {
            debug!("inbound channel closed");
        }
    }

    /// Runs a completion in the background. Its event is dropped if the view
    /// is torn down before it finishes.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Option<ControllerEvent<E::Instant>>> + Send + 'static,
    {
        let token = self.work.child_token();
        let tx = self.inbound_tx.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                () = token.cancelled() => return,
                event = task => event,
            };
            if let Some(event) = event
                && !token.is_cancelled()
                && tx.send(event).is_err()
            {
                debug!("completion dropped; runtime stopped");
            }
        });
    }
}
