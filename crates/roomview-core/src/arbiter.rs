//! Peek/join arbitration.
//!
//! Decides whether the view silently peeks into a room, waits for an explicit
//! join, or shows the join/invite prompt. Owns the lifecycle of the peek
//! session: a peek is only ever attempted while no local room object exists,
//! and is stopped as soon as an authoritative room view takes over.
//!
//! # State Machine
//!
//! ```text
//!              setup(no room, should_peek)
//! ┌──────────┐ ─────────────────────────> ┌─────────────┐  ok   ┌─────────┐
//! │ NoAction │                            │ PeekPending │ ────> │ Peeking │
//! └──────────┘                            └─────────────┘       └─────────┘
//!      │                                 forbidden │                 │
//!      │ join                                      ↓                 │ join
//!      │                                   ┌────────────┐            │
//!      │                                   │ PeekFailed │            │
//!      ↓                                   └────────────┘            │
//! ┌─────────┐ <──────────────────────────────────────────────────────┘
//! │ Joining │  membership=joined   ┌────────┐
//! └─────────┘ ───────────────────> │ Joined │
//!   │     ^                        └────────┘
//!   │     │ retry
//!   ↓     │
//! ┌────────────┐
//! │ JoinFailed │
//! └────────────┘
//! ```
//!
//! Peeking and joined are one enum, so the view can never be both.

use serde::Serialize;

use crate::{
    error::PeekError,
    room::{Membership, RoomHandle},
};

/// Arbiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeekJoinState {
    /// Nothing to do: invite, join prompt, or a left room
    #[default]
    NoAction,
    /// Peek request in flight
    PeekPending,
    /// Peek session active
    Peeking,
    /// Room refused the peek; join prompt shown
    PeekFailed,
    /// Local user is joined
    Joined,
    /// Join request in flight
    Joining,
    /// Last join attempt failed; the user may retry
    JoinFailed,
}

/// Peek session work for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekStep {
    /// Attempt a peek
    Attempt,
    /// Tear down the peek session
    Stop,
    /// Nothing to do
    Idle,
}

/// How to proceed with a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStep {
    /// Send the join request
    Join,
    /// Guest user: defer the join until registration completes
    DeferUntilRegistered,
    /// A join is already in flight
    AlreadyJoining,
}

/// Outcome of a peek result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekOutcome {
    /// Peek session established
    Peeking,
    /// Forbidden-class failure absorbed; join prompt shown
    Refused,
    /// Any other failure; terminal for the view
    Fatal(PeekError),
    /// No peek was pending
    Ignored,
}

/// Peek/join arbiter.
#[derive(Debug, Clone, Default)]
pub struct PeekJoinArbiter {
    state: PeekJoinState,
    session_open: bool,
}

impl PeekJoinArbiter {
    /// Arbiter with nothing decided.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> PeekJoinState {
        self.state
    }

    /// Whether a join request is in flight.
    pub fn is_joining(&self) -> bool {
        self.state == PeekJoinState::Joining
    }

    /// Whether a peek session is established.
    pub fn is_peeking(&self) -> bool {
        self.state == PeekJoinState::Peeking
    }

    /// Whether a peek request is in flight.
    pub fn is_peek_pending(&self) -> bool {
        self.state == PeekJoinState::PeekPending
    }

    /// Whether a peek session was opened and not yet stopped.
    pub fn has_open_session(&self) -> bool {
        self.session_open
    }

    /// Room setup: peek when no room object exists, stop peeking when one
    /// does.
    pub fn setup(&mut self, room: Option<&RoomHandle>, should_peek: bool) -> PeekStep {
        if self.is_joining() {
            return PeekStep::Idle;
        }

        match room {
            None if should_peek && !self.is_peek_pending() && !self.is_peeking() => {
                self.state = PeekJoinState::PeekPending;
                self.session_open = true;
                PeekStep::Attempt
            },
            None => PeekStep::Idle,
            Some(room) => {
                self.state = Self::settled(room.my_membership);
                self.session_open = false;
                PeekStep::Stop
            },
        }
    }

    /// Applies the peek result.
    pub fn on_peek_result(&mut self, result: Result<(), PeekError>) -> PeekOutcome {
        if !self.is_peek_pending() {
            return PeekOutcome::Ignored;
        }

        match result {
            Ok(()) => {
                self.state = PeekJoinState::Peeking;
                PeekOutcome::Peeking
            },
            Err(err) => {
                self.session_open = false;
                if err.is_forbidden() {
                    self.state = PeekJoinState::PeekFailed;
                    PeekOutcome::Refused
                } else {
                    self.state = PeekJoinState::NoAction;
                    PeekOutcome::Fatal(err)
                }
            },
        }
    }

    /// Join requested by the user.
    pub fn request_join(&mut self, is_guest: bool) -> JoinStep {
        if self.is_joining() {
            return JoinStep::AlreadyJoining;
        }
        if is_guest {
            return JoinStep::DeferUntilRegistered;
        }
        self.state = PeekJoinState::Joining;
        JoinStep::Join
    }

    /// Join request failed; the room identity stays resolved.
    pub fn on_join_failed(&mut self) {
        if self.is_joining() {
            self.state = PeekJoinState::JoinFailed;
        }
    }

    /// Membership of the local user changed.
    ///
    /// Becoming joined always closes the peek session.
    pub fn on_membership(&mut self, membership: Membership) -> PeekStep {
        match membership {
            Membership::Joined => {
                self.state = PeekJoinState::Joined;
                if std::mem::take(&mut self.session_open) { PeekStep::Stop } else { PeekStep::Idle }
            },
            Membership::Invited | Membership::Left | Membership::Banned
                if self.state == PeekJoinState::Joined =>
            {
                self.state = PeekJoinState::NoAction;
                PeekStep::Idle
            },
            _ => PeekStep::Idle,
        }
    }

    /// Closes the peek session at teardown. Returns whether one was open.
    pub fn close(&mut self) -> bool {
        std::mem::take(&mut self.session_open)
    }

    fn settled(membership: Membership) -> PeekJoinState {
        if membership == Membership::Joined { PeekJoinState::Joined } else { PeekJoinState::NoAction }
    }
}
