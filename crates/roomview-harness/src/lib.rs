//! Deterministic simulation harness for room session controller testing.
//!
//! Simulated implementations of the Environment and Driver traits for
//! deterministic, reproducible testing of the room view against arbitrary
//! event orderings and collaborator latencies.
//!
//! # Components
//!
//! - [`SimEnv`]: virtual clock and seeded RNG
//! - [`SimWorld`]: in-memory collaborators (room store, directory, server,
//!   trust, search, settings, scroll store)
//! - [`SimDriver`]: async driver over a [`SimWorld`] with hold/release gates,
//!   for running the real runtime
//! - [`ControllerHarness`]: sans-IO driver of one controller where the test
//!   decides when each async operation completes
//!
//! # Invariant Testing
//!
//! The `invariants` module checks behavioral properties against the recorded
//! snapshot history. Use [`InvariantRegistry::standard()`] for every room
//! view invariant, and [`Operation`] to generate arbitrary event sequences.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller_harness;
pub mod invariants;
pub mod operation;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_world;

pub use controller_harness::{ControllerHarness, PendingOp, joined_room};
pub use invariants::{
    IdentityMonotone, Invariant, InvariantRegistry, InvariantResult, LiveTimelineInvalidatesAnchor,
    LoadPhaseConsistent, NoMutationAfterTeardown, PeekJoinExclusive, PermissionsConsistent, SearchRequiresTimeline,
    SystemSnapshot, UnreadResetOnlyAtLiveEnd, Violation,
};
pub use operation::{Body, Completion, Operation, Sender};
pub use sim_driver::{DriverCall, Gate, SimDriver, SimDriverError};
pub use sim_env::{SIM_EPOCH_MILLIS, SimEnv, SimInstant};
pub use sim_world::SimWorld;
