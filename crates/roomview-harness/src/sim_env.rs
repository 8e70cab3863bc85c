//! Simulated environment with a virtual clock and a seeded RNG.
//!
//! Time only moves when the test calls [`SimEnv::advance`], and the same seed
//! always yields the same random bytes, so every run of a scenario is
//! reproducible.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    ops::{Add, Sub},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use roomview_core::env::Environment;
use serde::Serialize;

/// Wall clock at the start of every simulation (2024-01-01T00:00:00Z).
pub const SIM_EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// Point on the virtual clock, as time elapsed since the simulation started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct SimInstant(Duration);

impl SimInstant {
    /// Instant at the start of the simulation.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Time elapsed since the simulation started.
    pub fn elapsed(self) -> Duration {
        self.0
    }
}

impl Sub for SimInstant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs)
    }
}

struct State {
    now: SimInstant,
    rng: ChaCha8Rng,
}

/// Deterministic environment shared by every clone.
#[derive(Clone)]
pub struct SimEnv {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for SimEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimEnv").field("now", &self.lock().now).finish_non_exhaustive()
    }
}

impl SimEnv {
    /// Environment at time zero, seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        let state = State { now: SimInstant::ZERO, rng: ChaCha8Rng::seed_from_u64(seed) };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    /// Moves the virtual clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now = state.now + by;
    }

    /// Time elapsed since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.lock().now.elapsed()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::with_seed(0)
    }
}

impl Environment for SimEnv {
    type Instant = SimInstant;

    fn now(&self) -> SimInstant {
        self.lock().now
    }

    fn unix_millis(&self) -> u64 {
        SIM_EPOCH_MILLIS + self.lock().now.elapsed().as_millis() as u64
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.lock().rng.fill_bytes(buffer);
    }
}
