//! Environment abstraction for deterministic testing.
//!
//! Decouples the controller from system resources (monotonic time, wall-clock
//! time, randomness). Simulation plugs in a virtual clock and a seeded RNG;
//! production uses the operating system.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `unix_millis()` is only used as a uniqueness hint, never for ordering
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`, simulation
    /// environments a virtual clock.
    type Instant: Copy + Ord + Send + Sync + std::fmt::Debug + std::ops::Sub<Output = Duration> + 'static;

    /// Current time (monotonic).
    ///
    /// Subsequent calls must return times >= previous calls.
    fn now(&self) -> Self::Instant;

    /// Milliseconds since the Unix epoch.
    ///
    /// Search sessions use this as their start timestamp.
    fn unix_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// Search ids draw their nonce from here. Given the same RNG seed, this produces the same sequence of bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Deterministic environment for unit tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicU64, Ordering},
        },
        time::{Duration, Instant},
    };

    use super::Environment;

    /// Manually advanced clock with a counter-based "RNG".
    #[derive(Debug, Clone)]
    pub struct MockEnv {
        origin: Instant,
        offset_ms: Arc<AtomicU64>,
        unix_origin_ms: u64,
        counter: Arc<AtomicU64>,
    }

    impl MockEnv {
        /// Clock at zero, wall clock at 2024-01-01.
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset_ms: Arc::new(AtomicU64::new(0)),
                unix_origin_ms: 1_704_067_200_000,
                counter: Arc::new(AtomicU64::new(0)),
            }
        }

        /// Moves both clocks forward.
        pub fn advance(&self, by: Duration) {
            self.offset_ms.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Environment for MockEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            self.origin + Duration::from_millis(self.offset_ms.load(Ordering::SeqCst))
        }

        fn unix_millis(&self) -> u64 {
            self.unix_origin_ms + self.offset_ms.load(Ordering::SeqCst)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for byte in buffer.iter_mut() {
                *byte = self.counter.fetch_add(1, Ordering::SeqCst) as u8;
            }
        }
    }
}
