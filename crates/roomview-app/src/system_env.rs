//! Production Environment implementation using system time and RNG.
//!
//! `SystemEnv` reads the monotonic clock for throttling and the wall clock for
//! search start timestamps. The OS RNG supplies the nonce that keeps search
//! ids of concurrent views apart. Simulation uses a seeded environment instead.

use roomview_core::env::Environment;

/// Production environment using system time and cryptographic RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. RNG failure indicates an
/// OS-level fault and search ids could no longer be trusted to be unique.
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::disallowed_methods)]
    fn unix_millis(&self) -> u64 {
        // Clock set before 1970 only degrades the uniqueness hint.
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn system_env_time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = env.now();

        assert!(t2 > t1, "Time should advance");
    }

    #[test]
    fn system_env_wall_clock_is_after_2020() {
        let env = SystemEnv::new();
        assert!(env.unix_millis() > 1_577_836_800_000);
    }

    #[test]
    fn system_env_random_ids_differ() {
        let env = SystemEnv::new();
        assert_ne!(env.random_u64(), env.random_u64());
    }
}
