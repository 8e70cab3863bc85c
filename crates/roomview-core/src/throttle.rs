//! Leading and trailing edge throttle.
//!
//! Generic over the instant type so simulation can drive it with virtual
//! time.

use std::{ops::Sub, time::Duration};

/// Default member-update throttle window.
pub const DEFAULT_MEMBER_UPDATE_WINDOW: Duration = Duration::from_millis(500);

/// Fires at most once per window, on the leading edge and, if further
/// requests arrived meanwhile, once more on the trailing edge.
#[derive(Debug, Clone)]
pub struct Throttle<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    window: Duration,
    last_fired: Option<I>,
    pending: bool,
}

impl<I> Throttle<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Throttle with the given window.
    pub fn new(window: Duration) -> Self {
        Self { window, last_fired: None, pending: false }
    }

    /// Requests a firing. Returns true if it fires immediately.
    pub fn request(&mut self, now: I) -> bool {
        if self.ready(now) {
            self.last_fired = Some(now);
            self.pending = false;
            return true;
        }
        self.pending = true;
        false
    }

    /// Trailing edge. Returns true if a deferred request fires now.
    pub fn poll(&mut self, now: I) -> bool {
        if self.pending && self.ready(now) {
            self.last_fired = Some(now);
            self.pending = false;
            return true;
        }
        false
    }

    /// Whether a request is waiting for the trailing edge.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Drops any deferred request.
    pub fn cancel(&mut self) {
        self.pending = false;
    }

    fn ready(&self, now: I) -> bool {
        self.last_fired.is_none_or(|last| now - last >= self.window)
    }
}
