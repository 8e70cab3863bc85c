//! Room view invariants over published snapshot histories.
//!
//! A [`SystemSnapshot`] holds every [`RoomViewState`] a controller published,
//! in order, and whether the view has been torn down. Some checks look at the
//! latest snapshot alone (peek and join never both hold, permissions match the
//! loaded room). Others compare consecutive snapshots (identity never regresses,
//! unread counts only clear at the live end, a new live timeline drops the
//! scroll anchor, nothing is published after teardown).
//!
//! [`ControllerHarness`](crate::ControllerHarness) records the history as it
//! drives the controller; the property tests and the fuzz target check it
//! after every operation.
//!
//! ```ignore
//! harness.apply(&op);
//! InvariantRegistry::standard().assert_all(harness.history(), &format!("after {op:?}"));
//! ```
//!
//! [`RoomViewState`]: roomview_controller::RoomViewState

mod checks;
mod snapshot;

pub use checks::{
    IdentityMonotone, LiveTimelineInvalidatesAnchor, LoadPhaseConsistent, NoMutationAfterTeardown,
    PeekJoinExclusive, PermissionsConsistent, SearchRequiresTimeline, UnreadResetOnlyAtLiveEnd,
};
pub use snapshot::SystemSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a view history.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the recorded history.
    ///
    /// Returns `Ok(())` if the invariant holds, or a [`Violation`]
    /// describing what went wrong.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|inv| inv.name())).finish()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with every room view invariant.
    ///
    /// Includes:
    /// - [`NoMutationAfterTeardown`]: the last snapshot before teardown is final
    /// - [`PeekJoinExclusive`]: never peeking and joined at once
    /// - [`PermissionsConsistent`]: the permission triple matches the room
    /// - [`SearchRequiresTimeline`]: search only replaces the timeline
    /// - [`LoadPhaseConsistent`]: load phase agrees with the arbiter
    /// - [`IdentityMonotone`]: resolution never moves backwards
    /// - [`UnreadResetOnlyAtLiveEnd`]: unread count only clears at the live end
    /// - [`LiveTimelineInvalidatesAnchor`]: a timeline reset drops the anchor
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(NoMutationAfterTeardown);
        registry.add(PeekJoinExclusive);
        registry.add(PermissionsConsistent);
        registry.add(SearchRequiresTimeline);
        registry.add(LoadPhaseConsistent);
        registry.add(IdentityMonotone);
        registry.add(UnreadResetOnlyAtLiveEnd);
        registry.add(LiveTimelineInvalidatesAnchor);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given history.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> = self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check the history and panic listing every violation.
    ///
    /// `context` names the step that produced the latest snapshot.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert!(!registry.is_empty());
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn empty_snapshot_passes_invariants() {
        let registry = InvariantRegistry::standard();
        let snapshot = SystemSnapshot::empty();
        assert!(registry.check_all(&snapshot).is_ok());
    }
}
