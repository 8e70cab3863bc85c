//! Room identity resolution.
//!
//! Turns the alias-or-id the user asked for into a concrete room id, exactly
//! once per controller.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  begin(id)   ┌──────────────┐
//! │ Unresolved │─────────────>│ Resolved(id) │
//! └────────────┘              └──────────────┘
//!       │ begin(alias)              ^     │ fatal peek
//!       ↓                           │     ↓
//! ┌───────────┐  alias resolved     │  ┌────────────┐
//! │ Resolving │─────────────────────┘  │ Error(why) │
//! └───────────┘───────────────────────>└────────────┘
//!                 alias failed
//! ```
//!
//! There is no transition back to `Unresolved` and no transition from one
//! resolved room to another.

use serde::Serialize;

use crate::{
    error::ResolutionError,
    types::{RoomAlias, RoomId, RoomTarget},
};

/// Resolution state of the viewed room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Identity {
    /// Nothing attempted yet
    Unresolved(RoomTarget),
    /// Waiting for the directory to resolve an alias
    Resolving(RoomAlias),
    /// Concrete room id
    Resolved(RoomId),
    /// Terminal failure
    Error(ResolutionError),
}

/// What the caller must do after [`IdentityResolver::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveStep {
    /// Target was already an id; look it up in the local store
    Resolved(RoomId),
    /// Ask the directory to resolve this alias
    ResolveAlias(RoomAlias),
    /// Resolution already ran
    AlreadyStarted,
}

/// Alias-or-id resolver.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    target: RoomTarget,
    identity: Identity,
}

impl IdentityResolver {
    /// Resolver for `target`, not yet started.
    pub fn new(target: RoomTarget) -> Self {
        let identity = Identity::Unresolved(target.clone());
        Self { target, identity }
    }

    /// What the user asked to view.
    pub fn target(&self) -> &RoomTarget {
        &self.target
    }

    /// Current identity state.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Resolved room id, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        match &self.identity {
            Identity::Resolved(room_id) => Some(room_id),
            _ => None,
        }
    }

    /// Whether an alias lookup is in flight.
    pub fn is_resolving(&self) -> bool {
        matches!(self.identity, Identity::Resolving(_))
    }

    /// Whether resolution ended in a terminal error.
    pub fn is_failed(&self) -> bool {
        matches!(self.identity, Identity::Error(_))
    }

    /// Starts resolution. Runs at most once.
    pub fn begin(&mut self) -> ResolveStep {
        if !matches!(self.identity, Identity::Unresolved(_)) {
            return ResolveStep::AlreadyStarted;
        }

        match &self.target {
            RoomTarget::Id(room_id) => {
                self.identity = Identity::Resolved(room_id.clone());
                ResolveStep::Resolved(room_id.clone())
            },
            RoomTarget::Alias(alias) => {
                self.identity = Identity::Resolving(alias.clone());
                ResolveStep::ResolveAlias(alias.clone())
            },
        }
    }

    /// Applies the directory's answer.
    ///
    /// Returns the newly resolved id. Answers for a different alias, or
    /// arriving when no lookup is in flight, are ignored.
    pub fn on_alias_resolved(
        &mut self,
        alias: &RoomAlias,
        result: Result<RoomId, ResolutionError>,
    ) -> Option<RoomId> {
        match &self.identity {
            Identity::Resolving(pending) if pending == alias => {},
            _ => return None,
        }

        match result {
            Ok(room_id) => {
                self.identity = Identity::Resolved(room_id.clone());
                Some(room_id)
            },
            Err(err) => {
                self.identity = Identity::Error(err);
                None
            },
        }
    }

    /// Moves to the terminal error state.
    pub fn fail(&mut self, err: ResolutionError) {
        self.identity = Identity::Error(err);
    }

    /// Whether an event addressed to `room_id` belongs to this view.
    pub fn accepts(&self, room_id: &RoomId) -> bool {
        self.room_id() == Some(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_target_resolves_immediately() {
        let mut resolver = IdentityResolver::new(RoomTarget::parse("!r1:x"));
        assert_eq!(resolver.begin(), ResolveStep::Resolved(RoomId::from("!r1:x")));
        assert_eq!(resolver.room_id(), Some(&RoomId::from("!r1:x")));
        assert_eq!(resolver.begin(), ResolveStep::AlreadyStarted);
    }

    #[test]
    fn alias_resolution_runs_once() {
        let alias = RoomAlias::from("#lobby:x");
        let mut resolver = IdentityResolver::new(RoomTarget::Alias(alias.clone()));
        assert_eq!(resolver.begin(), ResolveStep::ResolveAlias(alias.clone()));
        assert!(resolver.is_resolving());

        let resolved = resolver.on_alias_resolved(&alias, Ok(RoomId::from("!r:x")));
        assert_eq!(resolved, Some(RoomId::from("!r:x")));

        // A duplicate answer never swaps the room
        let again = resolver.on_alias_resolved(&alias, Ok(RoomId::from("!other:x")));
        assert_eq!(again, None);
        assert_eq!(resolver.room_id(), Some(&RoomId::from("!r:x")));
    }

    #[test]
    fn alias_failure_is_terminal() {
        let alias = RoomAlias::from("#gone:x");
        let mut resolver = IdentityResolver::new(RoomTarget::Alias(alias.clone()));
        resolver.begin();

        assert_eq!(resolver.on_alias_resolved(&alias, Err(ResolutionError::NotFound)), None);
        assert_eq!(resolver.identity(), &Identity::Error(ResolutionError::NotFound));
        assert_eq!(resolver.begin(), ResolveStep::AlreadyStarted);
    }

    #[test]
    fn foreign_rooms_are_not_accepted() {
        let mut resolver = IdentityResolver::new(RoomTarget::parse("!r1:x"));
        assert!(!resolver.accepts(&RoomId::from("!r1:x")));

        resolver.begin();
        assert!(resolver.accepts(&RoomId::from("!r1:x")));
        assert!(!resolver.accepts(&RoomId::from("!r2:x")));
    }
}
