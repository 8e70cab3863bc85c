//! Search session management.
//!
//! At most one search is live per view. Starting a search cancels the
//! previous one through its [`CancellationToken`]; results tagged with any id
//! other than the live session's are dropped.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{error::SearchError, types::RoomId};

/// Unique search session id.
///
/// Ordered by start timestamp. The nonce keeps ids of views sharing one
/// search backend apart when they start in the same millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SearchId {
    /// Start timestamp in milliseconds, bumped past the previous session's
    pub started_millis: u64,
    /// Random tiebreak
    pub nonce: u32,
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.started_millis, self.nonce)
    }
}

/// Where to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// Only the viewed room
    #[default]
    Room,
    /// All rooms
    All,
}

/// Rendering mode of the timeline area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderingMode {
    /// Room timeline
    #[default]
    Room,
    /// Search results
    Search,
}

/// Request handed to the search backend.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Session id; echoed back with progress and results
    pub id: SearchId,
    /// Search term
    pub term: String,
    /// Room to search in, `None` for all rooms
    pub room_id: Option<RoomId>,
    /// Cancelled when the session is superseded or cancelled
    pub cancel: CancellationToken,
}

/// Read-only view of the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchView {
    /// Session id
    pub id: SearchId,
    /// Search term
    pub term: String,
    /// Scope
    pub scope: SearchScope,
    /// Result count, once known
    pub result_count: Option<u64>,
    /// Backend still working
    pub in_progress: bool,
    /// Failure of this session
    pub error: Option<SearchError>,
}

#[derive(Debug)]
struct Session {
    view: SearchView,
    cancel: CancellationToken,
}

/// Search session manager.
#[derive(Debug, Default)]
pub struct SearchManager {
    live: Option<Session>,
    last_id: u64,
    mode: RenderingMode,
}

impl SearchManager {
    /// Manager with no search.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendering mode of the timeline area.
    pub fn mode(&self) -> RenderingMode {
        self.mode
    }

    /// Live session, if any.
    pub fn view(&self) -> Option<&SearchView> {
        self.live.as_ref().map(|session| &session.view)
    }

    /// Whether search results (or the search bar) replace the timeline.
    pub fn is_shown(&self) -> bool {
        self.mode == RenderingMode::Search
    }

    /// Starts a search, cancelling the previous one.
    ///
    /// `now_millis` seeds the id; ids stay strictly increasing even for
    /// searches started within the same millisecond. `nonce` is taken as is.
    pub fn start(
        &mut self,
        term: String,
        scope: SearchScope,
        room_id: &RoomId,
        now_millis: u64,
        nonce: u32,
    ) -> SearchRequest {
        self.cancel_live();

        let id = SearchId { started_millis: now_millis.max(self.last_id + 1), nonce };
        self.last_id = id.started_millis;

        let cancel = CancellationToken::new();
        self.live = Some(Session {
            view: SearchView {
                id,
                term: term.clone(),
                scope,
                result_count: None,
                in_progress: true,
                error: None,
            },
            cancel: cancel.clone(),
        });
        self.mode = RenderingMode::Search;

        SearchRequest {
            id,
            term,
            room_id: (scope == SearchScope::Room).then(|| room_id.clone()),
            cancel,
        }
    }

    /// Progress or final results. Returns whether they were applied.
    pub fn on_progress(&mut self, id: SearchId, result_count: u64, in_progress: bool) -> bool {
        let Some(session) = self.live_session(id) else {
            return false;
        };
        session.view.result_count = Some(result_count);
        session.view.in_progress = in_progress;
        true
    }

    /// Search failed. Returns whether the failure was applied.
    ///
    /// A cancellation reported by the backend is not a failure.
    pub fn on_failed(&mut self, id: SearchId, error: SearchError) -> bool {
        if error == SearchError::Cancelled {
            return false;
        }
        let Some(session) = self.live_session(id) else {
            return false;
        };
        session.view.in_progress = false;
        session.view.error = Some(error);
        true
    }

    /// Cancels the live search and returns to the room timeline.
    ///
    /// Idempotent. Returns whether anything changed.
    pub fn cancel(&mut self) -> bool {
        let cancelled = self.cancel_live();
        let was_shown = std::mem::replace(&mut self.mode, RenderingMode::Room) == RenderingMode::Search;
        cancelled || was_shown
    }

    /// Toggles the search bar. Hiding it cancels any live search.
    pub fn toggle(&mut self) {
        if self.is_shown() {
            self.cancel();
        } else {
            self.mode = RenderingMode::Search;
        }
    }

    fn live_session(&mut self, id: SearchId) -> Option<&mut Session> {
        self.live.as_mut().filter(|session| session.view.id == id && !session.cancel.is_cancelled())
    }

    fn cancel_live(&mut self) -> bool {
        match self.live.take() {
            Some(session) => {
                session.cancel.cancel();
                true
            },
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::from("!r:x")
    }

    #[test]
    fn start_switches_to_search_mode() {
        let mut search = SearchManager::new();
        let request = search.start("cats".into(), SearchScope::Room, &room(), 1_000, 7);

        assert_eq!(request.id, SearchId { started_millis: 1_000, nonce: 7 });
        assert_eq!(request.room_id, Some(room()));
        assert_eq!(search.mode(), RenderingMode::Search);
        assert!(search.view().is_some_and(|view| view.in_progress));
    }

    #[test]
    fn global_scope_has_no_room() {
        let mut search = SearchManager::new();
        let request = search.start("cats".into(), SearchScope::All, &room(), 1_000, 7);
        assert_eq!(request.room_id, None);
    }

    #[test]
    fn second_search_cancels_first() {
        let mut search = SearchManager::new();
        let first = search.start("cats".into(), SearchScope::Room, &room(), 1_000, 7);
        let second = search.start("dogs".into(), SearchScope::Room, &room(), 1_000, 7);

        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert!(second.id > first.id);

        assert!(!search.on_progress(first.id, 99, false));
        assert!(search.on_progress(second.id, 3, false));

        let view = search.view().cloned();
        assert_eq!(view.map(|v| (v.term, v.result_count)), Some(("dogs".to_owned(), Some(3))));
    }

    #[test]
    fn views_starting_together_get_distinct_ids() {
        let mut left = SearchManager::new();
        let mut right = SearchManager::new();
        let ours = left.start("cats".into(), SearchScope::All, &room(), 1_000, 0x1111);
        let theirs = right.start("cats".into(), SearchScope::All, &room(), 1_000, 0x2222);

        assert_eq!(ours.id.started_millis, theirs.id.started_millis);
        assert_ne!(ours.id, theirs.id);
        assert!(!left.on_progress(theirs.id, 9, false));
        assert!(left.on_progress(ours.id, 2, false));
        assert_eq!(ours.id.to_string(), "1000-00001111");
    }

    #[test]
    fn cancel_is_idempotent_and_blocks_results() {
        let mut search = SearchManager::new();
        let request = search.start("cats".into(), SearchScope::Room, &room(), 1_000, 7);

        assert!(search.cancel());
        assert!(!search.cancel());
        assert!(request.cancel.is_cancelled());
        assert_eq!(search.mode(), RenderingMode::Room);
        assert!(!search.on_progress(request.id, 1, false));
        assert!(search.view().is_none());
    }

    #[test]
    fn failure_is_scoped_to_session() {
        let mut search = SearchManager::new();
        let request = search.start("cats".into(), SearchScope::Room, &room(), 1_000, 7);

        assert!(!search.on_failed(request.id, SearchError::Cancelled));
        assert!(search.on_failed(request.id, SearchError::Failed("backend down".into())));

        let view = search.view().cloned();
        assert_eq!(view.and_then(|v| v.error), Some(SearchError::Failed("backend down".into())));
        assert_eq!(search.mode(), RenderingMode::Search);
    }

    #[test]
    fn toggle_hides_and_cancels() {
        let mut search = SearchManager::new();
        search.toggle();
        assert!(search.is_shown());
        assert!(search.view().is_none());

        let request = search.start("cats".into(), SearchScope::Room, &room(), 5, 7);
        search.toggle();
        assert!(!search.is_shown());
        assert!(request.cancel.is_cancelled());
    }
}
