//! Scroll and read-state tracking.
//!
//! Tracks where the timeline is anchored and persists that anchor per room
//! at teardown. A view stuck to the live end persists nothing, so the next
//! mount resumes from the read marker rather than a stale offset.

use serde::{Deserialize, Serialize};

use crate::types::EventId;

/// Persisted scroll position of a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollState {
    /// Event the viewport is anchored to
    pub focused_event: EventId,
    /// Offset of the anchor from the bottom of the viewport, in pixels
    pub pixel_offset: i64,
}

/// Current anchor of the timeline viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anchor", rename_all = "snake_case")]
pub enum ScrollAnchor {
    /// Following the live end
    StuckToBottom,
    /// Anchored to an event
    Event {
        /// Anchor event
        event_id: EventId,
        /// Offset from the bottom of the viewport, in pixels
        pixel_offset: i64,
    },
}

/// Event the timeline should open on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialEvent {
    /// Event to show
    pub event_id: EventId,
    /// Highlight the event
    pub highlighted: bool,
    /// Scroll the event into view
    pub scroll_into_view: bool,
    /// Restored pixel offset, if this came from a persisted scroll state
    pub pixel_offset: Option<i64>,
}

/// Scroll tracker.
#[derive(Debug, Clone, Default)]
pub struct ScrollTracker {
    anchor: Option<ScrollAnchor>,
    at_live_end: bool,
    initial_event: Option<InitialEvent>,
}

impl ScrollTracker {
    /// Tracker with no anchor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current anchor.
    pub fn anchor(&self) -> Option<&ScrollAnchor> {
        self.anchor.as_ref()
    }

    /// Whether the viewport shows the live end.
    pub fn at_live_end(&self) -> bool {
        self.at_live_end
    }

    /// Event the timeline should open on.
    pub fn initial_event(&self) -> Option<&InitialEvent> {
        self.initial_event.as_ref()
    }

    /// Restores a persisted scroll state unless an explicit initial event was
    /// requested.
    pub fn restore(&mut self, saved: Option<ScrollState>) -> bool {
        if self.initial_event.is_some() {
            return false;
        }
        let Some(saved) = saved else {
            return false;
        };

        self.anchor = Some(ScrollAnchor::Event {
            event_id: saved.focused_event.clone(),
            pixel_offset: saved.pixel_offset,
        });
        self.initial_event = Some(InitialEvent {
            event_id: saved.focused_event,
            highlighted: false,
            scroll_into_view: false,
            pixel_offset: Some(saved.pixel_offset),
        });
        true
    }

    /// Focuses an explicit event; any restored offset is dropped.
    pub fn focus(&mut self, event_id: EventId, highlighted: bool, scroll_into_view: bool) {
        self.initial_event = Some(InitialEvent { event_id, highlighted, scroll_into_view, pixel_offset: None });
    }

    /// Drops a highlighted initial event (jump to live). Returns whether one
    /// was dropped.
    pub fn clear_highlight(&mut self) -> bool {
        if self.initial_event.as_ref().is_some_and(|initial| initial.highlighted) {
            self.initial_event = None;
            return true;
        }
        false
    }

    /// Viewport moved. Returns true if the live end was newly reached.
    pub fn on_scroll(&mut self, at_live_end: bool, anchor: Option<ScrollAnchor>) -> bool {
        let reached = at_live_end && !self.at_live_end;
        self.at_live_end = at_live_end;
        self.anchor = if at_live_end { Some(ScrollAnchor::StuckToBottom) } else { anchor };
        reached
    }

    /// Live timeline was replaced; the anchor no longer refers to it.
    pub fn invalidate(&mut self) {
        self.anchor = None;
        self.at_live_end = false;
    }

    /// State to persist at teardown.
    pub fn persisted(&self) -> Option<ScrollState> {
        if self.at_live_end {
            return None;
        }
        match &self.anchor {
            Some(ScrollAnchor::Event { event_id, pixel_offset }) => {
                Some(ScrollState { focused_event: event_id.clone(), pixel_offset: *pixel_offset })
            },
            Some(ScrollAnchor::StuckToBottom) | None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchored(id: &str, offset: i64) -> ScrollAnchor {
        ScrollAnchor::Event { event_id: EventId::from(id), pixel_offset: offset }
    }

    #[test]
    fn live_end_persists_nothing() {
        let mut scroll = ScrollTracker::new();
        scroll.on_scroll(false, Some(anchored("$e", 40)));
        assert_eq!(
            scroll.persisted(),
            Some(ScrollState { focused_event: EventId::from("$e"), pixel_offset: 40 })
        );

        assert!(scroll.on_scroll(true, Some(anchored("$e", 40))));
        assert_eq!(scroll.anchor(), Some(&ScrollAnchor::StuckToBottom));
        assert_eq!(scroll.persisted(), None);
    }

    #[test]
    fn restore_yields_to_explicit_event() {
        let saved = ScrollState { focused_event: EventId::from("$old"), pixel_offset: 12 };

        let mut scroll = ScrollTracker::new();
        scroll.focus(EventId::from("$linked"), true, true);
        assert!(!scroll.restore(Some(saved.clone())));
        assert_eq!(scroll.initial_event().map(|e| e.event_id.clone()), Some(EventId::from("$linked")));

        let mut scroll = ScrollTracker::new();
        assert!(scroll.restore(Some(saved)));
        assert_eq!(scroll.initial_event().and_then(|e| e.pixel_offset), Some(12));
    }

    #[test]
    fn invalidate_drops_anchor() {
        let mut scroll = ScrollTracker::new();
        scroll.on_scroll(false, Some(anchored("$e", 3)));
        scroll.invalidate();
        assert_eq!(scroll.anchor(), None);
        assert_eq!(scroll.persisted(), None);
    }

    #[test]
    fn jump_to_live_clears_highlight_only() {
        let mut scroll = ScrollTracker::new();
        scroll.focus(EventId::from("$e"), false, false);
        assert!(!scroll.clear_highlight());

        scroll.focus(EventId::from("$e"), true, false);
        assert!(scroll.clear_highlight());
        assert!(scroll.initial_event().is_none());
    }

    #[test]
    fn persisted_state_shape() {
        let state = ScrollState { focused_event: EventId::from("$anchor"), pixel_offset: -24 };
        insta::assert_json_snapshot!(state, @r#"
        {
          "focused_event": "$anchor",
          "pixel_offset": -24
        }
        "#);
    }
}
