//! Timeline event reconciliation.
//!
//! Consumes the live and decrypted event channels for the resolved room.
//! Maintains the unread counter, tracks the live timeline generation and
//! dispatches chat effects at most once per event id.

use std::collections::{HashSet, VecDeque};

use crate::{
    effects::ChatEffect,
    event::{EventKind, TimelineDelivery, TimelineEvent, TimelineSet},
    types::{EventId, RoomId, TimelineId, UserId},
    visibility::VisibilityPolicy,
};

/// Default number of event ids remembered for effect deduplication.
pub const DEFAULT_EFFECT_HISTORY: usize = 256;

/// View state the reconciler needs to classify an event.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileContext<'a> {
    /// Resolved room
    pub room_id: &'a RoomId,
    /// Local user
    pub me: &'a UserId,
    /// A join request is in flight
    pub joining: bool,
    /// Search results are shown instead of the timeline
    pub search_shown: bool,
    /// Timeline is scrolled to the live end
    pub at_live_end: bool,
    /// Room's aggregate notification state is unread
    pub notification_unread: bool,
    /// Threads are enabled; thread replies never trigger effects
    pub threads_enabled: bool,
    /// Hidden-event policy
    pub policy: &'a VisibilityPolicy,
}

/// Why an event was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    /// Event belongs to another room
    WrongRoom,
    /// Event arrived through a filtered or notification timeline
    FilteredTimeline,
    /// Event came from pagination, not live sync
    NotLive,
}

/// Result of reconciling one timeline event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimelineOutcome {
    /// Unread counter was incremented
    pub unread_incremented: bool,
    /// Effects to dispatch
    pub effects: Vec<ChatEffect>,
    /// Encryption was enabled; trust must be recomputed
    pub encryption_enabled: bool,
    /// URL preview visibility must be recomputed
    pub url_previews_changed: bool,
}

/// Timeline event reconciler.
#[derive(Debug, Clone)]
pub struct TimelineReconciler {
    unread_count: u64,
    live_timeline: Option<TimelineId>,
    dispatched: HashSet<EventId>,
    dispatch_order: VecDeque<EventId>,
    history: usize,
}

impl Default for TimelineReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_EFFECT_HISTORY)
    }
}

impl TimelineReconciler {
    /// Reconciler remembering up to `history` dispatched event ids.
    pub fn new(history: usize) -> Self {
        Self {
            unread_count: 0,
            live_timeline: None,
            dispatched: HashSet::new(),
            dispatch_order: VecDeque::new(),
            history: history.max(1),
        }
    }

    /// Unread events since the user last viewed the live end.
    pub fn unread_count(&self) -> u64 {
        self.unread_count
    }

    /// Live timeline generation being tracked.
    pub fn live_timeline(&self) -> Option<TimelineId> {
        self.live_timeline
    }

    /// Adopts the live timeline of a freshly loaded room.
    pub fn track(&mut self, timeline: TimelineId) {
        self.live_timeline = Some(timeline);
    }

    /// Classifies one timeline event.
    ///
    /// # Errors
    ///
    /// - `Discard` if the event does not belong to the unfiltered live
    ///   timeline of the resolved room
    pub fn on_timeline_event(
        &mut self,
        event: &TimelineEvent,
        delivery: TimelineDelivery,
        ctx: &ReconcileContext<'_>,
    ) -> Result<TimelineOutcome, Discard> {
        if event.room_id != *ctx.room_id {
            return Err(Discard::WrongRoom);
        }
        if delivery.timeline_set != TimelineSet::Unfiltered {
            return Err(Discard::FilteredTimeline);
        }

        let mut outcome = TimelineOutcome::default();
        match event.kind {
            EventKind::PreviewUrls => outcome.url_previews_changed = true,
            EventKind::Encryption => {
                outcome.encryption_enabled = true;
                outcome.url_previews_changed = true;
            },
            _ => {},
        }

        if delivery.to_start || !delivery.live {
            return if outcome == TimelineOutcome::default() { Err(Discard::NotLive) } else { Ok(outcome) };
        }

        // Observed, but no unread or effects while the join settles
        if ctx.joining {
            return Ok(outcome);
        }

        if !event.is_undecrypted() {
            outcome.effects = self.dispatch_effects(event, ctx);
        }

        if event.sender != *ctx.me {
            let reading_live = ctx.at_live_end && !ctx.search_shown;
            if !reading_live && !ctx.policy.should_hide(event) {
                self.unread_count += 1;
                outcome.unread_incremented = true;
            }
        }

        Ok(outcome)
    }

    /// An event finished decrypting.
    ///
    /// Re-enters effect dispatch unless decryption failed.
    pub fn on_decrypted(&mut self, event: &TimelineEvent, ctx: &ReconcileContext<'_>) -> Vec<ChatEffect> {
        if event.room_id != *ctx.room_id || event.is_undecrypted() {
            return Vec::new();
        }
        self.dispatch_effects(event, ctx)
    }

    /// Server-forced discontinuity. Returns whether the generation changed.
    pub fn on_timeline_reset(&mut self, timeline: TimelineId) -> bool {
        if self.live_timeline == Some(timeline) {
            return false;
        }
        self.live_timeline = Some(timeline);
        true
    }

    /// The user viewed the live end of the timeline.
    pub fn mark_read(&mut self) -> bool {
        std::mem::take(&mut self.unread_count) > 0
    }

    fn dispatch_effects(&mut self, event: &TimelineEvent, ctx: &ReconcileContext<'_>) -> Vec<ChatEffect> {
        if !ctx.notification_unread {
            return Vec::new();
        }
        if ctx.threads_enabled && event.thread_root.is_some() {
            return Vec::new();
        }
        if self.dispatched.contains(&event.event_id) {
            return Vec::new();
        }

        let effects = ChatEffect::triggered_by(event);
        if !effects.is_empty() {
            self.remember(event.event_id.clone());
        }
        effects
    }

    fn remember(&mut self, event_id: EventId) {
        if self.dispatch_order.len() == self.history
            && let Some(oldest) = self.dispatch_order.pop_front()
        {
            self.dispatched.remove(&oldest);
        }
        self.dispatched.insert(event_id.clone());
        self.dispatch_order.push_back(event_id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::event::DecryptionState;

    struct Fixture {
        room: RoomId,
        me: UserId,
        policy: VisibilityPolicy,
    }

    impl Fixture {
        fn new() -> Self {
            Self { room: RoomId::from("!r:x"), me: UserId::from("@me:x"), policy: VisibilityPolicy::default() }
        }

        fn ctx(&self) -> ReconcileContext<'_> {
            ReconcileContext {
                room_id: &self.room,
                me: &self.me,
                joining: false,
                search_shown: false,
                at_live_end: false,
                notification_unread: true,
                threads_enabled: true,
                policy: &self.policy,
            }
        }

        fn event(&self, id: &str, sender: &str, body: &str) -> TimelineEvent {
            TimelineEvent::text(EventId::from(id), self.room.clone(), UserId::from(sender), body)
        }
    }

    #[test]
    fn counts_events_from_others() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();

        reconciler.on_timeline_event(&fx.event("$1", "@bob:x", "hi"), TimelineDelivery::live(), &fx.ctx()).unwrap();
        reconciler.on_timeline_event(&fx.event("$2", "@me:x", "hi"), TimelineDelivery::live(), &fx.ctx()).unwrap();

        assert_eq!(reconciler.unread_count(), 1);
    }

    #[test]
    fn reading_at_live_end_does_not_count() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let ctx = ReconcileContext { at_live_end: true, ..fx.ctx() };

        reconciler.on_timeline_event(&fx.event("$1", "@bob:x", "hi"), TimelineDelivery::live(), &ctx).unwrap();
        assert_eq!(reconciler.unread_count(), 0);

        let searching = ReconcileContext { search_shown: true, ..ctx };
        reconciler.on_timeline_event(&fx.event("$2", "@bob:x", "hi"), TimelineDelivery::live(), &searching).unwrap();
        assert_eq!(reconciler.unread_count(), 1);
    }

    #[test]
    fn discards_foreign_and_paginated_events() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();

        let mut foreign = fx.event("$1", "@bob:x", "hi");
        foreign.room_id = RoomId::from("!other:x");
        assert_eq!(
            reconciler.on_timeline_event(&foreign, TimelineDelivery::live(), &fx.ctx()),
            Err(Discard::WrongRoom)
        );

        let filtered = TimelineDelivery { timeline_set: TimelineSet::Notifications, ..TimelineDelivery::live() };
        assert_eq!(
            reconciler.on_timeline_event(&fx.event("$2", "@bob:x", "hi"), filtered, &fx.ctx()),
            Err(Discard::FilteredTimeline)
        );

        assert_eq!(
            reconciler.on_timeline_event(&fx.event("$3", "@bob:x", "hi"), TimelineDelivery::paginated(), &fx.ctx()),
            Err(Discard::NotLive)
        );
        assert_eq!(reconciler.unread_count(), 0);
    }

    #[test]
    fn hidden_events_do_not_count() {
        let mut fx = Fixture::new();
        fx.policy.show_join_leaves = false;
        let mut reconciler = TimelineReconciler::default();

        let mut join = fx.event("$1", "@bob:x", "");
        join.kind = EventKind::Member { change: crate::event::MemberChange::Joined };
        reconciler.on_timeline_event(&join, TimelineDelivery::live(), &fx.ctx()).unwrap();

        assert_eq!(reconciler.unread_count(), 0);
    }

    #[test]
    fn joining_suppresses_unread_and_effects() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let ctx = ReconcileContext { joining: true, ..fx.ctx() };

        let outcome =
            reconciler.on_timeline_event(&fx.event("$1", "@bob:x", "🎉"), TimelineDelivery::live(), &ctx).unwrap();
        assert!(outcome.effects.is_empty());
        assert_eq!(reconciler.unread_count(), 0);
    }

    #[test]
    fn effects_dispatch_once_across_channels() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let event = fx.event("$1", "@bob:x", "🎉");

        let outcome = reconciler.on_timeline_event(&event, TimelineDelivery::live(), &fx.ctx()).unwrap();
        assert_eq!(outcome.effects, vec![ChatEffect::Confetti]);

        assert!(reconciler.on_decrypted(&event, &fx.ctx()).is_empty());
    }

    #[test]
    fn pending_decryption_defers_effects_to_decrypted_channel() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let mut event = fx.event("$1", "@bob:x", "🎆");
        event.decryption = DecryptionState::Pending;

        let outcome = reconciler.on_timeline_event(&event, TimelineDelivery::live(), &fx.ctx()).unwrap();
        assert!(outcome.effects.is_empty());

        event.decryption = DecryptionState::Decrypted;
        assert_eq!(reconciler.on_decrypted(&event, &fx.ctx()), vec![ChatEffect::Fireworks]);

        event.decryption = DecryptionState::Failed;
        event.event_id = EventId::from("$2");
        assert!(reconciler.on_decrypted(&event, &fx.ctx()).is_empty());
    }

    #[test]
    fn effects_require_unread_notification_state() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let ctx = ReconcileContext { notification_unread: false, ..fx.ctx() };

        assert!(reconciler.on_decrypted(&fx.event("$1", "@bob:x", "🎉"), &ctx).is_empty());
    }

    #[test]
    fn thread_replies_skip_effects() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let mut reply = fx.event("$1", "@bob:x", "🎉");
        reply.thread_root = Some(EventId::from("$root"));

        assert!(reconciler.on_decrypted(&reply, &fx.ctx()).is_empty());

        let no_threads = ReconcileContext { threads_enabled: false, ..fx.ctx() };
        assert_eq!(reconciler.on_decrypted(&reply, &no_threads), vec![ChatEffect::Confetti]);
    }

    #[test]
    fn dedup_history_is_bounded() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::new(2);

        for id in ["$1", "$2", "$3"] {
            assert_eq!(reconciler.on_decrypted(&fx.event(id, "@bob:x", "🎉"), &fx.ctx()).len(), 1);
        }
        // $1 was evicted
        assert_eq!(reconciler.on_decrypted(&fx.event("$1", "@bob:x", "🎉"), &fx.ctx()).len(), 1);
        assert!(reconciler.on_decrypted(&fx.event("$3", "@bob:x", "🎉"), &fx.ctx()).is_empty());
    }

    #[test]
    fn encryption_event_requests_trust_even_when_paginated() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        let mut event = fx.event("$1", "@bob:x", "");
        event.kind = EventKind::Encryption;

        let outcome = reconciler.on_timeline_event(&event, TimelineDelivery::paginated(), &fx.ctx()).unwrap();
        assert!(outcome.encryption_enabled);
        assert!(outcome.url_previews_changed);
    }

    #[test]
    fn reset_only_reports_new_generation() {
        let mut reconciler = TimelineReconciler::default();
        reconciler.track(TimelineId(1));

        assert!(!reconciler.on_timeline_reset(TimelineId(1)));
        assert!(reconciler.on_timeline_reset(TimelineId(2)));
        assert_eq!(reconciler.live_timeline(), Some(TimelineId(2)));
    }

    #[test]
    fn mark_read_resets_counter() {
        let fx = Fixture::new();
        let mut reconciler = TimelineReconciler::default();
        reconciler.on_timeline_event(&fx.event("$1", "@bob:x", "hi"), TimelineDelivery::live(), &fx.ctx()).unwrap();

        assert!(reconciler.mark_read());
        assert_eq!(reconciler.unread_count(), 0);
        assert!(!reconciler.mark_read());
    }

    proptest! {
        #[test]
        fn prop_effects_fire_at_most_once_per_event(
            deliveries in prop::collection::vec((0u8..8, any::<bool>()), 0..64),
        ) {
            let fx = Fixture::new();
            let mut reconciler = TimelineReconciler::new(16);
            let mut seen = HashSet::new();

            for (id, decrypted_channel) in deliveries {
                let event = fx.event(&format!("${id}"), "@bob:x", "🎉");
                let effects = if decrypted_channel {
                    reconciler.on_decrypted(&event, &fx.ctx())
                } else {
                    reconciler.on_timeline_event(&event, TimelineDelivery::live(), &fx.ctx()).unwrap().effects
                };
                let first = seen.insert(id);
                prop_assert_eq!(effects.is_empty(), !first, "event ${} effects {:?}", id, effects);
            }
        }
    }
}
