//! Main content layout arbitration.
//!
//! Decides what occupies the main viewing area. Priority is call, then
//! maximised widget, then the plain timeline.

use serde::{Deserialize, Serialize};

use crate::types::CallId;

/// Occupant of the main viewing area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainContent {
    /// Message timeline
    #[default]
    Timeline,
    /// A widget maximised over the timeline
    MaximisedWidget,
    /// The room's call
    Call,
}

/// Inputs of the main content decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutInputs {
    /// Room is a designated video room
    pub is_video_room: bool,
    /// A call is being viewed (group calls enabled)
    pub viewing_call: bool,
    /// Room has a maximised pinned widget
    pub has_maximised_widget: bool,
}

/// Pure main content decision.
pub fn arbitrate(inputs: LayoutInputs) -> MainContent {
    if inputs.viewing_call || inputs.is_video_room {
        MainContent::Call
    } else if inputs.has_maximised_widget {
        MainContent::MaximisedWidget
    } else {
        MainContent::Timeline
    }
}

/// Widget layout of the room, as reported by the widget layout store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WidgetLayout {
    /// A widget is maximised in the center container
    pub has_maximised_widget: bool,
    /// Widgets are pinned to the top container
    pub top_widgets: usize,
    /// User collapsed the apps drawer
    pub apps_drawer_hidden: bool,
}

impl WidgetLayout {
    /// Whether the apps drawer is shown.
    pub fn show_apps(&self) -> bool {
        self.top_widgets > 0 && !self.apps_drawer_hidden
    }
}

/// Phase shown by the right panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RightPanelPhase {
    /// Room summary card
    #[default]
    RoomSummary,
    /// Mirror of the room timeline
    Timeline,
    /// Anything else (member list, thread, ...)
    Other,
}

/// Right panel as reported by the right panel store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RightPanelView {
    /// Panel is open
    pub open: bool,
    /// Phase on top of the panel's card stack
    pub phase: RightPanelPhase,
}

/// Right panel change requested by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelCommand {
    /// Show the timeline mirror in the right panel
    ShowTimeline,
    /// Replace the timeline mirror with the summary and close the panel
    DemoteToSummary,
}

/// Result of a layout recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutChange {
    /// Main content changed
    pub content_changed: bool,
    /// Right panel change to apply
    pub panel: Option<PanelCommand>,
}

/// Stateful layout arbiter.
#[derive(Debug, Clone, Default)]
pub struct LayoutArbiter {
    content: MainContent,
    widgets: WidgetLayout,
    viewing_call: bool,
    active_call: Option<CallId>,
}

impl LayoutArbiter {
    /// Arbiter showing the timeline.
    pub fn new(viewing_call: bool) -> Self {
        Self { viewing_call, ..Self::default() }
    }

    /// Current main content.
    pub fn content(&self) -> MainContent {
        self.content
    }

    /// Current widget layout.
    pub fn widgets(&self) -> WidgetLayout {
        self.widgets
    }

    /// Whether a call is being viewed.
    pub fn viewing_call(&self) -> bool {
        self.viewing_call
    }

    /// Active call of the room.
    pub fn active_call(&self) -> Option<&CallId> {
        self.active_call.as_ref()
    }

    /// Records a widget layout update.
    pub fn set_widgets(&mut self, widgets: WidgetLayout) {
        self.widgets = widgets;
    }

    /// Records whether the call is being viewed.
    pub fn set_viewing_call(&mut self, viewing: bool) {
        self.viewing_call = viewing;
    }

    /// Records the room's active call.
    ///
    /// Returns true if the call ended while being viewed; the caller must
    /// stop viewing it.
    pub fn set_active_call(&mut self, call: Option<CallId>) -> bool {
        self.active_call = call;
        if self.active_call.is_none() && self.viewing_call {
            self.viewing_call = false;
            return true;
        }
        false
    }

    /// Recomputes the main content.
    ///
    /// Flipping back to the timeline while the open right panel mirrors the
    /// timeline demotes the panel to the summary.
    pub fn recompute(&mut self, is_video_room: bool, group_calls: bool, panel: RightPanelView) -> LayoutChange {
        let next = arbitrate(LayoutInputs {
            is_video_room,
            viewing_call: group_calls && self.viewing_call,
            has_maximised_widget: self.widgets.has_maximised_widget,
        });
        let previous = std::mem::replace(&mut self.content, next);

        let panel = (previous != MainContent::Timeline
            && next == MainContent::Timeline
            && panel.open
            && panel.phase == RightPanelPhase::Timeline)
            .then_some(PanelCommand::DemoteToSummary);

        LayoutChange { content_changed: previous != next, panel }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order() {
        let all = LayoutInputs { is_video_room: false, viewing_call: true, has_maximised_widget: true };
        assert_eq!(arbitrate(all), MainContent::Call);

        let video = LayoutInputs { is_video_room: true, ..LayoutInputs::default() };
        assert_eq!(arbitrate(video), MainContent::Call);

        let widget = LayoutInputs { has_maximised_widget: true, ..LayoutInputs::default() };
        assert_eq!(arbitrate(widget), MainContent::MaximisedWidget);

        assert_eq!(arbitrate(LayoutInputs::default()), MainContent::Timeline);
    }

    #[test]
    fn viewing_call_requires_group_calls() {
        let mut layout = LayoutArbiter::new(true);
        layout.recompute(false, false, RightPanelView::default());
        assert_eq!(layout.content(), MainContent::Timeline);

        layout.recompute(false, true, RightPanelView::default());
        assert_eq!(layout.content(), MainContent::Call);
    }

    #[test]
    fn returning_to_timeline_demotes_mirror() {
        let mut layout = LayoutArbiter::new(false);
        layout.set_widgets(WidgetLayout { has_maximised_widget: true, ..WidgetLayout::default() });
        let change = layout.recompute(false, false, RightPanelView::default());
        assert!(change.content_changed);
        assert_eq!(change.panel, None);

        layout.set_widgets(WidgetLayout::default());
        let mirror = RightPanelView { open: true, phase: RightPanelPhase::Timeline };
        let change = layout.recompute(false, false, mirror);
        assert_eq!(change.panel, Some(PanelCommand::DemoteToSummary));
    }

    #[test]
    fn other_panels_are_left_alone() {
        let mut layout = LayoutArbiter::new(false);
        layout.set_widgets(WidgetLayout { has_maximised_widget: true, ..WidgetLayout::default() });
        layout.recompute(false, false, RightPanelView::default());

        layout.set_widgets(WidgetLayout::default());
        let members = RightPanelView { open: true, phase: RightPanelPhase::Other };
        assert_eq!(layout.recompute(false, false, members).panel, None);
    }

    #[test]
    fn closed_mirror_is_not_demoted() {
        let mut layout = LayoutArbiter::new(false);
        layout.set_widgets(WidgetLayout { has_maximised_widget: true, ..WidgetLayout::default() });
        layout.recompute(false, false, RightPanelView::default());

        layout.set_widgets(WidgetLayout::default());
        let closed = RightPanelView { open: false, phase: RightPanelPhase::Timeline };
        assert_eq!(layout.recompute(false, false, closed).panel, None);
    }

    #[test]
    fn ended_call_stops_viewing() {
        let mut layout = LayoutArbiter::new(true);
        assert!(!layout.set_active_call(Some(CallId::from("call-1"))));
        assert!(layout.set_active_call(None));
        assert!(!layout.viewing_call());
        assert!(!layout.set_active_call(None));
    }

    #[test]
    fn apps_drawer_visibility() {
        let mut widgets = WidgetLayout { top_widgets: 2, ..WidgetLayout::default() };
        assert!(widgets.show_apps());
        widgets.apps_drawer_hidden = true;
        assert!(!widgets.show_apps());
    }
}
