//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to a room view: sync
//! deliveries, user intents, collaborator completions and the passage of
//! time. They are generated randomly by proptest or libfuzzer and applied to
//! a [`ControllerHarness`](crate::ControllerHarness), which checks the
//! invariants after every step.

use arbitrary::Arbitrary;
use roomview_core::effects::ChatEffect;

/// Small sender pool keeps the test space manageable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Sender {
    /// The local user.
    Me,
    /// Another member.
    Alice,
    /// Another member.
    Bob,
}

/// Message body, optionally carrying an effect emoji.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Body {
    /// Plain text.
    Plain,
    /// Text with confetti.
    Confetti,
    /// Text with snow.
    Snow,
}

impl Body {
    /// Text of the message.
    pub fn text(self) -> &'static str {
        match self {
            Self::Plain => "hello",
            Self::Confetti => "congrats 🎉",
            Self::Snow => "it is snowing ❄",
        }
    }

    /// Effect the body triggers, if any.
    pub fn effect(self) -> Option<ChatEffect> {
        match self {
            Self::Plain => None,
            Self::Confetti => Some(ChatEffect::Confetti),
            Self::Snow => Some(ChatEffect::Snowfall),
        }
    }
}

/// Which in-flight operation a completion step finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Completion {
    /// Oldest first.
    Oldest,
    /// Newest first.
    Newest,
}

/// Operations that can be applied to a room view.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Live timeline message.
    LiveMessage {
        /// Sender of the message.
        sender: Sender,
        /// Message body.
        body: Body,
    },

    /// Back-paginated message.
    PaginatedMessage {
        /// Message body.
        body: Body,
    },

    /// Viewport moved.
    Scroll {
        /// Viewport reached the live end.
        at_live_end: bool,
    },

    /// Server replaced the live timeline.
    TimelineReset {
        /// New generation (small to provoke repeats).
        generation: u8,
    },

    /// User asked to join.
    Join,

    /// User rejected the invite.
    RejectInvite {
        /// Also ignore the inviter.
        ignore_inviter: bool,
    },

    /// Someone else joined or left.
    MembersChanged,

    /// Client finished its initial sync.
    ClientReady,

    /// User started a search.
    Search {
        /// Search every room.
        all_rooms: bool,
    },

    /// User cancelled the search.
    CancelSearch,

    /// User toggled the search bar.
    ToggleSearch,

    /// A widget was maximised or restored.
    MaximiseWidget {
        /// Widget is maximised.
        maximised: bool,
    },

    /// Call store reported an active call or its end.
    ActiveCall {
        /// A call is active.
        active: bool,
    },

    /// User started or stopped viewing the call.
    ViewCall {
        /// Viewing the call.
        viewing: bool,
    },

    /// User asked to jump to the live end.
    JumpToLive,

    /// User asked to show an event.
    JumpToEvent {
        /// Event index (mapped to a small id pool).
        event: u8,
    },

    /// A member's device verification changed.
    DeviceVerified,

    /// URL preview setting changed.
    UrlPreviews {
        /// New value.
        enabled: bool,
    },

    /// Room notification state changed.
    NotificationState {
        /// Room is unread.
        unread: bool,
    },

    /// One in-flight collaborator operation finishes.
    Complete(Completion),

    /// Every in-flight operation finishes.
    Settle,

    /// Advance simulation time.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// The view is torn down.
    Teardown,
}
