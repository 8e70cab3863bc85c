//! Controller errors.

use roomview_core::layout::MainContent;
use thiserror::Error;

/// Operations rejected in the controller's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Operation needs a resolved room id
    #[error("cannot {operation}: room not resolved")]
    Unresolved {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Operation needs a room object
    #[error("cannot {operation}: room not loaded")]
    NoRoom {
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Search needs the timeline in the main area
    #[error("cannot search while the main area shows {content:?}")]
    SearchUnavailable {
        /// Current main content
        content: MainContent,
    },

    /// Invite rejection needs a pending invite
    #[error("no pending invite to reject")]
    NoInvite,
}
