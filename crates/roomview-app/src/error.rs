//! Runtime errors.

use roomview_core::types::RoomId;
use thiserror::Error;

/// Errors that stop the runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Event source refused the room subscription.
    #[error("cannot subscribe to {room_id}: {reason}")]
    Subscribe {
        /// Room the subscription was for
        room_id: RoomId,
        /// Driver error message
        reason: String,
    },
}
