//! Error types for the room view.
//!
//! One enum per failure domain. Each domain has its own propagation rule:
//! forbidden peeks are absorbed, other peek and resolution failures are
//! terminal, join and search failures are scoped to their operation, trust
//! failures fail closed and member-load failures only degrade the view.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SettingKey;

/// Failure to turn an alias or id into a viewable room.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResolutionError {
    /// Alias or room does not exist
    #[error("room not found")]
    NotFound,

    /// Server refused to disclose the room
    #[error("access to room forbidden")]
    Forbidden,

    /// Any other failure
    #[error("room resolution failed: {0}")]
    Other(String),
}

/// Failure to peek into a room.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PeekError {
    /// Room does not allow peeking
    #[error("peeking forbidden")]
    Forbidden,

    /// Room does not allow guest access
    #[error("guest access forbidden")]
    GuestAccessForbidden,

    /// Room does not exist
    #[error("room not found")]
    NotFound,

    /// Any other failure
    #[error("peek failed: {0}")]
    Other(String),
}

impl PeekError {
    /// Returns true for the expected, non-fatal class of peek failures.
    ///
    /// These leave the view on the join prompt. Anything else is terminal.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden | Self::GuestAccessForbidden)
    }
}

impl From<PeekError> for ResolutionError {
    fn from(err: PeekError) -> Self {
        match err {
            PeekError::Forbidden | PeekError::GuestAccessForbidden => Self::Forbidden,
            PeekError::NotFound => Self::NotFound,
            PeekError::Other(reason) => Self::Other(reason),
        }
    }
}

/// Failure of a join request. The room identity stays resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum JoinError {
    /// Server refused the join
    #[error("join forbidden: {0}")]
    Forbidden(String),

    /// Request failed (network, federation, ...)
    #[error("join failed: {0}")]
    Failed(String),
}

impl JoinError {
    /// Returns true if retrying the join may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Failure to leave a room (used when rejecting an invite).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("leave failed: {reason}")]
pub struct LeaveError {
    /// Reason reported by the room store
    pub reason: String,
}

/// Failure of the trust shield computation.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("trust computation failed: {reason}")]
pub struct TrustError {
    /// Reason reported by the crypto layer
    pub reason: String,
}

/// Failure of one search session.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SearchError {
    /// Search was cancelled before completing
    #[error("search cancelled")]
    Cancelled,

    /// Search backend failed
    #[error("search failed: {0}")]
    Failed(String),
}

/// Failure to lazily load the member list.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("loading members failed: {reason}")]
pub struct MembersLoadError {
    /// Reason reported by the room store
    pub reason: String,
}

/// Failure to fetch a single event.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchEventError {
    /// Event does not exist or is not visible
    #[error("event not found")]
    NotFound,

    /// Request failed
    #[error("fetching event failed: {0}")]
    Failed(String),
}

/// Setting value did not match the setting's type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("setting {key:?} expects a {expected} value")]
pub struct SettingError {
    /// Setting that was updated
    pub key: SettingKey,
    /// Expected value type
    pub expected: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_class() {
        assert!(PeekError::Forbidden.is_forbidden());
        assert!(PeekError::GuestAccessForbidden.is_forbidden());
        assert!(!PeekError::NotFound.is_forbidden());
        assert!(!PeekError::Other("timeout".into()).is_forbidden());
    }

    #[test]
    fn peek_error_maps_to_resolution_error() {
        assert_eq!(ResolutionError::from(PeekError::NotFound), ResolutionError::NotFound);
        assert_eq!(
            ResolutionError::from(PeekError::Other("boom".into())),
            ResolutionError::Other("boom".into())
        );
    }

    #[test]
    fn display_includes_reason() {
        let err = MembersLoadError { reason: "timeout".into() };
        assert_eq!(err.to_string(), "loading members failed: timeout");
    }
}
