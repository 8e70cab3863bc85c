//! Trust shield and permission evaluation.
//!
//! Both are recomputed from scratch on every trigger. The shield computation
//! itself is delegated to the crypto layer; results are tagged with a
//! generation so only the answer to the latest request is ever written.

use serde::{Deserialize, Serialize};

use crate::{
    error::TrustError,
    room::{EVENT_MESSAGE, EVENT_REACTION, EVENT_REDACTION, RoomHandle},
    types::UserId,
};

/// Composite encryption shield of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    /// Not computed (unencrypted room, or not yet known)
    #[default]
    Unknown,
    /// Safety cannot be proven
    Warning,
    /// Every device is verified
    Verified,
    /// Encrypted, nothing alarming, not fully verified
    Normal,
}

/// Permission triple of the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    /// May send messages
    pub can_send: bool,
    /// May react (joined and authorized for reactions)
    pub can_react: bool,
    /// May redact own events
    pub can_self_redact: bool,
}

impl Permissions {
    /// Computes all three capabilities together from one room snapshot.
    pub fn compute(room: &RoomHandle, me: &UserId) -> Self {
        Self {
            can_send: room.may_send_event(EVENT_MESSAGE, me),
            can_react: room.may_send_event(EVENT_REACTION, me),
            can_self_redact: room.may_send_event(EVENT_REDACTION, me),
        }
    }

    /// No capabilities (no room object).
    pub fn none() -> Self {
        Self::default()
    }
}

/// What caused a trust recomputation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustTrigger {
    /// Room was loaded
    RoomLoaded,
    /// Local user's membership changed
    Membership,
    /// Room member list changed
    Members,
    /// Encryption was enabled in the room
    EncryptionEnabled,
    /// A user's device verification changed
    DeviceVerification(UserId),
    /// A user's cross-signing trust changed
    UserTrust(UserId),
    /// Local cross-signing keys changed
    CrossSigningKeys,
    /// Key backup status changed
    KeyBackup,
}

impl TrustTrigger {
    /// Whether the trigger concerns `room`.
    ///
    /// Per-user triggers only count when that user is a current member.
    pub fn concerns(&self, room: &RoomHandle) -> bool {
        match self {
            Self::DeviceVerification(user) | Self::UserTrust(user) => room.is_member(user),
            _ => true,
        }
    }
}

/// What the caller must do after [`TrustEvaluator::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShieldStep {
    /// Status was settled locally
    Settled(TrustStatus),
    /// Ask the crypto layer, tagging the request with `generation`
    Compute {
        /// Generation the answer must carry
        generation: u64,
    },
}

/// Shield status evaluator.
#[derive(Debug, Clone, Default)]
pub struct TrustEvaluator {
    status: TrustStatus,
    generation: u64,
}

impl TrustEvaluator {
    /// Evaluator with no status.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> TrustStatus {
        self.status
    }

    /// Latest request generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a recomputation. Every call supersedes earlier requests.
    pub fn evaluate(&mut self, room: &RoomHandle, crypto_enabled: bool) -> ShieldStep {
        self.generation += 1;

        if !room.encrypted {
            self.status = TrustStatus::Unknown;
            return ShieldStep::Settled(self.status);
        }
        if !crypto_enabled {
            self.status = TrustStatus::Warning;
            return ShieldStep::Settled(self.status);
        }

        ShieldStep::Compute { generation: self.generation }
    }

    /// Applies a shield answer. Returns whether it was written.
    ///
    /// Stale generations are dropped. Failures and `Unknown` answers fail
    /// closed to `Warning`.
    pub fn on_computed(&mut self, generation: u64, result: Result<TrustStatus, TrustError>) -> bool {
        if generation != self.generation {
            return false;
        }

        self.status = match result {
            Ok(TrustStatus::Unknown) | Err(_) => TrustStatus::Warning,
            Ok(status) => status,
        };
        true
    }
}
