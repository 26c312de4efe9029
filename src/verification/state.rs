//! Verification state types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Retry policy for transaction verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    /// Checks performed before giving up
    pub max_attempts: u32,
    /// Deferral before the first check
    pub initial_delay: Duration,
    /// Deferral before every later check
    pub recheck_delay: Duration,
}

impl VerifyPolicy {
    /// Early Access Program purchase verification
    pub const fn eap() -> Self {
        Self {
            max_attempts: 20,
            initial_delay: Duration::from_secs(3),
            recheck_delay: Duration::from_secs(3),
        }
    }
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self::eap()
    }
}

/// Verification state.
///
/// `Confirmed` and `TimedOut` are terminal: no session is active in them and
/// they only remember how the last session ended.
///
/// Terminal states do not fall back to `Idle` on their own, so the outcome
/// stays readable from the status route until the next submit. A submit
/// from a terminal state behaves exactly like one from `Idle`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VerifyState {
    #[default]
    Idle,

    Verifying {
        session_id: Uuid,
        tx_id: String,
        /// Checks completed so far
        attempts: u32,
    },

    Confirmed {
        session_id: Uuid,
        tx_id: String,
        attempts: u32,
    },

    TimedOut {
        session_id: Uuid,
        tx_id: String,
        attempts: u32,
    },
}

impl VerifyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VerifyState::Confirmed { .. } | VerifyState::TimedOut { .. })
    }

    /// Transaction currently being verified, if any
    pub fn active_tx(&self) -> Option<&str> {
        match self {
            VerifyState::Verifying { tx_id, .. } => Some(tx_id),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            VerifyState::Idle => None,
            VerifyState::Verifying { session_id, .. }
            | VerifyState::Confirmed { session_id, .. }
            | VerifyState::TimedOut { session_id, .. } => Some(*session_id),
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            VerifyState::Idle => 0,
            VerifyState::Verifying { attempts, .. }
            | VerifyState::Confirmed { attempts, .. }
            | VerifyState::TimedOut { attempts, .. } => *attempts,
        }
    }
}
