//! Effects produced by state transitions

use crate::notify::Notification;
use std::time::Duration;
use uuid::Uuid;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Drop any pending timer or in-flight check
    CancelPending,

    /// Arm a timer that delivers `CheckDue` after `delay`
    ScheduleCheck {
        session_id: Uuid,
        attempt: u32,
        delay: Duration,
    },

    /// Ask the verification backend about `tx_id`
    RunCheck {
        session_id: Uuid,
        tx_id: String,
        attempt: u32,
    },

    /// Tell the user
    Notify(Notification),
}

impl Effect {
    pub fn notify_verified() -> Self {
        Effect::Notify(Notification::purchase_verified())
    }

    pub fn notify_timeout() -> Self {
        Effect::Notify(Notification::verification_timeout())
    }
}
