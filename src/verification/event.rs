//! Events that drive verification

use uuid::Uuid;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// A payment transaction was broadcast and needs confirming
    Submit { session_id: Uuid, tx_id: String },

    /// The deferral before check `attempt` elapsed
    CheckDue { session_id: Uuid, attempt: u32 },

    /// Check `attempt` came back
    CheckCompleted {
        session_id: Uuid,
        attempt: u32,
        outcome: CheckOutcome,
    },

    /// Stop verifying. `None` cancels whatever session is active (teardown).
    Cancel { session_id: Option<Uuid> },
}

/// Answer from one verification check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Confirmed,
    Unconfirmed,
    /// The check itself could not run
    Failed { message: String },
}
