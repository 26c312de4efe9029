//! Pure state transition function
//!
//! Given the same state, policy and event this always produces the same new
//! state and effects. Timers, network calls and notifications happen in the
//! runtime that executes the effects.

use super::{CheckOutcome, Effect, Event, VerifyPolicy, VerifyState};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: VerifyState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: VerifyState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Transaction id must not be empty")]
    EmptyTransaction,
    /// Timer or check result from a session that is no longer active
    #[error("Stale event for a superseded or finished session")]
    StaleEvent,
}

pub fn transition(
    state: &VerifyState,
    policy: &VerifyPolicy,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Session start (supersedes any active session)
        // ============================================================
        (_, Event::Submit { tx_id, .. }) if tx_id.trim().is_empty() => {
            Err(TransitionError::EmptyTransaction)
        }

        (_, Event::Submit { session_id, tx_id }) => {
            Ok(TransitionResult::new(VerifyState::Verifying {
                session_id,
                tx_id,
                attempts: 0,
            })
            .with_effect(Effect::CancelPending)
            .with_effect(Effect::ScheduleCheck {
                session_id,
                attempt: 1,
                delay: policy.initial_delay,
            }))
        }

        // ============================================================
        // Timer fired -> run the check
        // ============================================================
        (
            VerifyState::Verifying {
                session_id,
                tx_id,
                attempts,
            },
            Event::CheckDue {
                session_id: due_session,
                attempt,
            },
        ) if *session_id == due_session && attempt == attempts + 1 => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::RunCheck {
                session_id: *session_id,
                tx_id: tx_id.clone(),
                attempt,
            }))
        }

        // ============================================================
        // Check answered
        // ============================================================
        (
            VerifyState::Verifying {
                session_id,
                tx_id,
                attempts,
            },
            Event::CheckCompleted {
                session_id: checked_session,
                attempt,
                outcome,
            },
        ) if *session_id == checked_session && attempt == attempts + 1 => {
            let session_id = *session_id;
            let tx_id = tx_id.clone();

            match outcome {
                CheckOutcome::Confirmed => Ok(TransitionResult::new(VerifyState::Confirmed {
                    session_id,
                    tx_id,
                    attempts: attempt,
                })
                .with_effect(Effect::notify_verified())),

                // Unconfirmed and failed checks are both inconclusive
                CheckOutcome::Unconfirmed | CheckOutcome::Failed { .. }
                    if attempt >= policy.max_attempts =>
                {
                    Ok(TransitionResult::new(VerifyState::TimedOut {
                        session_id,
                        tx_id,
                        attempts: attempt,
                    })
                    .with_effect(Effect::notify_timeout()))
                }

                CheckOutcome::Unconfirmed | CheckOutcome::Failed { .. } => {
                    Ok(TransitionResult::new(VerifyState::Verifying {
                        session_id,
                        tx_id,
                        attempts: attempt,
                    })
                    .with_effect(Effect::ScheduleCheck {
                        session_id,
                        attempt: attempt + 1,
                        delay: policy.recheck_delay,
                    }))
                }
            }
        }

        // ============================================================
        // Cancellation (teardown)
        // ============================================================
        (VerifyState::Verifying { session_id, .. }, Event::Cancel { session_id: target })
            if target.map_or(true, |t| t == *session_id) =>
        {
            Ok(TransitionResult::new(VerifyState::Idle).with_effect(Effect::CancelPending))
        }

        (VerifyState::Verifying { .. }, Event::Cancel { .. }) => Err(TransitionError::StaleEvent),

        // Nothing active: cancelling is a no-op
        (_, Event::Cancel { .. }) => Ok(TransitionResult::new(state.clone())),

        // ============================================================
        // Anything else belongs to a session that is gone
        // ============================================================
        (_, Event::CheckDue { .. } | Event::CheckCompleted { .. }) => {
            Err(TransitionError::StaleEvent)
        }
    }
}
