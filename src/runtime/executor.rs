//! Verification runtime executor
//!
//! Owns the state machine, processes one event at a time and executes the
//! effects each transition returns. Timers and checks run as spawned tasks
//! that report back through the event channel.

use super::traits::TransactionVerifier;
use crate::notify::NotificationSink;
use crate::verification::{
    transition, CheckOutcome, Effect, Event, TransitionError, VerifyPolicy, VerifyState,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic verification runtime that can work with any verifier and sink
pub struct VerificationRuntime<V, N>
where
    V: TransactionVerifier + 'static,
    N: NotificationSink + 'static,
{
    policy: VerifyPolicy,
    state: VerifyState,
    verifier: Arc<V>,
    notifier: N,
    event_rx: mpsc::Receiver<Event>,
    /// Weak so the loop ends once every handle is dropped
    event_tx: mpsc::WeakSender<Event>,
    state_tx: watch::Sender<VerifyState>,
    /// Token for the armed timer or in-flight check of the active session
    pending: Option<CancellationToken>,
}

impl<V, N> VerificationRuntime<V, N>
where
    V: TransactionVerifier + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        policy: VerifyPolicy,
        verifier: V,
        notifier: N,
        event_rx: mpsc::Receiver<Event>,
        event_tx: &mpsc::Sender<Event>,
        state_tx: watch::Sender<VerifyState>,
    ) -> Self {
        Self {
            policy,
            state: VerifyState::Idle,
            verifier: Arc::new(verifier),
            notifier,
            event_rx,
            event_tx: event_tx.downgrade(),
            state_tx,
            pending: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            max_attempts = self.policy.max_attempts,
            "Starting verification runtime"
        );

        // Process events in a loop - no recursion
        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        self.cancel_pending();
        tracing::info!("Verification runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        match transition(&self.state, &self.policy, event) {
            Ok(result) => {
                self.log_transition(&result.new_state);
                self.state = result.new_state;
                self.state_tx.send_replace(self.state.clone());
                for effect in result.effects {
                    self.execute_effect(effect);
                }
            }
            Err(TransitionError::StaleEvent) => {
                tracing::debug!("Dropping event from an inactive session");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Rejected verification event");
            }
        }
    }

    fn log_transition(&self, next: &VerifyState) {
        match (&self.state, next) {
            (
                VerifyState::Verifying {
                    session_id: old, ..
                },
                VerifyState::Verifying {
                    session_id: new,
                    tx_id,
                    attempts: 0,
                },
            ) if old != new => {
                tracing::info!(
                    superseded = %old,
                    session_id = %new,
                    tx_id = %tx_id,
                    "Superseding active verification"
                );
            }
            (
                _,
                VerifyState::Verifying {
                    session_id,
                    tx_id,
                    attempts: 0,
                },
            ) => {
                tracing::info!(session_id = %session_id, tx_id = %tx_id, "Verification started");
            }
            (_, VerifyState::Confirmed { tx_id, attempts, .. }) => {
                tracing::info!(tx_id = %tx_id, attempts, "Transaction confirmed");
            }
            (_, VerifyState::TimedOut { tx_id, attempts, .. }) => {
                tracing::warn!(tx_id = %tx_id, attempts, "Verification timed out");
            }
            (VerifyState::Verifying { tx_id, .. }, VerifyState::Idle) => {
                tracing::info!(tx_id = %tx_id, "Verification cancelled");
            }
            _ => {}
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::CancelPending => self.cancel_pending(),

            Effect::ScheduleCheck {
                session_id,
                attempt,
                delay,
            } => {
                let token = self.arm();
                let Some(event_tx) = self.event_tx.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    tokio::select! {
                        () = token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::CheckDue { session_id, attempt }).await;
                        }
                    }
                });
            }

            Effect::RunCheck {
                session_id,
                tx_id,
                attempt,
            } => {
                let token = self.arm();
                let Some(event_tx) = self.event_tx.upgrade() else {
                    return;
                };
                let verifier = Arc::clone(&self.verifier);
                tokio::spawn(async move {
                    let outcome = tokio::select! {
                        () = token.cancelled() => return,
                        result = verifier.verify(&tx_id) => match result {
                            Ok(response) if response.success => CheckOutcome::Confirmed,
                            Ok(_) => CheckOutcome::Unconfirmed,
                            Err(e) => {
                                tracing::warn!(tx_id = %tx_id, attempt, error = %e, "Verification check failed");
                                CheckOutcome::Failed { message: e.to_string() }
                            }
                        },
                    };
                    tracing::debug!(tx_id = %tx_id, attempt, ?outcome, "Verification check finished");
                    let _ = event_tx
                        .send(Event::CheckCompleted {
                            session_id,
                            attempt,
                            outcome,
                        })
                        .await;
                });
            }

            Effect::Notify(notification) => self.notifier.notify(notification),
        }
    }

    /// Replace the pending token with a fresh one and return a clone
    fn arm(&mut self) -> CancellationToken {
        self.cancel_pending();
        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        token
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}
