//! Runtime for driving payment verification
//!
//! One runtime task per user owns that user's state machine; handles talk to
//! it through an event channel and observe it through a watch channel.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::VerificationRuntime;
pub use traits::*;

use crate::notify::{BroadcastNotifier, NotificationSink};
use crate::verification::{Event, VerifyPolicy, VerifyState};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch, RwLock};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Transaction id must not be empty")]
    EmptyTransaction,
    #[error("Verification runtime is not running")]
    Stopped,
}

/// Handle to one verification runtime
#[derive(Clone)]
pub struct VerificationManager {
    event_tx: mpsc::Sender<Event>,
    state_rx: watch::Receiver<VerifyState>,
}

impl VerificationManager {
    /// Start a runtime in the background and return its handle
    pub fn spawn<V, N>(policy: VerifyPolicy, verifier: V, notifier: N) -> Self
    where
        V: TransactionVerifier + 'static,
        N: NotificationSink + 'static,
    {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(VerifyState::Idle);

        let runtime =
            VerificationRuntime::new(policy, verifier, notifier, event_rx, &event_tx, state_tx);
        tokio::spawn(runtime.run());

        Self { event_tx, state_rx }
    }

    /// Start verifying `tx_id`, superseding any active session
    pub async fn submit(
        &self,
        tx_id: impl Into<String>,
    ) -> Result<VerificationSession, RuntimeError> {
        let tx_id = tx_id.into();
        if tx_id.trim().is_empty() {
            return Err(RuntimeError::EmptyTransaction);
        }

        let session = VerificationSession {
            id: Uuid::new_v4(),
            tx_id,
            event_tx: self.event_tx.clone(),
        };
        self.send(Event::Submit {
            session_id: session.id,
            tx_id: session.tx_id.clone(),
        })
        .await?;
        Ok(session)
    }

    /// Cancel whatever session is active (teardown)
    pub async fn cancel_active(&self) -> Result<(), RuntimeError> {
        self.send(Event::Cancel { session_id: None }).await
    }

    /// Current state snapshot
    pub fn state(&self) -> VerifyState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes every state change
    #[allow(dead_code)] // Used in tests
    pub fn watch(&self) -> watch::Receiver<VerifyState> {
        self.state_rx.clone()
    }

    async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Stopped)
    }
}

/// One submitted verification, owned by whoever submitted it.
///
/// Dropping it does not cancel anything; call [`VerificationSession::cancel`].
pub struct VerificationSession {
    id: Uuid,
    tx_id: String,
    event_tx: mpsc::Sender<Event>,
}

#[allow(dead_code)] // Handles are held by callers that cancel on teardown
impl VerificationSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Cancel this session if it is still the active one
    pub async fn cancel(&self) -> Result<(), RuntimeError> {
        self.event_tx
            .send(Event::Cancel {
                session_id: Some(self.id),
            })
            .await
            .map_err(|_| RuntimeError::Stopped)
    }
}

/// Verification runtimes keyed by user.
///
/// A submission supersedes only the same user's active session.
pub struct VerificationRegistry {
    policy: VerifyPolicy,
    verifier: Arc<dyn TransactionVerifier>,
    notifier: Arc<BroadcastNotifier>,
    managers: RwLock<HashMap<String, VerificationManager>>,
}

impl VerificationRegistry {
    pub fn new(
        policy: VerifyPolicy,
        verifier: Arc<dyn TransactionVerifier>,
        notifier: Arc<BroadcastNotifier>,
    ) -> Self {
        Self {
            policy,
            verifier,
            notifier,
            managers: RwLock::new(HashMap::new()),
        }
    }

    /// Start verifying `tx_id` for `user_id`
    pub async fn submit(
        &self,
        user_id: &str,
        tx_id: impl Into<String>,
    ) -> Result<VerificationSession, RuntimeError> {
        let tx_id = tx_id.into();
        if tx_id.trim().is_empty() {
            return Err(RuntimeError::EmptyTransaction);
        }
        self.get_or_create(user_id).await.submit(tx_id).await
    }

    /// Cancel the user's active session, if any
    pub async fn cancel_active(&self, user_id: &str) -> Result<(), RuntimeError> {
        let manager = self.managers.read().await.get(user_id).cloned();
        match manager {
            Some(manager) => manager.cancel_active().await,
            None => Ok(()),
        }
    }

    /// State of the user's verification; `Idle` for users who never submitted
    pub async fn state(&self, user_id: &str) -> VerifyState {
        self.managers
            .read()
            .await
            .get(user_id)
            .map_or(VerifyState::Idle, VerificationManager::state)
    }

    #[allow(dead_code)] // Used in tests
    pub async fn watch(&self, user_id: &str) -> watch::Receiver<VerifyState> {
        self.get_or_create(user_id).await.watch()
    }

    /// Teardown: cancel every user's active session
    pub async fn cancel_all(&self) {
        let managers: Vec<(String, VerificationManager)> = self
            .managers
            .read()
            .await
            .iter()
            .map(|(user, manager)| (user.clone(), manager.clone()))
            .collect();

        for (user_id, manager) in managers {
            if let Err(e) = manager.cancel_active().await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to cancel verification");
            }
        }
    }

    async fn get_or_create(&self, user_id: &str) -> VerificationManager {
        if let Some(manager) = self.managers.read().await.get(user_id) {
            return manager.clone();
        }

        let mut managers = self.managers.write().await;
        managers
            .entry(user_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(user_id = %user_id, "Starting verification runtime for user");
                VerificationManager::spawn(
                    self.policy,
                    Arc::clone(&self.verifier),
                    self.notifier.for_user(user_id),
                )
            })
            .clone()
    }
}
