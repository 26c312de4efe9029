//! Poll sessions
//!
//! A session owns its attempt counter and its cancellation token. Attempts
//! run strictly in sequence: attempt n+1 never starts before attempt n has
//! answered.

use super::{PollPolicy, ProbeError, ProbeErrorPolicy};
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// What a single probe observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Found,
    NotFound,
    /// The probe itself failed to execute
    Failed,
}

/// Record of one probe
#[derive(Debug, Clone)]
#[allow(dead_code)] // Read when inspecting a finished session
pub struct PollAttempt {
    /// 0-based attempt index
    pub index: u32,
    pub outcome: AttemptOutcome,
    pub at: DateTime<Utc>,
}

/// Terminal outcome of a poll session
#[derive(Debug)]
pub enum PollResult<T> {
    Found(T),
    /// Every attempt came back empty
    NotFound,
    Error(ProbeError),
}

#[allow(dead_code)] // Used in tests
impl<T> PollResult<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, PollResult::Found(_))
    }

    /// Collapse into an `Option`, folding errors into absence
    pub fn found(self) -> Option<T> {
        match self {
            PollResult::Found(value) => Some(value),
            PollResult::NotFound | PollResult::Error(_) => None,
        }
    }
}

/// One bounded sequence of retry attempts governed by a single policy
pub struct PollSession {
    policy: PollPolicy,
    label: String,
    attempts: Vec<PollAttempt>,
    cancel: CancellationToken,
}

impl PollSession {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            label: String::from("resource"),
            attempts: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Name used in log output for this session
    #[must_use]
    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Run the session to a terminal result.
    ///
    /// `fetch_once` answers `Ok(Some(_))` when the resource exists,
    /// `Ok(None)` when it does not (yet), and `Err(_)` when the probe itself
    /// failed. No delay follows the final attempt.
    pub async fn run<T, F, Fut>(&mut self, mut fetch_once: F) -> PollResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ProbeError>>,
    {
        let max_attempts = self.policy.max_attempts();

        for index in 0..max_attempts {
            if self.cancel.is_cancelled() {
                return PollResult::Error(ProbeError::cancelled());
            }

            match fetch_once().await {
                Ok(Some(value)) => {
                    self.record(index, AttemptOutcome::Found);
                    tracing::debug!(
                        resource = %self.label,
                        attempts = index + 1,
                        "Resource found"
                    );
                    return PollResult::Found(value);
                }
                Ok(None) => {
                    self.record(index, AttemptOutcome::NotFound);
                    tracing::debug!(
                        resource = %self.label,
                        attempt = index + 1,
                        max_attempts,
                        "Resource not available yet"
                    );
                }
                Err(e) => {
                    self.record(index, AttemptOutcome::Failed);
                    match self.policy.probe_errors() {
                        ProbeErrorPolicy::Propagate => {
                            tracing::warn!(
                                resource = %self.label,
                                attempt = index + 1,
                                error = %e,
                                "Probe failed, ending session"
                            );
                            return PollResult::Error(e);
                        }
                        ProbeErrorPolicy::TreatAsAbsent => {
                            tracing::warn!(
                                resource = %self.label,
                                attempt = index + 1,
                                error = %e,
                                transient = e.kind.is_transient(),
                                "Probe failed, treating as absent"
                            );
                        }
                    }
                }
            }

            if index + 1 < max_attempts {
                tokio::select! {
                    () = self.cancel.cancelled() => {
                        return PollResult::Error(ProbeError::cancelled());
                    }
                    () = tokio::time::sleep(self.policy.delay()) => {}
                }
            }
        }

        tracing::debug!(
            resource = %self.label,
            attempts = max_attempts,
            "Resource not found after exhausting attempts"
        );
        PollResult::NotFound
    }

    fn record(&mut self, index: u32, outcome: AttemptOutcome) {
        self.attempts.push(PollAttempt {
            index,
            outcome,
            at: Utc::now(),
        });
    }
}

/// Inspection and cancellation for whoever owns the session
#[allow(dead_code)] // Used in tests
impl PollSession {
    /// Token that cancels this session when triggered
    ///
    /// The driving context keeps this and calls `cancel()` on teardown.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn attempts(&self) -> &[PollAttempt] {
        &self.attempts
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }
}

/// Run a fresh session with `policy` against `fetch_once`
#[allow(dead_code)] // Used in tests
pub async fn poll_until_found<T, F, Fut>(policy: PollPolicy, fetch_once: F) -> PollResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, ProbeError>>,
{
    PollSession::new(policy).run(fetch_once).await
}
