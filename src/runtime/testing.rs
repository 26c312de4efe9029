//! Mock implementations for testing
//!
//! These mocks let the runtime run against paused tokio time without any
//! network I/O.

use super::traits::*;
use crate::eap::{VerifyError, VerifyResponse};
use crate::notify::{Notification, NotificationSink};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Mock Verifier
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Fallback {
    Answer(bool),
    Fail,
}

/// Mock verifier that returns queued answers, then a fallback
#[allow(dead_code)]
pub struct MockVerifier {
    responses: Mutex<VecDeque<Result<bool, VerifyError>>>,
    fallback: Fallback,
    latency: Duration,
    /// Record of every check as (`tx_id`, when it started)
    pub calls: Mutex<Vec<(String, Instant)>>,
}

#[allow(dead_code)]
impl MockVerifier {
    /// Answers "not yet" once the queue runs dry
    pub fn new() -> Self {
        Self::with_fallback(Fallback::Answer(false))
    }

    /// Answers "confirmed" once the queue runs dry
    pub fn confirming() -> Self {
        Self::with_fallback(Fallback::Answer(true))
    }

    /// Fails with a server error once the queue runs dry
    pub fn failing() -> Self {
        Self::with_fallback(Fallback::Fail)
    }

    fn with_fallback(fallback: Fallback) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue the answer for the next check
    pub fn queue(&self, answer: Result<bool, VerifyError>) {
        self.responses.lock().unwrap().push_back(answer);
    }

    /// Transaction ids checked, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(tx, _)| tx.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

impl Default for MockVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionVerifier for MockVerifier {
    async fn verify(&self, tx_id: &str) -> Result<VerifyResponse, VerifyError> {
        self.calls
            .lock()
            .unwrap()
            .push((tx_id.to_string(), Instant::now()));
        let answer = self.responses.lock().unwrap().pop_front();

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let answer = answer.unwrap_or(match self.fallback {
            Fallback::Answer(success) => Ok(success),
            Fallback::Fail => Err(VerifyError::Status(500)),
        });
        answer.map(|success| VerifyResponse { success })
    }
}

// ============================================================================
// Recording Notifier
// ============================================================================

/// Notifier that keeps everything it was handed
#[derive(Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.all().into_iter().map(|n| n.title).collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}
