//! Probe error types

use thiserror::Error;

/// A single probe that failed to execute
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProbeError {
    pub kind: ProbeErrorKind,
    pub message: String,
}

impl ProbeError {
    pub fn new(kind: ProbeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[allow(dead_code)] // Constructor for lookups backed by remote services
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Network, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::Database, message)
    }

    #[allow(dead_code)] // Constructor for lookup implementations decoding remote payloads
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProbeErrorKind::InvalidResponse, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ProbeErrorKind::Cancelled, "Poll session cancelled")
    }
}

/// Error classification for probe failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    /// Network issues, timeouts
    Network,
    /// Backing store failed to answer
    Database,
    /// Answer arrived but could not be understood
    InvalidResponse,
    /// The owning session was cancelled
    Cancelled,
}

impl ProbeErrorKind {
    /// Whether another attempt could plausibly succeed
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Network | Self::Database)
    }
}
