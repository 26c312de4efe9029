//! Poll policies

use std::time::Duration;
use thiserror::Error;

/// How a failed probe is interpreted by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeErrorPolicy {
    /// A failed probe counts as "not there yet" and the session keeps going
    #[default]
    TreatAsAbsent,
    /// A failed probe ends the session with `PollResult::Error`
    Propagate,
}

impl std::str::FromStr for ProbeErrorPolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absent" => Ok(Self::TreatAsAbsent),
            "propagate" => Ok(Self::Propagate),
            other => Err(PolicyError::UnknownProbePolicy(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_attempts must be greater than zero")]
    ZeroAttempts,
    #[error("Unknown probe error policy: {0} (expected `absent` or `propagate`)")]
    UnknownProbePolicy(String),
}

/// Retry policy for one poll session.
///
/// Built by the call site for each invocation; a session never mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    max_attempts: u32,
    delay: Duration,
    probe_errors: ProbeErrorPolicy,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Result<Self, PolicyError> {
        if max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            delay,
            probe_errors: ProbeErrorPolicy::TreatAsAbsent,
        })
    }

    /// Metadata generation: tolerant of a stale miss, answers quickly.
    pub const fn metadata() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(300),
            probe_errors: ProbeErrorPolicy::TreatAsAbsent,
        }
    }

    /// Content render: gates access control, so it waits longer.
    pub const fn content() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_millis(500),
            probe_errors: ProbeErrorPolicy::TreatAsAbsent,
        }
    }

    #[must_use]
    pub fn with_probe_errors(mut self, probe_errors: ProbeErrorPolicy) -> Self {
        self.probe_errors = probe_errors;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn probe_errors(&self) -> ProbeErrorPolicy {
        self.probe_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_policies() {
        let metadata = PollPolicy::metadata();
        assert_eq!(metadata.max_attempts(), 3);
        assert_eq!(metadata.delay(), Duration::from_millis(300));

        let content = PollPolicy::content();
        assert_eq!(content.max_attempts(), 5);
        assert_eq!(content.delay(), Duration::from_millis(500));
        assert_eq!(content.probe_errors(), ProbeErrorPolicy::TreatAsAbsent);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert_eq!(
            PollPolicy::new(0, Duration::ZERO),
            Err(PolicyError::ZeroAttempts)
        );
        assert!(PollPolicy::new(1, Duration::ZERO).is_ok());
    }

    #[test]
    fn test_probe_policy_parsing() {
        assert_eq!("absent".parse(), Ok(ProbeErrorPolicy::TreatAsAbsent));
        assert_eq!(" Propagate ".parse(), Ok(ProbeErrorPolicy::Propagate));
        assert!("sometimes".parse::<ProbeErrorPolicy>().is_err());
    }
}
