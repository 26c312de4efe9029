//! Server configuration from the environment

use crate::poll::{PollPolicy, ProbeErrorPolicy};
use crate::tokens::{DEFAULT_QUOTE_URL, DEFAULT_TOKENS_URL};
use crate::verification::VerifyPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_VERIFY_URL: &str = "http://localhost:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub port: u16,
    /// Base URL of the payment-verification backend
    pub verify_url: String,
    pub tokens_url: String,
    pub quote_url: String,
    pub metadata_policy: PollPolicy,
    pub content_policy: PollPolicy,
    pub verify_policy: VerifyPolicy,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("NEUR_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.neur/neur.db"))
            },
            PathBuf::from,
        );

        let probe_errors: ProbeErrorPolicy = parsed(&lookup, "NEUR_PROBE_ERRORS");

        let metadata_policy = poll_policy(
            &lookup,
            "NEUR_METADATA_POLL_ATTEMPTS",
            "NEUR_METADATA_POLL_DELAY_MS",
            PollPolicy::metadata(),
        )
        .with_probe_errors(probe_errors);
        let content_policy = poll_policy(
            &lookup,
            "NEUR_CONTENT_POLL_ATTEMPTS",
            "NEUR_CONTENT_POLL_DELAY_MS",
            PollPolicy::content(),
        )
        .with_probe_errors(probe_errors);

        let mut verify_policy = VerifyPolicy::eap();
        if let Some(max) = positive(&lookup, "NEUR_VERIFY_MAX_ATTEMPTS") {
            verify_policy.max_attempts = max;
        }
        if let Some(ms) = parsed::<Option<u64>>(&lookup, "NEUR_VERIFY_DELAY_MS") {
            verify_policy.initial_delay = Duration::from_millis(ms);
            verify_policy.recheck_delay = Duration::from_millis(ms);
        }

        Self {
            db_path,
            port: parsed::<Option<u16>>(&lookup, "NEUR_PORT").unwrap_or(DEFAULT_PORT),
            verify_url: lookup("NEUR_VERIFY_URL").unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            tokens_url: lookup("NEUR_JUPITER_TOKENS_URL")
                .unwrap_or_else(|| DEFAULT_TOKENS_URL.to_string()),
            quote_url: lookup("NEUR_JUPITER_QUOTE_URL")
                .unwrap_or_else(|| DEFAULT_QUOTE_URL.to_string()),
            metadata_policy,
            content_policy,
            verify_policy,
        }
    }
}

/// Parse `key`, warning and falling back to `T::default()` when it is malformed
fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> T
where
    T: Default + ParseOptional,
{
    let Some(raw) = lookup(key) else {
        return T::default();
    };
    T::parse_optional(&raw).unwrap_or_else(|| {
        tracing::warn!(key, value = %raw, "Ignoring invalid configuration value");
        T::default()
    })
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u32> {
    let value = parsed::<Option<u32>>(lookup, key)?;
    if value == 0 {
        tracing::warn!(key, "Ignoring zero attempt count");
        return None;
    }
    Some(value)
}

fn poll_policy(
    lookup: &impl Fn(&str) -> Option<String>,
    attempts_key: &str,
    delay_key: &str,
    default: PollPolicy,
) -> PollPolicy {
    let attempts = positive(lookup, attempts_key).unwrap_or(default.max_attempts());
    let delay = parsed::<Option<u64>>(lookup, delay_key)
        .map_or(default.delay(), Duration::from_millis);
    PollPolicy::new(attempts, delay).unwrap_or(default)
}

/// Values a configuration string can be parsed into
trait ParseOptional: Sized {
    fn parse_optional(raw: &str) -> Option<Self>;
}

impl ParseOptional for ProbeErrorPolicy {
    fn parse_optional(raw: &str) -> Option<Self> {
        ProbeErrorPolicy::from_str(raw).ok()
    }
}

impl<T: FromStr> ParseOptional for Option<T> {
    fn parse_optional(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Some)
    }
}
