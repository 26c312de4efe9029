//! Bounded polling for reads that may lag behind their write
//!
//! A just-created conversation may not be visible to the next read yet. The
//! poller retries the read a fixed number of times with a fixed delay before
//! declaring the resource absent.

mod error;
mod policy;
mod session;

pub use error::ProbeError;
pub use policy::{PollPolicy, ProbeErrorPolicy};
pub use session::{PollResult, PollSession};

#[allow(unused_imports)] // Public API re-exports
pub use error::ProbeErrorKind;
#[allow(unused_imports)] // Public API re-exports
pub use policy::PolicyError;
#[allow(unused_imports)] // Public API re-exports
pub use session::{poll_until_found, AttemptOutcome, PollAttempt};

use async_trait::async_trait;
use std::sync::Arc;

/// A keyed read against a store that may not have caught up yet
#[async_trait]
pub trait ResourceLookup<T>: Send + Sync {
    /// Look the resource up once. `Ok(None)` means "not there (yet)".
    async fn fetch_once(&self, key: &str) -> Result<Option<T>, ProbeError>;
}

#[async_trait]
impl<T: Send + 'static, L: ResourceLookup<T> + ?Sized> ResourceLookup<T> for Arc<L> {
    async fn fetch_once(&self, key: &str) -> Result<Option<T>, ProbeError> {
        (**self).fetch_once(key).await
    }
}

/// Poll `lookup` for `key` under `policy`
pub async fn poll_resource<T, L>(lookup: &L, key: &str, policy: PollPolicy) -> PollResult<T>
where
    L: ResourceLookup<T> + ?Sized,
{
    PollSession::new(policy)
        .labelled(key)
        .run(move || lookup.fetch_once(key))
        .await
}
