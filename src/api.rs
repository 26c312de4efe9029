//! HTTP API for Neur
//!
//! Chat pages, EAP purchase verification, notifications and the token proxy.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::config::AppConfig;
use crate::db::Database;
use crate::notify::BroadcastNotifier;
use crate::poll::PollPolicy;
use crate::runtime::VerificationRegistry;
use crate::tokens::JupiterClient;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    /// Per-user verification runtimes
    pub verification: Arc<VerificationRegistry>,
    pub notifier: Arc<BroadcastNotifier>,
    pub tokens: Arc<JupiterClient>,
    /// Lookup policy for page metadata
    pub metadata_policy: PollPolicy,
    /// Lookup policy for page content
    pub content_policy: PollPolicy,
}

impl AppState {
    pub fn new(
        db: Database,
        verification: Arc<VerificationRegistry>,
        notifier: Arc<BroadcastNotifier>,
        tokens: Arc<JupiterClient>,
        config: &AppConfig,
    ) -> Self {
        Self {
            db,
            verification,
            notifier,
            tokens,
            metadata_policy: config.metadata_policy,
            content_policy: config.content_policy,
        }
    }
}
