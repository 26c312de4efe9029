//! User-facing notifications
//!
//! A fire-and-forget channel of `{severity, title, description}` toasts.
//! Producers never read from it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn transaction_sent() -> Self {
        Self::success(
            "Transaction Sent",
            "Transaction has been sent. Verifying your purchase...",
        )
    }

    pub fn purchase_verified() -> Self {
        Self::success(
            "EAP Purchase Successful",
            "Your Early Access Program purchase has been verified. Please refresh the page.",
        )
    }

    pub fn verification_timeout() -> Self {
        Self::error(
            "Verification Timeout",
            "Please visit the FAQ page to manually verify your transaction.",
        )
    }
}

/// Sink for user-facing notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    fn notify(&self, notification: Notification) {
        (**self).notify(notification);
    }
}

/// A notification addressed to one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub user_id: String,
    pub notification: Notification,
}

/// Fans notifications out to connected streams; each stream keeps only the
/// deliveries addressed to its user
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Delivery>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }

    pub fn send_to(&self, user_id: &str, notification: Notification) {
        tracing::info!(
            user_id = %user_id,
            severity = ?notification.severity,
            title = %notification.title,
            "Notification"
        );
        // No subscribers is fine: nobody is looking at the page
        let _ = self.tx.send(Delivery {
            user_id: user_id.to_string(),
            notification,
        });
    }

    /// Sink that addresses everything to `user_id`
    pub fn for_user(self: &Arc<Self>, user_id: impl Into<String>) -> UserNotifier {
        UserNotifier {
            user_id: user_id.into(),
            hub: Arc::clone(self),
        }
    }
}

/// Notification sink bound to a single user
pub struct UserNotifier {
    user_id: String,
    hub: Arc<BroadcastNotifier>,
}

impl NotificationSink for UserNotifier {
    fn notify(&self, notification: Notification) {
        self.hub.send_to(&self.user_id, notification);
    }
}
