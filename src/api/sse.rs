//! Server-Sent Events support for notifications

use crate::notify::{Delivery, Notification};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a notification subscription to an SSE stream of `user_id`'s deliveries
pub fn sse_stream(
    broadcast_rx: broadcast::Receiver<Delivery>,
    user_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let notifications = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(delivery) if delivery.user_id == user_id => {
            Some(Ok(notification_to_event(&delivery.notification)))
        }
        _ => None, // Skip other users' deliveries and lagged messages
    });

    Sse::new(notifications).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn notification_to_event(notification: &Notification) -> Event {
    let data = serde_json::to_string(notification).unwrap_or_default();
    Event::default().event("notification").data(data)
}

