use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc};

use crate::config::FeedFormat;
use crate::models::ChangeEvent;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

/// One live client channel.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn send(&self, message: &str) -> std::result::Result<(), String>;
}

/// Channel-backed subscriber; the receiving half is drained by the client's connection task.
/// Sending fails once that task has gone away.
#[async_trait]
impl Subscriber for mpsc::UnboundedSender<String> {
    async fn send(&self, message: &str) -> std::result::Result<(), String> {
        mpsc::UnboundedSender::send(self, message.to_string())
            .map_err(|_| "subscriber channel closed".to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: Vec<SubscriberId>,
}

type SubscriberEntry = (SubscriberId, Arc<dyn Subscriber>);

/// Registry of live subscribers and fan-out point for change events.
pub struct NotificationHub {
    subscribers: RwLock<Vec<SubscriberEntry>>,
    next_id: AtomicU64,
    format: FeedFormat,
}

impl NotificationHub {
    pub fn new(format: FeedFormat) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            format,
        }
    }

    pub async fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self.subscribers.write().await;
        subscribers.push((id, subscriber));
        tracing::debug!(subscriber = id.0, total = subscribers.len(), "Subscriber registered");
        id
    }

    /// Registers a channel subscriber and hands back the receiving half.
    pub async fn subscribe_channel(&self) -> (SubscriberId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(Arc::new(tx)).await;
        (id, rx)
    }

    /// Removes a subscriber. Returns false if it was already gone.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        let removed = subscribers.len() != before;
        if removed {
            tracing::debug!(subscriber = id.0, total = subscribers.len(), "Subscriber removed");
        }
        removed
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub fn render(&self, event: &ChangeEvent) -> Result<String> {
        match self.format {
            FeedFormat::Json => Ok(serde_json::to_string(event)?),
            FeedFormat::Text => Ok(event.to_string()),
        }
    }

    /// Sends `event` to every subscriber in registration order.
    ///
    /// A subscriber whose send fails is unsubscribed; delivery to the rest continues.
    pub async fn broadcast(&self, event: &ChangeEvent) -> BroadcastReport {
        let message = match self.render(event) {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize change event");
                return BroadcastReport::default();
            }
        };

        // Sends happen outside the lock so connection tasks can still (un)subscribe.
        let snapshot: Vec<SubscriberEntry> = self.subscribers.read().await.clone();

        let mut report = BroadcastReport::default();
        for (id, subscriber) in snapshot {
            match subscriber.send(&message).await {
                Ok(()) => report.delivered += 1,
                Err(reason) => {
                    let err = AppError::Send {
                        subscriber: id.0,
                        message: reason,
                    };
                    tracing::info!(error = %err, "Dropping subscriber");
                    report.dropped.push(id);
                }
            }
        }

        for id in &report.dropped {
            self.unsubscribe(*id).await;
        }

        metrics::counter!("catalog_events_broadcast_total").increment(1);
        if !report.dropped.is_empty() {
            metrics::counter!("catalog_subscribers_dropped_total").increment(report.dropped.len() as u64);
        }

        report
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(FeedFormat::default())
    }
}
