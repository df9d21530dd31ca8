use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::error::ErrorKind;
use crate::target::{Target, VersionId};

/// The kind of per-target or per-job progress event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Started,
    Retrying { attempt: u32, delay: Duration },
    Succeeded { duration: Duration },
    Skipped { reason: String },
    Failed { kind: ErrorKind, error_summary: String, attempts: u32 },
    /// A heartbeat carrying current job counts, emitted at least every two
    /// seconds while the job runs.
    ProgressSnapshot {
        started: u64,
        succeeded: u64,
        skipped: u64,
        failed: u64,
        total: u64,
    },
    /// Synthetic notice inserted when a subscriber's buffer overflowed and
    /// events had to be dropped for that subscriber only.
    Dropped(u64),
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub job_id: uuid::Uuid,
    pub target: Option<String>,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn for_target(job_id: uuid::Uuid, target: &Target, kind: EventKind) -> Self {
        Self {
            job_id,
            target: Some(target.label()),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn job_level(job_id: uuid::Uuid, kind: EventKind) -> Self {
        Self {
            job_id,
            target: None,
            kind,
            timestamp: Utc::now(),
        }
    }
}

struct Subscriber {
    sender: mpsc::Sender<ProgressEvent>,
    dropped: AtomicU64,
}

/// Fan-out of per-target events to an arbitrary number of subscribers.
///
/// Delivery toward subscribers is best-effort: each has a bounded buffer,
/// and on overflow the oldest events are dropped with a single
/// `EventKind::Dropped(n)` notice sent once room frees up. Delivery toward
/// the Job Store is lossless: the Dispatcher updates `JobStore` directly
/// rather than through this lossy path.
pub struct ProgressBus {
    job_id: uuid::Uuid,
    subscribers: Arc<RwLock<HashMap<u64, Subscriber>>>,
    next_subscriber_id: AtomicU64,
    default_buffer: usize,
}

impl ProgressBus {
    pub fn new(job_id: uuid::Uuid) -> Self {
        Self::with_buffer_size(job_id, 1024)
    }

    pub fn with_buffer_size(job_id: uuid::Uuid, default_buffer: usize) -> Self {
        Self {
            job_id,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_subscriber_id: AtomicU64::new(0),
            default_buffer,
        }
    }

    /// Register a new subscriber, returning a receiver and an id that can
    /// later be passed to `unsubscribe`.
    pub async fn subscribe(&self) -> (u64, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(self.default_buffer);
        let id = self.next_subscriber_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                sender: tx,
                dropped: AtomicU64::new(0),
            },
        );
        (id, rx)
    }

    /// Release all resources associated with a subscriber. The producer
    /// never blocks on a vanished subscriber: a closed channel is simply
    /// removed on the next publish.
    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.write().await.remove(&id);
    }

    /// Publish an event to every subscriber. Uses `try_send` so a slow
    /// subscriber never blocks the publisher; on `Full`, the drop counter
    /// for that subscriber increments and a `Dropped(n)` notice is queued
    /// (best-effort) once a slot is available.
    pub async fn publish(&self, kind: EventKind) {
        let event = ProgressEvent::job_level(self.job_id, kind);
        self.publish_event(event).await;
    }

    pub async fn publish_for_target(&self, target: &Target, kind: EventKind) {
        let event = ProgressEvent::for_target(self.job_id, target, kind);
        self.publish_event(event).await;
    }

    async fn publish_event(&self, event: ProgressEvent) {
        let subscribers = self.subscribers.read().await;
        let mut closed = Vec::new();

        for (id, subscriber) in subscribers.iter() {
            match subscriber.sender.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    subscriber.dropped.fetch_add(1, Ordering::SeqCst);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed.push(*id);
                }
            }
        }
        drop(subscribers);

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write().await;
            for id in closed {
                subscribers.remove(&id);
            }
        }

        self.flush_drop_notices().await;
    }

    async fn flush_drop_notices(&self) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.values() {
            let dropped = subscriber.dropped.swap(0, Ordering::SeqCst);
            if dropped > 0 {
                let notice = ProgressEvent::job_level(self.job_id, EventKind::Dropped(dropped));
                if subscriber.sender.try_send(notice).is_err() {
                    // Still full; re-accumulate for the next flush rather
                    // than blocking the publisher.
                    subscriber.dropped.fetch_add(dropped, Ordering::SeqCst);
                    warn!(job_id = %self.job_id, "progress bus subscriber still saturated, deferring drop notice");
                }
            }
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_events_to_subscribers() {
        let bus = ProgressBus::new(uuid::Uuid::nil());
        let (_, mut rx) = bus.subscribe().await;

        bus.publish(EventKind::ProgressSnapshot {
            started: 1,
            succeeded: 0,
            skipped: 0,
            failed: 0,
            total: 10,
        })
        .await;

        let event = rx.recv().await.expect("event expected");
        assert!(matches!(event.kind, EventKind::ProgressSnapshot { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery_without_blocking_publisher() {
        let bus = ProgressBus::new(uuid::Uuid::nil());
        let (id, _rx) = bus.subscribe().await;
        bus.unsubscribe(id).await;

        bus.publish(EventKind::Started).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn overflow_drops_oldest_and_emits_dropped_notice() {
        let bus = ProgressBus::with_buffer_size(uuid::Uuid::nil(), 1);
        let (_, mut rx) = bus.subscribe().await;

        // Fill the single slot, then overflow it twice.
        bus.publish(EventKind::Started).await;
        bus.publish(EventKind::Started).await;
        bus.publish(EventKind::Started).await;

        // Drain the one buffered event, freeing room for the dropped notice.
        let first = rx.recv().await.expect("event expected");
        assert!(matches!(first.kind, EventKind::Started));

        bus.publish(EventKind::Started).await;
        let notice = rx.recv().await.expect("dropped notice expected");
        assert!(matches!(notice.kind, EventKind::Dropped(n) if n >= 1));
    }
}
