//! In-process revalidation bus.
//!
//! Backed by a `tokio::sync::broadcast` channel. Slow subscribers skip
//! signals rather than block publishers; a skipped signal is harmless since
//! any later signal for the same path triggers the same refetch.

use futures::stream;
use nomadhub_core::revalidation::{Revalidation, RevalidationBus, RevalidationStream};
use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of buffered signals per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// Revalidation bus for a single process.
#[derive(Debug, Clone)]
pub struct InMemoryRevalidationBus {
    sender: broadcast::Sender<Revalidation>,
}

impl InMemoryRevalidationBus {
    /// Bus with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Bus buffering `capacity` signals per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Current number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryRevalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RevalidationBus for InMemoryRevalidationBus {
    fn publish(&self, signal: Revalidation) {
        tracing::debug!(path = %signal.path, "Revalidation published");
        metrics::counter!("revalidations.published").increment(1);
        // No subscribers is fine
        let _ = self.sender.send(signal);
    }

    fn subscribe(&self) -> RevalidationStream {
        let receiver = self.sender.subscribe();
        Box::pin(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(signal) => return Some((signal, receiver)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Revalidation subscriber lagged");
                    },
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_subscribers_receive_signals_published_after_subscribing() {
        let bus = InMemoryRevalidationBus::new();
        bus.publish(Revalidation::path("/early"));

        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(Revalidation::path("/hubs"));
        assert_eq!(first.next().await.unwrap().path, "/hubs");
        assert_eq!(second.next().await.unwrap().path, "/hubs");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_to_recent_signals() {
        let bus = InMemoryRevalidationBus::with_capacity(2);
        let mut slow = bus.subscribe();
        for path in ["/a", "/b", "/c", "/d"] {
            bus.publish(Revalidation::path(path));
        }
        assert_eq!(slow.next().await.unwrap().path, "/c");
        assert_eq!(slow.next().await.unwrap().path, "/d");
    }

    #[tokio::test]
    async fn test_stream_ends_when_bus_is_dropped() {
        let bus = InMemoryRevalidationBus::new();
        let mut stream = bus.subscribe();
        drop(bus);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        InMemoryRevalidationBus::default().publish(Revalidation::path("/hubs"));
    }
}
