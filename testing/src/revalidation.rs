//! Revalidation bus that remembers every signal.

use futures::StreamExt;
use nomadhub_core::revalidation::{Revalidation, RevalidationBus, RevalidationStream};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Broadcasting bus that also keeps a log of what was published.
///
/// Subscribers behave as with the production bus, so views can be wired to
/// it in integration tests; assertions read [`RecordingRevalidationBus::paths`].
pub struct RecordingRevalidationBus {
    sender: broadcast::Sender<Revalidation>,
    published: Mutex<Vec<Revalidation>>,
}

impl Default for RecordingRevalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRevalidationBus {
    /// Empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self {
            sender,
            published: Mutex::new(Vec::new()),
        }
    }

    /// Every signal published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Revalidation> {
        self.published.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// Paths of every signal published so far.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.published().into_iter().map(|signal| signal.path).collect()
    }
}

impl RevalidationBus for RecordingRevalidationBus {
    fn publish(&self, signal: Revalidation) {
        if let Ok(mut log) = self.published.lock() {
            log.push(signal.clone());
        }
        let _ = self.sender.send(signal);
    }

    fn subscribe(&self) -> RevalidationStream {
        let receiver = self.sender.subscribe();
        futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(signal) => return Some((signal, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_forwards_signals() {
        let bus = RecordingRevalidationBus::new();
        let mut stream = bus.subscribe();

        bus.publish(Revalidation::path("/hubs"));
        bus.publish(Revalidation::path("/reviews"));

        assert_eq!(bus.paths(), vec!["/hubs", "/reviews"]);
        assert_eq!(stream.next().await, Some(Revalidation::path("/hubs")));
    }
}
