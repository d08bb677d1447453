//! Recording event sink for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure tolerates lock poisoning by panic

use meridian_core::envelope::EventEnvelope;
use meridian_core::error::{BrokerError, PublishError};
use meridian_core::sink::EventSink;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An [`EventSink`] that records every publish instead of talking to a
/// broker, optionally failing each attempt to simulate an outage.
///
/// # Example
///
/// ```
/// use meridian_testing::RecordingEventSink;
///
/// let healthy = RecordingEventSink::new();
/// let down = RecordingEventSink::failing();
/// assert_eq!(healthy.attempts(), 0);
/// # let _ = down;
/// ```
#[derive(Default)]
pub struct RecordingEventSink {
    fail: bool,
    published: Mutex<Vec<EventEnvelope>>,
    attempts: AtomicUsize,
}

impl RecordingEventSink {
    /// A sink that accepts and records every publish.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that fails every publish as if the broker were unreachable.
    /// Attempts are still counted.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Envelopes successfully published so far.
    #[must_use]
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().unwrap().clone()
    }

    /// Publish attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl EventSink for RecordingEventSink {
    fn publish(
        &self,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(PublishError::Broker(BrokerError::Unreachable(
                "simulated broker outage".to_string(),
            )))
        } else {
            self.published.lock().unwrap().push(envelope.clone());
            Ok(())
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_successful_publishes() {
        let sink = RecordingEventSink::new();
        let envelope = EventEnvelope::new("user.created", json!({}));

        sink.publish(&envelope).await.unwrap();

        assert_eq!(sink.attempts(), 1);
        assert_eq!(sink.published().len(), 1);
    }

    #[tokio::test]
    async fn failing_sink_counts_attempts_but_records_nothing() {
        let sink = RecordingEventSink::failing();
        let envelope = EventEnvelope::new("user.created", json!({}));

        assert!(sink.publish(&envelope).await.is_err());

        assert_eq!(sink.attempts(), 1);
        assert!(sink.published().is_empty());
    }
}
