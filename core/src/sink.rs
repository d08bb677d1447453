//! The publishing seam, including the best-effort-after-commit policy.
//!
//! Request handlers publish events *after* their local transaction has
//! committed. At that point the business operation has already succeeded
//! and must not be reverted, so a publish failure is never propagated back
//! to the caller: [`EventSink::publish_after_commit`] records the failure
//! through the observability surface and returns. The system accepts a
//! bounded window of inconsistency between services rather than coupling
//! the primary operation's availability to the broker's.
//!
//! There is no publisher-internal retry; republishing lost events is an
//! outbox concern layered elsewhere.
//!
//! # Dyn Compatibility
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn EventSink>`), which
//! lets domain services hold a sink without knowing the transport.

use crate::envelope::EventEnvelope;
use crate::error::PublishError;
use std::future::Future;
use std::pin::Pin;

/// Delivers domain events to the message broker.
///
/// Implementations: the AMQP publisher in `meridian-broker` for
/// production, and a recording fake in `meridian-testing`.
pub trait EventSink: Send + Sync {
    /// Publish one event, reporting any failure to the caller.
    ///
    /// Used by infrastructure that has its own failure handling. Request
    /// handlers use [`EventSink::publish_after_commit`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] if serialization fails or the broker did
    /// not confirm the publish.
    fn publish(
        &self,
        envelope: &EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>>;

    /// Publish one event after a local commit; never fails.
    ///
    /// On error the failure is logged and counted
    /// (`event_publish_failures_total`) so operators can detect silent
    /// message loss, and the call returns normally: the already-committed
    /// business operation reports success to its caller regardless.
    fn publish_after_commit<'a>(
        &'a self,
        envelope: &'a EventEnvelope,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            match self.publish(envelope).await {
                Ok(()) => {
                    metrics::counter!(
                        "events_published_total",
                        "event_type" => envelope.event_type.clone()
                    )
                    .increment(1);
                }
                Err(error) => {
                    tracing::error!(
                        event_id = %envelope.event_id,
                        event_type = %envelope.event_type,
                        %error,
                        "event publish failed after local commit; downstream \
                         services will lag until the state is republished"
                    );
                    metrics::counter!(
                        "event_publish_failures_total",
                        "event_type" => envelope.event_type.clone()
                    )
                    .increment(1);
                }
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: test assertions
mod tests {
    use super::*;
    use crate::error::BrokerError;
    use serde_json::json;
    use std::sync::Mutex;

    struct FlakySink {
        fail: bool,
        attempts: Mutex<Vec<String>>,
    }

    impl EventSink for FlakySink {
        fn publish(
            &self,
            envelope: &EventEnvelope,
        ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + '_>> {
            self.attempts
                .lock()
                .unwrap()
                .push(envelope.event_type.clone());
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(PublishError::Broker(BrokerError::Unreachable(
                        "refused".to_string(),
                    )))
                } else {
                    Ok(())
                }
            })
        }
    }

    #[tokio::test]
    async fn publish_after_commit_swallows_broker_failure() {
        let sink = FlakySink {
            fail: true,
            attempts: Mutex::new(Vec::new()),
        };
        let envelope = EventEnvelope::new("user.created", json!({}));

        // Must complete without error even though the broker is down.
        sink.publish_after_commit(&envelope).await;

        assert_eq!(sink.attempts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn publish_after_commit_delivers_when_healthy() {
        let sink = FlakySink {
            fail: false,
            attempts: Mutex::new(Vec::new()),
        };
        let envelope = EventEnvelope::new("user.updated", json!({}));

        sink.publish_after_commit(&envelope).await;

        assert_eq!(
            sink.attempts.lock().unwrap().as_slice(),
            ["user.updated".to_string()]
        );
    }
}
