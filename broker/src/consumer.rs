//! The long-running background worker consuming a durable queue.
//!
//! One worker owns one queue and processes its deliveries **strictly
//! sequentially**: the next message is not pulled until the previous
//! one's acknowledgment decision is made. That is what preserves the
//! broker's per-queue ordering. Throughput scales horizontally (one
//! worker per service instance sharing the queue), never by in-process
//! parallel consumption of one ordered queue.
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──► Subscribed ──► Processing ─┐
//!    ▲              ▲────────────┘        │ transient failure
//!    │ resubscribe  │                     ▼
//!    └────────── Retrying ◄───────────────┘
//!
//! shutdown signal ──► Stopping ──► Stopped
//! ```
//!
//! The current state is observable through a `watch` channel so a host
//! can report the worker unhealthy (stuck in `Retrying`) without the
//! worker ever terminating the process on its own.
//!
//! # Acknowledgment decisions
//!
//! | Outcome                              | Broker action              |
//! |--------------------------------------|----------------------------|
//! | applied / duplicate / skipped        | `ack`                      |
//! | malformed envelope (poison)          | `reject` → dead-letter     |
//! | schema violation, permanent failure  | `reject` → dead-letter     |
//! | transient failure                    | `nack(requeue)` → redeliver|
//!
//! Nothing vanishes silently: every non-acknowledged message resurfaces
//! via broker redelivery or lands on the dead-letter queue with a log
//! entry.

use crate::config::ConsumerConfig;
use crate::connection::ConnectionManager;
use crate::topology;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Channel, Consumer};
use meridian_core::envelope::EventEnvelope;
use meridian_core::error::BrokerError;
use meridian_core::processor::{Disposition, EventProcessor, ProcessError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Observable lifecycle of a [`ConsumerWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Connecting and declaring topology.
    Starting,
    /// Subscribed and waiting for the next delivery.
    Subscribed,
    /// Applying a delivery.
    Processing,
    /// Waiting out a transient failure (reconnection or redelivery).
    Retrying,
    /// Shutdown requested; releasing channel and connection.
    Stopping,
    /// Fully stopped.
    Stopped,
}

/// What ended the delivery pump.
enum PumpExit {
    /// Graceful shutdown was requested.
    Shutdown,
    /// The delivery stream ended or errored; resubscribe.
    ConnectionLost,
}

/// The consumer's decision for one delivery.
#[derive(Debug)]
pub(crate) enum Verdict {
    /// Acknowledge; the disposition says why.
    Ack(Disposition),
    /// Negative-acknowledge with requeue; the broker will redeliver.
    Requeue(String),
    /// Reject without requeue; the broker routes to the dead-letter
    /// exchange.
    DeadLetter(String),
}

/// A [`Verdict`] plus the decoded envelope (absent for poison messages).
#[derive(Debug)]
pub(crate) struct Decision {
    pub envelope: Option<EventEnvelope>,
    pub verdict: Verdict,
}

/// Decide the fate of one delivery body.
///
/// Separated from the broker mechanics so the decision table is testable
/// without a running broker.
pub(crate) async fn decide<P: EventProcessor>(processor: &P, body: &[u8]) -> Decision {
    let envelope = match EventEnvelope::from_bytes(body) {
        Ok(envelope) => envelope,
        Err(error) => {
            // Poison message: retrying deserialization can never succeed.
            return Decision {
                envelope: None,
                verdict: Verdict::DeadLetter(format!("poison message: {error}")),
            };
        }
    };

    let verdict = match processor.process(&envelope).await {
        Ok(disposition) => Verdict::Ack(disposition),
        Err(error @ ProcessError::Transient(_)) => Verdict::Requeue(error.to_string()),
        Err(error) => Verdict::DeadLetter(error.to_string()),
    };

    Decision {
        envelope: Some(envelope),
        verdict,
    }
}

/// Background worker subscribing one durable queue and applying its
/// events through an [`EventProcessor`].
///
/// # Example
///
/// ```no_run
/// use meridian_broker::{BrokerConfig, ConnectionManager, ConsumerConfig, ConsumerWorker};
/// use meridian_core::events::topics;
/// use std::sync::Arc;
///
/// # async fn example(processor: impl meridian_core::processor::EventProcessor + 'static) {
/// let connection = Arc::new(ConnectionManager::new(BrokerConfig::builder().build()));
/// let config = ConsumerConfig::builder()
///     .exchange(topics::USER_EVENTS)
///     .queue("directory.user-events")
///     .binding_key(topics::USER_BINDING)
///     .build();
///
/// let (worker, shutdown) = ConsumerWorker::new(processor, connection, config);
/// let _health = worker.state();
///
/// let handle = tokio::spawn(worker.run());
///
/// // Later, from a signal handler:
/// shutdown.send(true).ok();
/// handle.await.ok();
/// # }
/// ```
pub struct ConsumerWorker<P>
where
    P: EventProcessor,
{
    connection: Arc<ConnectionManager>,
    processor: P,
    config: ConsumerConfig,
    state: watch::Sender<WorkerState>,
    shutdown: watch::Receiver<bool>,
}

impl<P> ConsumerWorker<P>
where
    P: EventProcessor,
{
    /// Create a worker and its shutdown handle. Send `true` on the
    /// returned sender to stop the worker gracefully.
    #[must_use]
    pub fn new(
        processor: P,
        connection: Arc<ConnectionManager>,
        config: ConsumerConfig,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(WorkerState::Starting);

        let worker = Self {
            connection,
            processor,
            config,
            state: state_tx,
            shutdown: shutdown_rx,
        };

        (worker, shutdown_tx)
    }

    /// Subscribe to the worker's lifecycle state, e.g. for a health
    /// endpoint. A worker parked in [`WorkerState::Retrying`] is
    /// unhealthy but still alive.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Run until a shutdown signal arrives.
    ///
    /// Connection failures, at startup or mid-stream, put the worker in
    /// `Retrying` and it keeps attempting to resubscribe indefinitely; it
    /// never crashes the process. Already-acknowledged messages are not
    /// reprocessed after a resubscribe.
    pub async fn run(mut self) {
        tracing::info!(
            queue = %self.config.queue,
            exchange = %self.config.exchange,
            prefetch = self.config.prefetch,
            "event consumer starting"
        );

        while !self.shutdown_requested() {
            self.set_state(WorkerState::Starting);

            match self.subscribe().await {
                Ok((channel, consumer)) => {
                    self.set_state(WorkerState::Subscribed);
                    tracing::info!(queue = %self.config.queue, "subscribed");

                    match self.pump(consumer).await {
                        PumpExit::Shutdown => {
                            self.finish(channel).await;
                            return;
                        }
                        PumpExit::ConnectionLost => {
                            self.set_state(WorkerState::Retrying);
                            tracing::warn!(
                                queue = %self.config.queue,
                                "delivery stream ended; resubscribing"
                            );
                        }
                    }
                }
                Err(error) => {
                    // ensure_connected already burned through its backoff
                    // ceiling; park at the cap and try again.
                    self.set_state(WorkerState::Retrying);
                    let pause = self.connection.config().backoff.max_delay;
                    tracing::warn!(
                        queue = %self.config.queue,
                        %error,
                        pause_ms = pause.as_millis(),
                        "subscription failed; will retry"
                    );
                    if self.sleep_or_shutdown(pause).await {
                        break;
                    }
                }
            }
        }

        self.set_state(WorkerState::Stopping);
        self.set_state(WorkerState::Stopped);
        tracing::info!(queue = %self.config.queue, "event consumer stopped");
    }

    /// Connect, declare topology, and open the delivery stream.
    async fn subscribe(&self) -> Result<(Channel, Consumer), BrokerError> {
        self.connection.ensure_connected().await?;
        let channel = self.connection.open_channel().await?;

        topology::declare(&channel, &self.config).await?;

        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| BrokerError::ChannelClosed(format!("basic_qos failed: {e}")))?;

        let consumer_tag = format!("{}-worker", self.config.queue);
        let consumer = channel
            .basic_consume(
                &self.config.queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::ChannelClosed(format!("basic_consume failed: {e}")))?;

        Ok((channel, consumer))
    }

    /// Process deliveries until the stream ends or shutdown is requested.
    ///
    /// The select races the next delivery against the shutdown signal, so
    /// an in-flight delivery always reaches its ack/nack decision before
    /// shutdown is observed.
    async fn pump(&mut self, mut consumer: Consumer) -> PumpExit {
        loop {
            tokio::select! {
                delivery = consumer.next() => match delivery {
                    Some(Ok(delivery)) => {
                        self.set_state(WorkerState::Processing);
                        self.handle_delivery(delivery).await;
                    }
                    Some(Err(error)) => {
                        tracing::warn!(%error, "error receiving delivery");
                        return PumpExit::ConnectionLost;
                    }
                    None => return PumpExit::ConnectionLost,
                },
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        return PumpExit::Shutdown;
                    }
                }
            }
        }
    }

    /// Decide and acknowledge one delivery.
    async fn handle_delivery(&self, delivery: Delivery) {
        metrics::counter!("messages_received_total").increment(1);
        let redelivered = delivery.redelivered;
        let decision = decide(&self.processor, &delivery.data).await;

        let event_id = decision.envelope.as_ref().map(|e| e.event_id.to_string());
        let event_type = decision
            .envelope
            .as_ref()
            .map_or("<undecodable>", |e| e.event_type.as_str());

        match decision.verdict {
            Verdict::Ack(disposition) => {
                match disposition {
                    Disposition::Applied => {
                        metrics::counter!("messages_applied_total").increment(1);
                        tracing::info!(event_id, event_type, redelivered, "message applied");
                    }
                    Disposition::Duplicate => {
                        metrics::counter!("duplicates_suppressed_total").increment(1);
                        tracing::info!(event_id, event_type, redelivered, "duplicate suppressed");
                    }
                    Disposition::Skipped => {
                        tracing::debug!(event_id, event_type, "event type ignored");
                    }
                }
                if let Err(error) = delivery.ack(BasicAckOptions::default()).await {
                    tracing::warn!(
                        event_id,
                        %error,
                        "failed to ack; message may be redelivered"
                    );
                }
                self.set_state(WorkerState::Subscribed);
            }
            Verdict::Requeue(reason) => {
                metrics::counter!("messages_requeued_total").increment(1);
                tracing::warn!(event_id, event_type, redelivered, reason, "transient failure; requeueing");
                if let Err(error) = delivery
                    .nack(BasicNackOptions {
                        requeue: true,
                        ..BasicNackOptions::default()
                    })
                    .await
                {
                    tracing::warn!(event_id, %error, "failed to nack; broker will requeue on timeout");
                }
                self.set_state(WorkerState::Retrying);
            }
            Verdict::DeadLetter(reason) => {
                metrics::counter!("messages_dead_lettered_total").increment(1);
                tracing::error!(event_id, event_type, redelivered, reason, "message dead-lettered");
                if let Err(error) = delivery.reject(BasicRejectOptions { requeue: false }).await {
                    tracing::warn!(event_id, %error, "failed to reject; message may be redelivered");
                }
                self.set_state(WorkerState::Subscribed);
            }
        }
    }

    /// Graceful teardown, bounded by the shutdown timeout.
    ///
    /// The in-flight delivery (if any) already reached its ack/nack
    /// decision before shutdown was observed; past the bound the channel
    /// is abandoned and anything unacknowledged is left for redelivery.
    async fn finish(&self, channel: Channel) {
        self.set_state(WorkerState::Stopping);
        tracing::info!(queue = %self.config.queue, "event consumer shutting down");

        let close = async {
            if let Err(error) = channel.close(200, "consumer shutdown").await {
                tracing::debug!(%error, "error closing consumer channel");
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, close)
            .await
            .is_err()
        {
            tracing::warn!(
                queue = %self.config.queue,
                "shutdown timeout elapsed; abandoning channel, unacknowledged messages will be redelivered"
            );
        }

        self.set_state(WorkerState::Stopped);
        tracing::info!(queue = %self.config.queue, "event consumer stopped");
    }

    /// Sleep, returning early (true) if shutdown is signalled meanwhile.
    async fn sleep_or_shutdown(&mut self, pause: Duration) -> bool {
        tokio::select! {
            () = tokio::time::sleep(pause) => false,
            _ = self.shutdown.changed() => *self.shutdown.borrow(),
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: test assertions
mod tests {
    use super::*;
    use meridian_core::error::SchemaViolation;
    use serde_json::json;
    use std::future::Future;

    /// Processor returning a scripted outcome for every envelope.
    struct Scripted(fn() -> Result<Disposition, ProcessError>);

    impl EventProcessor for Scripted {
        fn process(
            &self,
            _envelope: &EventEnvelope,
        ) -> impl Future<Output = Result<Disposition, ProcessError>> + Send {
            let outcome = (self.0)();
            async move { outcome }
        }
    }

    fn body() -> Vec<u8> {
        EventEnvelope::new("user.created", json!({}))
            .to_bytes()
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_envelope_is_dead_lettered_within_one_attempt() {
        let processor = Scripted(|| Ok(Disposition::Applied));

        let decision = decide(&processor, b"not json at all").await;

        assert!(decision.envelope.is_none());
        assert!(matches!(decision.verdict, Verdict::DeadLetter(ref r) if r.contains("poison")));
    }

    #[tokio::test]
    async fn applied_and_duplicate_are_acknowledged() {
        let applied = decide(&Scripted(|| Ok(Disposition::Applied)), &body()).await;
        assert!(matches!(applied.verdict, Verdict::Ack(Disposition::Applied)));

        let duplicate = decide(&Scripted(|| Ok(Disposition::Duplicate)), &body()).await;
        assert!(matches!(
            duplicate.verdict,
            Verdict::Ack(Disposition::Duplicate)
        ));
    }

    #[tokio::test]
    async fn transient_failure_requeues() {
        let processor = Scripted(|| Err(ProcessError::Transient("store unavailable".to_string())));

        let decision = decide(&processor, &body()).await;

        assert!(matches!(decision.verdict, Verdict::Requeue(_)));
    }

    #[tokio::test]
    async fn schema_violation_is_dead_lettered() {
        let processor = Scripted(|| {
            Err(ProcessError::Schema(SchemaViolation::new(
                "user.created",
                "missing field `email`",
            )))
        });

        let decision = decide(&processor, &body()).await;

        assert!(
            matches!(decision.verdict, Verdict::DeadLetter(ref r) if r.contains("schema violation"))
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_dead_lettered() {
        let processor = Scripted(|| Err(ProcessError::Permanent("invariant violated".to_string())));

        let decision = decide(&processor, &body()).await;

        assert!(matches!(decision.verdict, Verdict::DeadLetter(_)));
    }

    #[tokio::test]
    async fn worker_exposes_initial_state() {
        let connection = Arc::new(ConnectionManager::new(
            crate::config::BrokerConfig::builder().build(),
        ));
        let config = ConsumerConfig::builder()
            .exchange("user-events")
            .queue("directory.user-events")
            .build();

        let (worker, _shutdown) = ConsumerWorker::new(
            Scripted(|| Ok(Disposition::Applied)),
            connection,
            config,
        );

        assert_eq!(*worker.state().borrow(), WorkerState::Starting);
    }
}
