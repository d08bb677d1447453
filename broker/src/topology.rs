//! Idempotent declaration of the broker topology a consumer relies on.
//!
//! Declared on every (re)subscription so a fresh broker comes up with the
//! right shape and an existing one is unaffected:
//!
//! ```text
//! {exchange} (topic, durable)
//!     │ binding keys
//!     ▼
//! {queue} (durable, x-dead-letter-exchange = {exchange}.dead-letter)
//!
//! {exchange}.dead-letter (topic, durable)
//!     │ #
//!     ▼
//! {queue}.dead-letter (durable)
//! ```
//!
//! Messages the worker rejects without requeue are routed by the broker to
//! the dead-letter exchange and parked on the dead-letter queue for
//! inspection instead of being discarded or retried forever.

use crate::config::ConsumerConfig;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use meridian_core::error::BrokerError;

/// Declare the exchange, queue, and dead-letter pair for a consumer.
///
/// # Errors
///
/// Returns [`BrokerError::ChannelClosed`] if any declaration fails; the
/// channel is unusable afterwards and the caller should re-open one.
pub async fn declare(channel: &Channel, config: &ConsumerConfig) -> Result<(), BrokerError> {
    let durable = ExchangeDeclareOptions {
        durable: true,
        ..ExchangeDeclareOptions::default()
    };

    channel
        .exchange_declare(
            &config.exchange,
            ExchangeKind::Topic,
            durable,
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::ChannelClosed(format!("exchange declare failed: {e}")))?;

    channel
        .exchange_declare(
            &config.dead_letter_exchange,
            ExchangeKind::Topic,
            durable,
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::ChannelClosed(format!("dead-letter exchange declare failed: {e}")))?;

    let durable_queue = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };

    channel
        .queue_declare(
            &config.dead_letter_queue,
            durable_queue,
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::ChannelClosed(format!("dead-letter queue declare failed: {e}")))?;

    channel
        .queue_bind(
            &config.dead_letter_queue,
            &config.dead_letter_exchange,
            "#",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| BrokerError::ChannelClosed(format!("dead-letter queue bind failed: {e}")))?;

    // Rejected messages (requeue = false) are routed here by the broker.
    let mut queue_args = FieldTable::default();
    queue_args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(config.dead_letter_exchange.clone().into()),
    );

    channel
        .queue_declare(&config.queue, durable_queue, queue_args)
        .await
        .map_err(|e| BrokerError::ChannelClosed(format!("queue declare failed: {e}")))?;

    for binding_key in &config.binding_keys {
        channel
            .queue_bind(
                &config.queue,
                &config.exchange,
                binding_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BrokerError::ChannelClosed(format!("queue bind failed: {e}")))?;
    }

    tracing::debug!(
        exchange = %config.exchange,
        queue = %config.queue,
        dead_letter_exchange = %config.dead_letter_exchange,
        bindings = ?config.binding_keys,
        "broker topology declared"
    );

    Ok(())
}
