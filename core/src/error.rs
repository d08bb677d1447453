//! Failure taxonomy for the synchronization subsystem.
//!
//! The taxonomy separates failures by how they are handled, not by where
//! they occur:
//!
//! - [`BrokerError`]: connection- and channel-level transport failures.
//!   `Unreachable` is retryable with backoff; `ChannelClosed` requires a
//!   channel re-open while the connection may still be healthy.
//! - [`WireError`]: envelope encode/decode failures.
//! - [`SchemaViolation`]: a payload missing or mangling a field required
//!   for its declared event type. Non-retryable; the message is routed to
//!   the dead-letter queue.
//! - [`PublishError`]: everything a publish attempt can surface.
//!
//! A *duplicate event* is deliberately not an error: it is an expected
//! control-flow outcome of at-least-once delivery, modelled as
//! [`Disposition::Duplicate`](crate::processor::Disposition::Duplicate).

use thiserror::Error;

/// Transport-level failures talking to the message broker.
#[derive(Debug, Error, Clone)]
pub enum BrokerError {
    /// The broker could not be reached within the configured timeout,
    /// or reconnection attempts were exhausted.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    /// No connection is currently established.
    #[error("not connected to broker")]
    NotConnected,

    /// The channel died; the connection may still be healthy and a new
    /// channel can be opened.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Envelope serialization failures.
#[derive(Debug, Error, Clone)]
pub enum WireError {
    /// The bytes are not a valid event envelope (missing `eventId`,
    /// `eventType`, or `occurredAt`, or not JSON at all).
    #[error("malformed event envelope: {0}")]
    Envelope(String),

    /// The event could not be serialized for the wire.
    #[error("failed to serialize event: {0}")]
    Serialization(String),
}

/// A payload that does not satisfy the schema of its declared event type.
///
/// Unknown *additional* fields are never a violation (forward
/// compatibility); only an absent or malformed *required* field is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("schema violation in '{event_type}' payload: {detail}")]
pub struct SchemaViolation {
    /// The declared event type whose schema was violated.
    pub event_type: String,
    /// What was missing or malformed.
    pub detail: String,
}

impl SchemaViolation {
    /// Create a new schema violation for the given event type.
    #[must_use]
    pub fn new(event_type: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            detail: detail.into(),
        }
    }
}

/// Failures a publish attempt can surface.
#[derive(Debug, Error, Clone)]
pub enum PublishError {
    /// The event could not be serialized.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The broker rejected or never received the publish.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// The broker negatively acknowledged the publish.
    #[error("publish not confirmed by broker for '{0}'")]
    NotConfirmed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_error_display() {
        let err = BrokerError::Unreachable("connection refused".to_string());
        assert_eq!(err.to_string(), "broker unreachable: connection refused");
    }

    #[test]
    fn schema_violation_names_field() {
        let violation = SchemaViolation::new("user.created", "missing field `email`");
        let display = violation.to_string();
        assert!(display.contains("user.created"));
        assert!(display.contains("missing field `email`"));
    }

    #[test]
    fn publish_error_wraps_broker_error() {
        let err = PublishError::from(BrokerError::NotConnected);
        assert_eq!(err.to_string(), "not connected to broker");
    }
}
