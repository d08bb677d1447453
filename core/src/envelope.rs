//! The wire envelope carrying a domain event between services.
//!
//! Envelopes are serialized as JSON with stable, named fields so that
//! consumers built against an older schema keep working when producers add
//! fields: decoding is lenient (unknown fields ignored), while extracting
//! a typed payload for a declared event type is strict about *required*
//! fields and fails with [`SchemaViolation`].
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "eventId": "5f7b0b2e-...",
//!   "eventType": "user.created",
//!   "occurredAt": "2026-01-15T09:30:00Z",
//!   "payload": { "subject": "...", "email": "a@x.com", ... }
//! }
//! ```

use crate::error::{SchemaViolation, WireError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use uuid::Uuid;

/// An immutable record of something that already happened, addressed for
/// delivery to other services.
///
/// # Identity
///
/// `event_id` is assigned once at construction and never reused across
/// distinct logical occurrences. Two envelopes with the same `event_id`
/// represent the *same* occurrence: a redelivery, which consumers
/// suppress via their processed-event ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Globally unique event identity, the idempotency key.
    pub event_id: Uuid,

    /// Discriminator for the payload schema, e.g. `"user.created"`.
    /// Doubles as the routing key on the broker.
    pub event_type: String,

    /// When the fact occurred, ISO-8601 UTC.
    pub occurred_at: DateTime<Utc>,

    /// Type-specific payload. Extracted with [`EventEnvelope::payload_as`].
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Create a new envelope with a fresh `event_id` and the current time.
    #[must_use]
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: event_type.into(),
            occurred_at: Utc::now(),
            payload,
        }
    }

    /// Serialize the envelope for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Serialization`] if JSON encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        serde_json::to_vec(self).map_err(|e| WireError::Serialization(e.to_string()))
    }

    /// Decode an envelope from wire bytes.
    ///
    /// Decoding is lenient: fields this version does not know about are
    /// ignored. A missing required envelope field (`eventId`, `eventType`,
    /// `occurredAt`) makes the message malformed, a poison message the
    /// consumer rejects without redelivery.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Envelope`] if the bytes are not a valid
    /// envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        serde_json::from_slice(bytes).map_err(|e| WireError::Envelope(e.to_string()))
    }

    /// Extract the typed payload for the declared event type.
    ///
    /// Unknown additional payload fields are ignored; an absent or
    /// malformed required field is a [`SchemaViolation`], which the
    /// consumer treats as non-retryable.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaViolation`] naming the offending field.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, SchemaViolation> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| SchemaViolation::new(self.event_type.clone(), e.to_string()))
    }
}

impl fmt::Display for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.event_type, self.event_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: test assertions
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        subject: Uuid,
        email: String,
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = EventEnvelope::new(
            "user.created",
            json!({ "subject": Uuid::new_v4(), "email": "a@x.com" }),
        );

        let bytes = envelope.to_bytes().unwrap();
        let decoded = EventEnvelope::from_bytes(&bytes).unwrap();

        assert_eq!(decoded, envelope);
    }

    #[test]
    fn wire_fields_are_camel_case() {
        let envelope = EventEnvelope::new("user.created", json!({}));
        let text = String::from_utf8(envelope.to_bytes().unwrap()).unwrap();

        assert!(text.contains("\"eventId\""));
        assert!(text.contains("\"eventType\""));
        assert!(text.contains("\"occurredAt\""));
    }

    #[test]
    fn unknown_envelope_fields_are_ignored() {
        let bytes = serde_json::to_vec(&json!({
            "eventId": Uuid::new_v4(),
            "eventType": "user.created",
            "occurredAt": Utc::now(),
            "payload": {},
            "traceContext": "00-abc-def-01",
        }))
        .unwrap();

        let decoded = EventEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.event_type, "user.created");
    }

    #[test]
    fn missing_required_envelope_field_is_malformed() {
        let bytes = serde_json::to_vec(&json!({
            "eventType": "user.created",
            "payload": {},
        }))
        .unwrap();

        let err = EventEnvelope::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, WireError::Envelope(_)));
    }

    #[test]
    fn payload_extraction_ignores_unknown_fields() {
        let subject = Uuid::new_v4();
        let envelope = EventEnvelope::new(
            "user.created",
            json!({ "subject": subject, "email": "a@x.com", "shoeSize": 43 }),
        );

        let probe: Probe = envelope.payload_as().unwrap();
        assert_eq!(probe.subject, subject);
        assert_eq!(probe.email, "a@x.com");
    }

    #[test]
    fn missing_required_payload_field_is_schema_violation() {
        let envelope = EventEnvelope::new("user.created", json!({ "subject": Uuid::new_v4() }));

        let err = envelope.payload_as::<Probe>().unwrap_err();
        assert_eq!(err.event_type, "user.created");
        assert!(err.detail.contains("email"));
    }
}
