//! Envelope builders for the user event family.
//!
//! Redelivery is simulated by processing the *same* envelope again; the
//! `event_id` is the identity of the occurrence, so a clone of the
//! envelope IS the duplicate.

use meridian_core::envelope::EventEnvelope;
use meridian_core::events::{UserCreated, UserDeactivated, UserUpdated};
use serde_json::json;
use uuid::Uuid;

/// A `user.created` envelope with sensible defaults.
#[must_use]
pub fn user_created(subject: Uuid, email: &str, full_name: &str) -> EventEnvelope {
    EventEnvelope::new(
        UserCreated::EVENT_TYPE,
        json!({
            "subject": subject,
            "email": email,
            "fullName": full_name,
            "role": "Employee",
        }),
    )
}

/// A `user.updated` envelope carrying only a new full name.
#[must_use]
pub fn user_renamed(subject: Uuid, full_name: &str) -> EventEnvelope {
    EventEnvelope::new(
        UserUpdated::EVENT_TYPE,
        json!({
            "subject": subject,
            "fullName": full_name,
        }),
    )
}

/// A `user.deactivated` envelope.
#[must_use]
pub fn user_deactivated(subject: Uuid) -> EventEnvelope {
    EventEnvelope::new(UserDeactivated::EVENT_TYPE, json!({ "subject": subject }))
}

/// A `user.created` envelope missing its required `email` field,
/// a schema violation on extraction.
#[must_use]
pub fn user_created_missing_email(subject: Uuid) -> EventEnvelope {
    EventEnvelope::new(UserCreated::EVENT_TYPE, json!({ "subject": subject }))
}
