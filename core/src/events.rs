//! Event families published across the suite, and their payload types.
//!
//! One topic exchange carries each logical event family; the event type
//! string doubles as the routing key within the family's exchange. The
//! user family is what the directory service materializes; the finance
//! family participates through the same topology but its business rules
//! live elsewhere.
//!
//! # Schema Versioning
//!
//! Each payload has a single schema version. Consumers ignore unknown
//! fields, so additive evolution does not require a new event type.

use crate::envelope::EventEnvelope;
use crate::error::WireError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exchange and routing-key constants for the broker topology.
pub mod topics {
    /// Topic exchange for the user event family.
    pub const USER_EVENTS: &str = "user-events";

    /// Topic exchange for the finance event family.
    pub const FINANCE_EVENTS: &str = "finance-events";

    /// Binding pattern matching every event in the user family.
    pub const USER_BINDING: &str = "user.*";
}

/// A domain event that can be wrapped in an [`EventEnvelope`] for
/// publication.
///
/// Implementors are plain payload structs; the envelope supplies identity
/// (`event_id`) and time (`occurred_at`).
pub trait DomainEvent: Serialize + Send + Sync {
    /// Stable event type string, e.g. `"user.created"`. Used as the
    /// payload schema discriminator and the broker routing key.
    fn event_type(&self) -> &'static str;

    /// Wrap this event in a freshly addressed envelope.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Serialization`] if the payload cannot be
    /// serialized.
    fn to_envelope(&self) -> Result<EventEnvelope, WireError> {
        let payload =
            serde_json::to_value(self).map_err(|e| WireError::Serialization(e.to_string()))?;
        Ok(EventEnvelope::new(self.event_type(), payload))
    }
}

/// A user account was created in the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    /// Identifier of the user across the suite.
    pub subject: Uuid,
    /// Sign-in email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Role assigned at registration.
    pub role: String,
}

impl UserCreated {
    /// Stable event type string for this payload.
    pub const EVENT_TYPE: &'static str = "user.created";
}

impl DomainEvent for UserCreated {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}

/// A user's directory-relevant fields changed.
///
/// Only the carried fields are authoritative; absent fields leave the
/// consumer's local value untouched (last-write-wins per field).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdated {
    /// Identifier of the user across the suite.
    pub subject: Uuid,
    /// New email address, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New display name, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// New role, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// New department, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// New account status, if it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl UserUpdated {
    /// Stable event type string for this payload.
    pub const EVENT_TYPE: &'static str = "user.updated";
}

impl DomainEvent for UserUpdated {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}

/// A user account was deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeactivated {
    /// Identifier of the user across the suite.
    pub subject: Uuid,
}

impl UserDeactivated {
    /// Stable event type string for this payload.
    pub const EVENT_TYPE: &'static str = "user.deactivated";
}

impl DomainEvent for UserDeactivated {
    fn event_type(&self) -> &'static str {
        Self::EVENT_TYPE
    }
}

/// Normalize an email address into the directory's unique lookup key form.
///
/// Trims surrounding whitespace and uppercases, so lookups are
/// case-insensitive regardless of how the address was entered.
#[must_use]
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Panics: test assertions
mod tests {
    use super::*;

    #[test]
    fn user_created_envelope_carries_type_and_fields() {
        let event = UserCreated {
            subject: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            full_name: "A B".to_string(),
            role: "Employee".to_string(),
        };

        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event_type, "user.created");

        let decoded: UserCreated = envelope.payload_as().unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn user_updated_omits_uncarried_fields_on_the_wire() {
        let event = UserUpdated {
            subject: Uuid::new_v4(),
            full_name: Some("New Name".to_string()),
            ..UserUpdated::default()
        };

        let payload = serde_json::to_value(&event).unwrap();
        let object = payload.as_object().unwrap();
        assert!(object.contains_key("fullName"));
        assert!(!object.contains_key("email"));
        assert!(!object.contains_key("department"));
    }

    #[test]
    fn normalize_email_trims_and_uppercases() {
        assert_eq!(normalize_email("  Ada@Example.com "), "ADA@EXAMPLE.COM");
    }
}
