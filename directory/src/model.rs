//! The directory's local user projection and its merge rules.
//!
//! The merge functions are pure so the upsert semantics (create if
//! absent, overwrite only event-carried fields if present) can be tested
//! without a database and shared by the Postgres store and the in-memory
//! mock. Events are not assumed to be the sole writer of a row: a
//! `user.created` arriving for an existing entry merges instead of
//! failing.

use chrono::{DateTime, Utc};
use meridian_core::events::{UserCreated, UserUpdated, normalize_email};
use uuid::Uuid;

/// Default status for a newly materialized entry.
const STATUS_ACTIVE: &str = "Active";
/// Status for a deactivated entry.
const STATUS_INACTIVE: &str = "Inactive";
/// Role assumed when an update materializes an entry without carrying one.
const ROLE_DEFAULT: &str = "Employee";

/// One row of the user directory projection.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DirectoryUser {
    /// Suite-wide user identifier.
    pub subject: Uuid,
    /// Email address as published.
    pub email: String,
    /// Uppercased, trimmed email, the unique lookup key.
    pub normalized_email: String,
    /// Display name.
    pub full_name: String,
    /// Assigned role.
    pub role: String,
    /// Department, when known.
    pub department: Option<String>,
    /// Account status, e.g. `Active` / `Inactive`.
    pub status: String,
    /// False once the account has been deactivated.
    pub active: bool,
    /// When the entry was first materialized.
    pub created_at: DateTime<Utc>,
    /// When the entry last changed (the event's `occurred_at`).
    pub updated_at: DateTime<Utc>,
}

impl DirectoryUser {
    /// Materialize a new entry from a `user.created` event.
    #[must_use]
    pub fn from_created(payload: &UserCreated, occurred_at: DateTime<Utc>) -> Self {
        Self {
            subject: payload.subject,
            email: payload.email.clone(),
            normalized_email: normalize_email(&payload.email),
            full_name: payload.full_name.clone(),
            role: payload.role.clone(),
            department: None,
            status: STATUS_ACTIVE.to_string(),
            active: true,
            created_at: occurred_at,
            updated_at: occurred_at,
        }
    }

    /// Materialize a new entry from a `user.updated` event whose subject
    /// was never seen before (the create path of upsert).
    ///
    /// Uncarried required fields get defaults; with no email carried the
    /// subject id stands in as the unique key until a later event carries
    /// the real address.
    #[must_use]
    pub fn from_update(payload: &UserUpdated, occurred_at: DateTime<Utc>) -> Self {
        let email = payload.email.clone().unwrap_or_default();
        let normalized_email = if email.is_empty() {
            payload.subject.to_string()
        } else {
            normalize_email(&email)
        };

        Self {
            subject: payload.subject,
            email,
            normalized_email,
            full_name: payload.full_name.clone().unwrap_or_default(),
            role: payload
                .role
                .clone()
                .unwrap_or_else(|| ROLE_DEFAULT.to_string()),
            department: payload.department.clone(),
            status: payload
                .status
                .clone()
                .unwrap_or_else(|| STATUS_ACTIVE.to_string()),
            active: true,
            created_at: occurred_at,
            updated_at: occurred_at,
        }
    }

    /// Merge a `user.created` event into an already-existing entry.
    ///
    /// The event is authoritative for the fields it carries; locally
    /// accumulated fields (department, status, activity) are untouched.
    #[must_use]
    pub fn merge_created(&self, payload: &UserCreated, occurred_at: DateTime<Utc>) -> Self {
        Self {
            email: payload.email.clone(),
            normalized_email: normalize_email(&payload.email),
            full_name: payload.full_name.clone(),
            role: payload.role.clone(),
            updated_at: occurred_at,
            ..self.clone()
        }
    }

    /// Merge a `user.updated` event into an existing entry: carried
    /// fields overwrite, absent fields keep their local value
    /// (last-write-wins per field).
    #[must_use]
    pub fn merge_update(&self, payload: &UserUpdated, occurred_at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        if let Some(email) = &payload.email {
            next.email = email.clone();
            next.normalized_email = normalize_email(email);
        }
        if let Some(full_name) = &payload.full_name {
            next.full_name = full_name.clone();
        }
        if let Some(role) = &payload.role {
            next.role = role.clone();
        }
        if let Some(department) = &payload.department {
            next.department = Some(department.clone());
        }
        if let Some(status) = &payload.status {
            next.status = status.clone();
        }
        next.updated_at = occurred_at;
        next
    }

    /// Mark the entry inactive.
    #[must_use]
    pub fn deactivated(&self, occurred_at: DateTime<Utc>) -> Self {
        Self {
            status: STATUS_INACTIVE.to_string(),
            active: false,
            updated_at: occurred_at,
            ..self.clone()
        }
    }
}
