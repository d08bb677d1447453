//! The directory's event processor: schema extraction, invariant checks,
//! and dispatch into the atomic store.
//!
//! This is where a delivery's fate is classified. Schema violations and
//! domain-invariant violations are permanent (the consumer dead-letters);
//! store unavailability is transient (the consumer requeues); a ledger
//! hit is a duplicate (the consumer acknowledges without reapplying).

use crate::store::{ApplyOutcome, DirectoryStore};
use meridian_core::envelope::EventEnvelope;
use meridian_core::events::{UserCreated, UserDeactivated, UserUpdated};
use meridian_core::processor::{Disposition, EventProcessor, ProcessError};

impl From<ApplyOutcome> for Disposition {
    fn from(outcome: ApplyOutcome) -> Self {
        match outcome {
            ApplyOutcome::Applied => Self::Applied,
            ApplyOutcome::Duplicate => Self::Duplicate,
        }
    }
}

/// Applies the user event family to the directory projection.
///
/// Generic over the store so the same dispatch and classification logic
/// runs against Postgres in production and the in-memory store in tests.
///
/// # Example
///
/// ```
/// use meridian_directory::mocks::InMemoryDirectoryStore;
/// use meridian_directory::processor::UserDirectoryProcessor;
///
/// let processor = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());
/// ```
pub struct UserDirectoryProcessor<S>
where
    S: DirectoryStore,
{
    store: S,
}

impl<S> UserDirectoryProcessor<S>
where
    S: DirectoryStore,
{
    /// Create a processor over the given store.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    async fn apply_created(&self, envelope: &EventEnvelope) -> Result<Disposition, ProcessError> {
        let payload: UserCreated = envelope.payload_as()?;

        if payload.email.trim().is_empty() {
            return Err(ProcessError::Permanent(
                "user.created carries a blank email".to_string(),
            ));
        }
        if payload.role.trim().is_empty() {
            return Err(ProcessError::Permanent(
                "user.created carries a blank role".to_string(),
            ));
        }

        let outcome = self.store.apply_created(envelope, &payload).await?;
        Ok(outcome.into())
    }

    async fn apply_updated(&self, envelope: &EventEnvelope) -> Result<Disposition, ProcessError> {
        let payload: UserUpdated = envelope.payload_as()?;

        if matches!(&payload.email, Some(email) if email.trim().is_empty()) {
            return Err(ProcessError::Permanent(
                "user.updated carries a blank email".to_string(),
            ));
        }

        let outcome = self.store.apply_updated(envelope, &payload).await?;
        Ok(outcome.into())
    }

    async fn apply_deactivated(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<Disposition, ProcessError> {
        let payload: UserDeactivated = envelope.payload_as()?;
        let outcome = self.store.apply_deactivated(envelope, &payload).await?;
        Ok(outcome.into())
    }
}

impl<S> EventProcessor for UserDirectoryProcessor<S>
where
    S: DirectoryStore,
{
    async fn process(&self, envelope: &EventEnvelope) -> Result<Disposition, ProcessError> {
        match envelope.event_type.as_str() {
            UserCreated::EVENT_TYPE => self.apply_created(envelope).await,
            UserUpdated::EVENT_TYPE => self.apply_updated(envelope).await,
            UserDeactivated::EVENT_TYPE => self.apply_deactivated(envelope).await,
            other => {
                tracing::debug!(event_type = other, "event type not materialized here");
                Ok(Disposition::Skipped)
            }
        }
    }
}
