//! The consuming seam between broker plumbing and domain services.
//!
//! The background consumer owns the broker mechanics (subscription,
//! acknowledgment, redelivery); an [`EventProcessor`] owns what an event
//! *means* locally. The processor's result tells the consumer exactly what
//! to do with the broker message:
//!
//! | Processor result                  | Consumer action                |
//! |-----------------------------------|--------------------------------|
//! | `Ok(Disposition::Applied)`        | acknowledge                    |
//! | `Ok(Disposition::Duplicate)`      | acknowledge (suppressed)       |
//! | `Ok(Disposition::Skipped)`        | acknowledge (not interested)   |
//! | `Err(ProcessError::Schema(_))`    | dead-letter, never retried     |
//! | `Err(ProcessError::Permanent(_))` | dead-letter, never retried     |
//! | `Err(ProcessError::Transient(_))` | requeue for redelivery         |
//!
//! Classifying a failure as transient or permanent is the processor's
//! responsibility because only the domain knows which is which; the
//! consumer merely translates the classification into an acknowledge,
//! requeue, or dead-letter decision.

use crate::envelope::EventEnvelope;
use crate::error::SchemaViolation;
use std::future::Future;
use thiserror::Error;

/// Outcome of successfully handling a delivered event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The event was applied to local state (and recorded in the ledger).
    Applied,
    /// The event had already been applied; nothing was reapplied.
    ///
    /// This is the normal outcome for an at-least-once redelivery, not an
    /// error.
    Duplicate,
    /// The event type is not one this processor materializes; it was
    /// acknowledged without touching local state or the ledger.
    Skipped,
}

/// A failure applying an event, classified by how the consumer should
/// react.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The payload does not satisfy its declared schema. Non-retryable.
    #[error(transparent)]
    Schema(#[from] SchemaViolation),

    /// The local store was temporarily unable to apply the event.
    /// The message is left unacknowledged and redelivered by the broker.
    #[error("transient failure applying event: {0}")]
    Transient(String),

    /// The payload unrecoverably violates a domain invariant.
    /// Retrying cannot succeed; the message is dead-lettered.
    #[error("permanent failure applying event: {0}")]
    Permanent(String),
}

impl ProcessError {
    /// Whether broker redelivery can eventually succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Applies delivered events to a service's local state.
///
/// Implementations must be idempotent across redeliveries: handling the
/// same `event_id` twice returns [`Disposition::Duplicate`] the second
/// time and leaves local state exactly as after the first application.
///
/// # Example
///
/// ```ignore
/// impl EventProcessor for UserDirectoryProcessor<S> {
///     async fn process(&self, envelope: &EventEnvelope) -> Result<Disposition, ProcessError> {
///         match envelope.event_type.as_str() {
///             "user.created" => self.apply_created(envelope).await,
///             _ => Ok(Disposition::Skipped),
///         }
///     }
/// }
/// ```
pub trait EventProcessor: Send + Sync {
    /// Apply one delivered event to local state.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError`] classified so the consumer can decide
    /// between requeue and dead-letter.
    fn process(
        &self,
        envelope: &EventEnvelope,
    ) -> impl Future<Output = Result<Disposition, ProcessError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(ProcessError::Transient("pool exhausted".to_string()).is_retryable());
        assert!(!ProcessError::Permanent("invariant".to_string()).is_retryable());
        assert!(
            !ProcessError::Schema(SchemaViolation::new("user.created", "missing `email`"))
                .is_retryable()
        );
    }
}
