//! Directory error taxonomy and its transient/permanent classification.
//!
//! The consumer's requeue-or-dead-letter decision hinges on this
//! classification, so it is made explicit here, at the point of origin,
//! rather than inferred downstream:
//!
//! - [`DirectoryError::Unavailable`]: the store is temporarily down
//!   (connection, pool, io). Retryable: the message is requeued and
//!   redelivered.
//! - [`DirectoryError::Conflict`]: the event's data collides with
//!   existing directory state (e.g. another subject already owns the
//!   email). Redelivery cannot fix it: dead-letter.
//! - [`DirectoryError::Invalid`]: the payload violates a domain
//!   invariant (blank email on create, and the like). Dead-letter.

use meridian_core::processor::ProcessError;
use thiserror::Error;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// Failures raised by the directory's idempotency/upsert layer.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The local store is temporarily unavailable. Retryable.
    #[error("directory store unavailable: {0}")]
    Unavailable(String),

    /// The event conflicts with existing directory state. Not retryable.
    #[error("conflicting directory state: {0}")]
    Conflict(String),

    /// The payload violates a domain invariant. Not retryable.
    #[error("invalid event payload: {0}")]
    Invalid(String),
}

impl DirectoryError {
    /// Whether broker redelivery can eventually succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for DirectoryError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return Self::Conflict(error.to_string());
            }
        }
        Self::Unavailable(error.to_string())
    }
}

impl From<DirectoryError> for ProcessError {
    fn from(error: DirectoryError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Permanent(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_transient() {
        assert!(DirectoryError::Unavailable("pool timed out".to_string()).is_transient());
        assert!(!DirectoryError::Conflict("email taken".to_string()).is_transient());
        assert!(!DirectoryError::Invalid("blank email".to_string()).is_transient());
    }

    #[test]
    fn classification_maps_to_process_error() {
        let transient = ProcessError::from(DirectoryError::Unavailable("down".to_string()));
        assert!(transient.is_retryable());

        let permanent = ProcessError::from(DirectoryError::Invalid("blank".to_string()));
        assert!(!permanent.is_retryable());
    }
}
