//! Error types for account registration.

use thiserror::Error;

/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Failures raised by the identity service slice.
///
/// Note what is *not* here: broker publish failures. Publication happens
/// after the local commit and is best-effort by design, so it can never
/// surface through this type.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The email address is already registered.
    #[error("email already exists")]
    EmailTaken,

    /// The registration request is malformed.
    #[error("invalid registration: {0}")]
    Invalid(String),

    /// The account store failed.
    #[error("account store error: {0}")]
    Store(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            if db_error.is_unique_violation() {
                return Self::EmailTaken;
            }
        }
        Self::Store(error.to_string())
    }
}
