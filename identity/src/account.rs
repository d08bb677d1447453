//! The account model owned by the authentication service.

use chrono::{DateTime, Utc};
use meridian_core::events::normalize_email;
use uuid::Uuid;

/// Role assigned to every newly registered account.
pub const ROLE_EMPLOYEE: &str = "Employee";

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    /// Suite-wide user identifier; becomes the event `subject`.
    pub id: Uuid,
    /// Sign-in email as entered.
    pub email: String,
    /// Uppercased, trimmed email, the unique lookup key.
    pub normalized_email: String,
    /// Display name.
    pub full_name: String,
    /// Assigned role.
    pub role: String,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account with a fresh id and the default role.
    #[must_use]
    pub fn register(email: &str, full_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            normalized_email: normalize_email(email),
            full_name: full_name.to_string(),
            role: ROLE_EMPLOYEE.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A registration request, after upstream credential handling.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    /// Sign-in email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_default_role_and_normalizes_email() {
        let account = Account::register(" Ada@Example.com ", "Ada Lovelace");
        assert_eq!(account.role, "Employee");
        assert_eq!(account.normalized_email, "ADA@EXAMPLE.COM");
    }
}
