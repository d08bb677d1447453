//! Registration: commit locally, then publish best-effort.
//!
//! The ordering is the whole design: the account insert commits first,
//! and only then is the `user.created` event constructed and handed to
//! [`EventSink::publish_after_commit`]. A broker outage therefore cannot
//! fail a registration: the caller sees success, the failure is recorded
//! on the observability surface, and the directory lags until the state
//! is republished. The window of cross-service inconsistency is accepted
//! deliberately; coupling registration availability to the broker is not.

use crate::account::{Account, RegistrationRequest};
use crate::error::{IdentityError, Result};
use crate::store::AccountStore;
use meridian_core::events::{DomainEvent, UserCreated, normalize_email};
use meridian_core::sink::EventSink;
use std::sync::Arc;

/// Registers accounts and announces them to the rest of the suite.
///
/// # Example
///
/// ```
/// use meridian_identity::account::RegistrationRequest;
/// use meridian_identity::mocks::InMemoryAccountStore;
/// use meridian_identity::service::RegistrationService;
/// use meridian_testing::RecordingEventSink;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sink = Arc::new(RecordingEventSink::new());
/// let service = RegistrationService::new(InMemoryAccountStore::new(), sink);
///
/// let account = service
///     .register(RegistrationRequest {
///         email: "ada@example.com".to_string(),
///         full_name: "Ada Lovelace".to_string(),
///     })
///     .await?;
/// assert_eq!(account.role, "Employee");
/// # Ok(())
/// # }
/// ```
pub struct RegistrationService<S>
where
    S: AccountStore,
{
    store: S,
    events: Arc<dyn EventSink>,
}

impl<S> RegistrationService<S>
where
    S: AccountStore,
{
    /// Create a service over the given store and event sink.
    #[must_use]
    pub fn new(store: S, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    /// Register a new account.
    ///
    /// Succeeds or fails entirely on local state; the subsequent event
    /// publication is best-effort and never affects the result.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmailTaken`] if the email is already
    /// registered, [`IdentityError::Invalid`] for a malformed request,
    /// or [`IdentityError::Store`] if the account store fails.
    pub async fn register(&self, request: RegistrationRequest) -> Result<Account> {
        if request.email.trim().is_empty() {
            return Err(IdentityError::Invalid("email must not be blank".to_string()));
        }
        if request.full_name.trim().is_empty() {
            return Err(IdentityError::Invalid(
                "full name must not be blank".to_string(),
            ));
        }

        let normalized = normalize_email(&request.email);
        if self
            .store
            .find_by_normalized_email(&normalized)
            .await?
            .is_some()
        {
            return Err(IdentityError::EmailTaken);
        }

        let account = Account::register(&request.email, &request.full_name);
        self.store.insert(&account).await?;

        tracing::info!(
            subject = %account.id,
            "account registered"
        );

        // Local state is committed; everything below is best-effort.
        let event = UserCreated {
            subject: account.id,
            email: account.email.clone(),
            full_name: account.full_name.clone(),
            role: account.role.clone(),
        };
        match event.to_envelope() {
            Ok(envelope) => self.events.publish_after_commit(&envelope).await,
            Err(error) => {
                tracing::error!(subject = %account.id, %error, "failed to construct user.created event");
            }
        }

        Ok(account)
    }
}
