//! # Meridian Identity
//!
//! The producing side of the Meridian synchronization subsystem: the
//! authentication service's account registration, which commits locally
//! and then announces `user.created` to the suite over the event bus.
//!
//! Credential mechanics (hashing, token issuance) belong to the identity
//! stack proper and are out of scope; this slice owns the account record
//! and the publish-after-commit choreography that downstream services
//! depend on.

pub mod account;
pub mod error;
pub mod mocks;
pub mod service;
pub mod store;

pub use account::{Account, RegistrationRequest};
pub use error::IdentityError;
pub use service::RegistrationService;
pub use store::{AccountStore, PostgresAccountStore};
