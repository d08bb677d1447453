//! Cross-service scenarios: registration on the identity side through to
//! materialization on the directory side.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use meridian_core::processor::{Disposition, EventProcessor};
use meridian_directory::mocks::InMemoryDirectoryStore;
use meridian_directory::processor::UserDirectoryProcessor;
use meridian_identity::account::RegistrationRequest;
use meridian_identity::mocks::InMemoryAccountStore;
use meridian_identity::service::RegistrationService;
use meridian_testing::{RecordingEventSink, fixtures};
use std::sync::Arc;
use uuid::Uuid;

/// The canonical redelivery scenario: one `user.created` event delivered
/// twice ends with exactly one projection row, one ledger record, and the
/// second delivery suppressed without reapplying.
#[tokio::test]
async fn redelivered_user_created_is_applied_exactly_once() {
    let processor = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());
    let subject = Uuid::new_v4();
    let envelope = fixtures::user_created(subject, "a@x.com", "A B");

    let first = processor.process(&envelope).await.unwrap();
    let second = processor.process(&envelope).await.unwrap();

    assert_eq!(first, Disposition::Applied);
    assert_eq!(second, Disposition::Duplicate);
    assert_eq!(processor.store().len(), 1);
    assert_eq!(processor.store().ledger_len(), 1);

    let user = processor.store().user(subject).expect("one projection");
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.full_name, "A B");
    assert_eq!(user.role, "Employee");
}

/// Registration publishes an event the directory can materialize as-is:
/// the full producing-side → consuming-side round trip, minus the broker.
#[tokio::test]
async fn registered_account_materializes_in_the_directory() {
    let sink = Arc::new(RecordingEventSink::new());
    let registration =
        RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);
    let directory = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());

    let account = registration
        .register(RegistrationRequest {
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
        })
        .await
        .unwrap();

    // Deliver what was published, as the broker would.
    let published = sink.published();
    assert_eq!(published.len(), 1);
    directory.process(&published[0]).await.unwrap();

    let entry = directory.store().user(account.id).expect("materialized");
    assert_eq!(entry.email, "ada@example.com");
    assert_eq!(entry.full_name, "Ada Lovelace");
    assert_eq!(entry.role, "Employee");
}

/// A broker outage at publish time: registration still succeeds, the
/// directory lags (eventual consistency), and the failure is observable.
#[tokio::test]
async fn broker_outage_delays_materialization_but_not_registration() {
    let sink = Arc::new(RecordingEventSink::failing());
    let registration =
        RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);
    let directory = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());

    let account = registration
        .register(RegistrationRequest {
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
        })
        .await
        .expect("registration succeeds despite broker outage");

    assert_eq!(sink.attempts(), 1);
    assert!(sink.published().is_empty());
    // Nothing reached the directory: the documented consistency lag.
    assert!(directory.store().user(account.id).is_none());
}

/// Interleaved lifecycle across event types, in queue order.
#[tokio::test]
async fn full_lifecycle_applies_in_order() {
    let processor = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());
    let subject = Uuid::new_v4();

    processor
        .process(&fixtures::user_created(subject, "a@x.com", "A B"))
        .await
        .unwrap();
    processor
        .process(&fixtures::user_renamed(subject, "A. B. Renamed"))
        .await
        .unwrap();
    processor
        .process(&fixtures::user_deactivated(subject))
        .await
        .unwrap();

    let user = processor.store().user(subject).unwrap();
    assert_eq!(user.full_name, "A. B. Renamed");
    assert!(!user.active);
    assert_eq!(processor.store().ledger_len(), 3);
}

/// A payload missing a required field is rejected on the first attempt
/// and classified non-retryable (the consumer dead-letters it).
#[tokio::test]
async fn missing_required_field_is_never_retried() {
    let processor = UserDirectoryProcessor::new(InMemoryDirectoryStore::new());
    let envelope = fixtures::user_created_missing_email(Uuid::new_v4());

    let err = processor.process(&envelope).await.unwrap_err();

    assert!(!err.is_retryable());
    assert!(processor.store().is_empty());
    assert_eq!(processor.store().ledger_len(), 0);
}
