//! Registration flow tests, including the publish-after-commit property:
//! a broker outage never fails the business operation.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use meridian_core::events::UserCreated;
use meridian_identity::account::RegistrationRequest;
use meridian_identity::mocks::InMemoryAccountStore;
use meridian_identity::service::RegistrationService;
use meridian_identity::IdentityError;
use meridian_testing::RecordingEventSink;
use std::sync::Arc;

fn request(email: &str) -> RegistrationRequest {
    RegistrationRequest {
        email: email.to_string(),
        full_name: "Ada Lovelace".to_string(),
    }
}

#[tokio::test]
async fn registration_publishes_user_created_after_commit() {
    let sink = Arc::new(RecordingEventSink::new());
    let service = RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);

    let account = service.register(request("ada@example.com")).await.unwrap();

    let published = sink.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].event_type, "user.created");

    let payload: UserCreated = published[0].payload_as().unwrap();
    assert_eq!(payload.subject, account.id);
    assert_eq!(payload.email, "ada@example.com");
    assert_eq!(payload.role, "Employee");
}

#[tokio::test]
async fn registration_succeeds_when_broker_is_unreachable() {
    let sink = Arc::new(RecordingEventSink::failing());
    let service = RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);

    // The business operation must report success regardless of the
    // broker; the failed publish is only recorded observably.
    let account = service.register(request("ada@example.com")).await.unwrap();
    assert_eq!(account.email, "ada@example.com");

    assert_eq!(sink.attempts(), 1);
    assert!(sink.published().is_empty());
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_publishing() {
    let sink = Arc::new(RecordingEventSink::new());
    let service = RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);

    service.register(request("ada@example.com")).await.unwrap();
    let err = service
        .register(request(" ADA@example.com "))
        .await
        .unwrap_err();

    assert!(matches!(err, IdentityError::EmailTaken));
    // Only the first registration announced itself.
    assert_eq!(sink.published().len(), 1);
}

#[tokio::test]
async fn blank_fields_are_rejected() {
    let sink = Arc::new(RecordingEventSink::new());
    let service = RegistrationService::new(InMemoryAccountStore::new(), Arc::clone(&sink) as _);

    let err = service.register(request("  ")).await.unwrap_err();
    assert!(matches!(err, IdentityError::Invalid(_)));

    let err = service
        .register(RegistrationRequest {
            email: "a@x.com".to_string(),
            full_name: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::Invalid(_)));

    assert_eq!(sink.attempts(), 0);
}
