//! In-memory store for fast, deterministic tests.
//!
//! Mirrors the transactional semantics of the Postgres store: ledger
//! insert and projection write happen under one lock, so they are atomic
//! by construction, and a duplicate `event_id` is detected exactly like
//! the `ON CONFLICT DO NOTHING` path. A failure countdown simulates a
//! temporarily unavailable store for requeue tests.

#![allow(clippy::unwrap_used)] // Test infrastructure tolerates lock poisoning by panic

use crate::error::{DirectoryError, Result};
use crate::model::DirectoryUser;
use crate::store::{ApplyOutcome, DirectoryStore};
use meridian_core::envelope::EventEnvelope;
use meridian_core::events::{UserCreated, UserDeactivated, UserUpdated};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, DirectoryUser>,
    ledger: HashSet<Uuid>,
    /// Remaining apply calls that will fail with `Unavailable`.
    remaining_failures: usize,
}

/// In-memory [`DirectoryStore`] with the same upsert and duplicate
/// semantics as the Postgres implementation.
///
/// # Example
///
/// ```
/// use meridian_directory::mocks::InMemoryDirectoryStore;
///
/// let store = InMemoryDirectoryStore::new();
/// assert!(store.is_empty());
/// ```
#[derive(Default)]
pub struct InMemoryDirectoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryDirectoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` apply calls fail as transiently unavailable.
    pub fn fail_next_applies(&self, n: usize) {
        self.inner.lock().unwrap().remaining_failures = n;
    }

    /// Number of materialized directory entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    /// Whether no entries are materialized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().users.is_empty()
    }

    /// Number of ledger records.
    #[must_use]
    pub fn ledger_len(&self) -> usize {
        self.inner.lock().unwrap().ledger.len()
    }

    /// Whether the ledger contains an event id.
    #[must_use]
    pub fn ledger_contains(&self, event_id: Uuid) -> bool {
        self.inner.lock().unwrap().ledger.contains(&event_id)
    }

    /// Fetch a materialized entry by subject.
    #[must_use]
    pub fn user(&self, subject: Uuid) -> Option<DirectoryUser> {
        self.inner.lock().unwrap().users.get(&subject).cloned()
    }

    fn begin(&self, envelope: &EventEnvelope) -> Result<Option<std::sync::MutexGuard<'_, Inner>>> {
        let mut inner = self.inner.lock().unwrap();

        if inner.remaining_failures > 0 {
            inner.remaining_failures -= 1;
            return Err(DirectoryError::Unavailable(
                "simulated store outage".to_string(),
            ));
        }

        if !inner.ledger.insert(envelope.event_id) {
            return Ok(None);
        }

        Ok(Some(inner))
    }
}

impl DirectoryStore for InMemoryDirectoryStore {
    async fn apply_created(
        &self,
        envelope: &EventEnvelope,
        payload: &UserCreated,
    ) -> Result<ApplyOutcome> {
        let Some(mut inner) = self.begin(envelope)? else {
            return Ok(ApplyOutcome::Duplicate);
        };

        let next = match inner.users.get(&payload.subject) {
            None => DirectoryUser::from_created(payload, envelope.occurred_at),
            Some(existing) => existing.merge_created(payload, envelope.occurred_at),
        };
        inner.users.insert(payload.subject, next);

        Ok(ApplyOutcome::Applied)
    }

    async fn apply_updated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserUpdated,
    ) -> Result<ApplyOutcome> {
        let Some(mut inner) = self.begin(envelope)? else {
            return Ok(ApplyOutcome::Duplicate);
        };

        let next = match inner.users.get(&payload.subject) {
            None => DirectoryUser::from_update(payload, envelope.occurred_at),
            Some(existing) => existing.merge_update(payload, envelope.occurred_at),
        };
        inner.users.insert(payload.subject, next);

        Ok(ApplyOutcome::Applied)
    }

    async fn apply_deactivated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserDeactivated,
    ) -> Result<ApplyOutcome> {
        let Some(mut inner) = self.begin(envelope)? else {
            return Ok(ApplyOutcome::Duplicate);
        };

        if let Some(existing) = inner.users.get(&payload.subject) {
            let next = existing.deactivated(envelope.occurred_at);
            inner.users.insert(payload.subject, next);
        }

        Ok(ApplyOutcome::Applied)
    }

    async fn find_by_subject(&self, subject: Uuid) -> Result<Option<DirectoryUser>> {
        Ok(self.inner.lock().unwrap().users.get(&subject).cloned())
    }
}
