//! The idempotency/upsert layer: ledger insert and projection write as
//! one atomic unit.
//!
//! Both writes must succeed or fail together: a projection updated
//! without its ledger row (or vice versa) would break duplicate
//! suppression. Every `apply_*` therefore runs one local transaction covering
//! the `processed_events` insert and the `directory_users` upsert. The
//! ledger's primary key turns a race between two worker instances on the
//! same redelivered message into exactly one applied outcome and one
//! detected duplicate.

use crate::error::Result;
use crate::ledger::ProcessedEventLedger;
use crate::model::DirectoryUser;
use crate::repository::UserDirectoryRepository;
use meridian_core::envelope::EventEnvelope;
use meridian_core::events::{UserCreated, UserDeactivated, UserUpdated};
use sqlx::PgPool;
use std::future::Future;
use uuid::Uuid;

/// Outcome of an atomic apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event was applied and recorded.
    Applied,
    /// The event id was already in the ledger; nothing was reapplied.
    Duplicate,
}

/// Atomic application of user events to the directory's local state.
///
/// Implemented by [`PostgresDirectoryStore`] for production and by
/// [`mocks::InMemoryDirectoryStore`](crate::mocks::InMemoryDirectoryStore)
/// for tests. Every implementation must guarantee that the
/// ledger record and the state change are atomic with respect to
/// concurrent duplicate deliveries of the same `event_id`.
pub trait DirectoryStore: Send + Sync {
    /// Apply a `user.created` event.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError),
    /// classified transient or permanent.
    fn apply_created(
        &self,
        envelope: &EventEnvelope,
        payload: &UserCreated,
    ) -> impl Future<Output = Result<ApplyOutcome>> + Send;

    /// Apply a `user.updated` event.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError),
    /// classified transient or permanent.
    fn apply_updated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserUpdated,
    ) -> impl Future<Output = Result<ApplyOutcome>> + Send;

    /// Apply a `user.deactivated` event.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError),
    /// classified transient or permanent.
    fn apply_deactivated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserDeactivated,
    ) -> impl Future<Output = Result<ApplyOutcome>> + Send;

    /// Look up an entry by subject id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// lookup fails.
    fn find_by_subject(
        &self,
        subject: Uuid,
    ) -> impl Future<Output = Result<Option<DirectoryUser>>> + Send;
}

/// PostgreSQL-backed directory store.
///
/// # Example
///
/// ```no_run
/// use meridian_directory::store::PostgresDirectoryStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPool::connect("postgresql://localhost/directory").await?;
/// let store = PostgresDirectoryStore::new(pool);
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresDirectoryStore {
    pool: PgPool,
}

impl PostgresDirectoryStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations for the projection and ledger tables.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if
    /// migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::DirectoryError::Unavailable(format!(
                "migration failed: {e}"
            )))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl DirectoryStore for PostgresDirectoryStore {
    async fn apply_created(
        &self,
        envelope: &EventEnvelope,
        payload: &UserCreated,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        if !ProcessedEventLedger::try_record(&mut tx, envelope.event_id, &envelope.event_type)
            .await?
        {
            tx.commit().await?;
            return Ok(ApplyOutcome::Duplicate);
        }

        match UserDirectoryRepository::find_by_subject(&mut tx, payload.subject).await? {
            None => {
                UserDirectoryRepository::create_from_event(&mut tx, payload, envelope.occurred_at)
                    .await?;
            }
            Some(existing) => {
                UserDirectoryRepository::apply_created_to_existing(
                    &mut tx,
                    &existing,
                    payload,
                    envelope.occurred_at,
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_updated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserUpdated,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        if !ProcessedEventLedger::try_record(&mut tx, envelope.event_id, &envelope.event_type)
            .await?
        {
            tx.commit().await?;
            return Ok(ApplyOutcome::Duplicate);
        }

        match UserDirectoryRepository::find_by_subject(&mut tx, payload.subject).await? {
            None => {
                UserDirectoryRepository::create_from_update_event(
                    &mut tx,
                    payload,
                    envelope.occurred_at,
                )
                .await?;
            }
            Some(existing) => {
                UserDirectoryRepository::apply_update_from_event(
                    &mut tx,
                    &existing,
                    payload,
                    envelope.occurred_at,
                )
                .await?;
            }
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn apply_deactivated(
        &self,
        envelope: &EventEnvelope,
        payload: &UserDeactivated,
    ) -> Result<ApplyOutcome> {
        let mut tx = self.pool.begin().await?;

        if !ProcessedEventLedger::try_record(&mut tx, envelope.event_id, &envelope.event_type)
            .await?
        {
            tx.commit().await?;
            return Ok(ApplyOutcome::Duplicate);
        }

        // Deactivating an entry that was never materialized is a no-op;
        // the fact is still recorded in the ledger.
        if let Some(existing) =
            UserDirectoryRepository::find_by_subject(&mut tx, payload.subject).await?
        {
            UserDirectoryRepository::deactivate(&mut tx, &existing, envelope.occurred_at).await?;
        }

        tx.commit().await?;
        Ok(ApplyOutcome::Applied)
    }

    async fn find_by_subject(&self, subject: Uuid) -> Result<Option<DirectoryUser>> {
        let mut conn = self.pool.acquire().await?;
        UserDirectoryRepository::find_by_subject(&mut conn, subject).await
    }
}
