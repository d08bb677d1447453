//! The processed-event ledger, the idempotency record behind duplicate
//! suppression.
//!
//! One row per applied `event_id`, inserted in the same transaction as
//! the projection write and never mutated afterwards. The primary key on
//! `event_id` is what makes horizontal scale-out safe: when two worker
//! instances race on the same redelivered message, exactly one insert
//! succeeds and the other observes a duplicate.

use crate::error::Result;
use sqlx::PgConnection;
use uuid::Uuid;

/// Operations on the `processed_events` table.
pub struct ProcessedEventLedger;

impl ProcessedEventLedger {
    /// Record an event id, returning `false` if it was already recorded.
    ///
    /// `INSERT ... ON CONFLICT DO NOTHING` resolves concurrent duplicate
    /// deliveries at the store: zero rows affected means some delivery,
    /// this one or a racing one, already applied the event.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unavailable`](crate::error::DirectoryError::Unavailable)
    /// if the store cannot be reached.
    pub async fn try_record(
        conn: &mut PgConnection,
        event_id: Uuid,
        event_type: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO processed_events (event_id, event_type, processed_at)
             VALUES ($1, $2, now())
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether an event id has been recorded.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Unavailable`](crate::error::DirectoryError::Unavailable)
    /// if the store cannot be reached.
    pub async fn contains(conn: &mut PgConnection, event_id: Uuid) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM processed_events WHERE event_id = $1)")
                .bind(event_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(exists)
    }
}
