//! The domain repository the idempotency layer calls into.
//!
//! Three operations form the seam to the owning domain:
//! find by unique key, create from an event, and apply an update from an
//! event. All of them run against a borrowed connection so the store can
//! execute them inside the same transaction as the ledger insert.

use crate::error::Result;
use crate::model::DirectoryUser;
use chrono::{DateTime, Utc};
use meridian_core::events::{UserCreated, UserUpdated};
use sqlx::PgConnection;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT subject, email, normalized_email, full_name, role, \
     department, status, active, created_at, updated_at FROM directory_users";

/// Operations on the `directory_users` projection table.
pub struct UserDirectoryRepository;

impl UserDirectoryRepository {
    /// Look up an entry by subject id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// query fails.
    pub async fn find_by_subject(
        conn: &mut PgConnection,
        subject: Uuid,
    ) -> Result<Option<DirectoryUser>> {
        let user = sqlx::query_as::<_, DirectoryUser>(&format!(
            "{SELECT_COLUMNS} WHERE subject = $1"
        ))
        .bind(subject)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Look up an entry by its unique normalized email key.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// query fails.
    pub async fn find_by_normalized_email(
        conn: &mut PgConnection,
        normalized_email: &str,
    ) -> Result<Option<DirectoryUser>> {
        let user = sqlx::query_as::<_, DirectoryUser>(&format!(
            "{SELECT_COLUMNS} WHERE normalized_email = $1"
        ))
        .bind(normalized_email)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Create an entry from a `user.created` event (the create path).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Conflict`](crate::error::DirectoryError::Conflict)
    /// if the email's unique key is already owned by another subject.
    pub async fn create_from_event(
        conn: &mut PgConnection,
        payload: &UserCreated,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectoryUser> {
        let user = DirectoryUser::from_created(payload, occurred_at);
        Self::insert(conn, &user).await?;
        Ok(user)
    }

    /// Create an entry from a `user.updated` event whose subject was
    /// never seen (upsert tolerates updates arriving first).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// insert fails.
    pub async fn create_from_update_event(
        conn: &mut PgConnection,
        payload: &UserUpdated,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectoryUser> {
        let user = DirectoryUser::from_update(payload, occurred_at);
        Self::insert(conn, &user).await?;
        Ok(user)
    }

    /// Apply a `user.updated` event to an existing entry; only carried
    /// fields overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// update fails.
    pub async fn apply_update_from_event(
        conn: &mut PgConnection,
        existing: &DirectoryUser,
        payload: &UserUpdated,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectoryUser> {
        let user = existing.merge_update(payload, occurred_at);
        Self::update(conn, &user).await?;
        Ok(user)
    }

    /// Apply a redelivered-or-late `user.created` event to an entry that
    /// already exists (possibly from a prior local mutation).
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// update fails.
    pub async fn apply_created_to_existing(
        conn: &mut PgConnection,
        existing: &DirectoryUser,
        payload: &UserCreated,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectoryUser> {
        let user = existing.merge_created(payload, occurred_at);
        Self::update(conn, &user).await?;
        Ok(user)
    }

    /// Mark an existing entry inactive.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`](crate::error::DirectoryError) if the
    /// update fails.
    pub async fn deactivate(
        conn: &mut PgConnection,
        existing: &DirectoryUser,
        occurred_at: DateTime<Utc>,
    ) -> Result<DirectoryUser> {
        let user = existing.deactivated(occurred_at);
        Self::update(conn, &user).await?;
        Ok(user)
    }

    async fn insert(conn: &mut PgConnection, user: &DirectoryUser) -> Result<()> {
        sqlx::query(
            "INSERT INTO directory_users
                 (subject, email, normalized_email, full_name, role,
                  department, status, active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.subject)
        .bind(&user.email)
        .bind(&user.normalized_email)
        .bind(&user.full_name)
        .bind(&user.role)
        .bind(&user.department)
        .bind(&user.status)
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn update(conn: &mut PgConnection, user: &DirectoryUser) -> Result<()> {
        sqlx::query(
            "UPDATE directory_users
             SET email = $2,
                 normalized_email = $3,
                 full_name = $4,
                 role = $5,
                 department = $6,
                 status = $7,
                 active = $8,
                 updated_at = $9
             WHERE subject = $1",
        )
        .bind(user.subject)
        .bind(&user.email)
        .bind(&user.normalized_email)
        .bind(&user.full_name)
        .bind(&user.role)
        .bind(&user.department)
        .bind(&user.status)
        .bind(user.active)
        .bind(user.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
