//! Account persistence.

use crate::account::Account;
use crate::error::Result;
use sqlx::PgPool;
use std::future::Future;

/// Storage seam for accounts.
pub trait AccountStore: Send + Sync {
    /// Look up an account by its unique normalized email key.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`](crate::error::IdentityError) if the
    /// lookup fails.
    fn find_by_normalized_email(
        &self,
        normalized_email: &str,
    ) -> impl Future<Output = Result<Option<Account>>> + Send;

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::EmailTaken`](crate::error::IdentityError::EmailTaken)
    /// if the email's unique key already exists.
    fn insert(&self, account: &Account) -> impl Future<Output = Result<()>> + Send;
}

/// PostgreSQL account store.
#[derive(Clone)]
pub struct PostgresAccountStore {
    pool: PgPool,
}

impl PostgresAccountStore {
    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations for the accounts table.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`](crate::error::IdentityError) if
    /// migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::IdentityError::Store(format!("migration failed: {e}")))?;
        Ok(())
    }
}

impl AccountStore for PostgresAccountStore {
    async fn find_by_normalized_email(&self, normalized_email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT id, email, normalized_email, full_name, role, created_at
             FROM accounts WHERE normalized_email = $1",
        )
        .bind(normalized_email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn insert(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, email, normalized_email, full_name, role, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.normalized_email)
        .bind(&account.full_name)
        .bind(&account.role)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
