//! In-memory account store for tests.

#![allow(clippy::unwrap_used)] // Test infrastructure tolerates lock poisoning by panic

use crate::account::Account;
use crate::error::{IdentityError, Result};
use crate::store::AccountStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory [`AccountStore`] keyed by normalized email.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.lock().unwrap().is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    async fn find_by_normalized_email(&self, normalized_email: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(normalized_email)
            .cloned())
    }

    async fn insert(&self, account: &Account) -> Result<()> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&account.normalized_email) {
            return Err(IdentityError::EmailTaken);
        }
        accounts.insert(account.normalized_email.clone(), account.clone());
        Ok(())
    }
}
