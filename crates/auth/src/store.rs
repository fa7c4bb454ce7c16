//! Account store contract and the in-memory backend

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{Account, AccountId};

/// Store-level failures, kept apart from domain errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Duplicate email: {0}")]
    DuplicateEmail(String),

    #[error("Account not found: {0}")]
    NotFound(String),

    #[error("Stale write for account {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable account storage
///
/// Implementations may sit on a network. Every call can fail with
/// [`StoreError::Unavailable`]; callers must not read that as "not found".
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>>;

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>>;

    /// Insert a new account. Fails with `DuplicateEmail` if the email is taken.
    async fn insert(&self, account: Account) -> StoreResult<Account>;

    /// Replace an account. `account.version` must match the stored version,
    /// otherwise the write is rejected with `Conflict`.
    async fn update(&self, account: Account) -> StoreResult<Account>;

    /// Add one to the creation counter as a single atomic step
    async fn increment_creation_count(&self, id: &AccountId) -> StoreResult<Account>;
}

#[derive(Default)]
struct Accounts {
    by_id: HashMap<AccountId, Account>,
    by_email: HashMap<String, AccountId>,
}

/// In-memory [`AccountStore`]
#[derive(Default)]
pub struct MemoryAccountStore {
    inner: RwLock<Accounts>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: &AccountId) -> StoreResult<Option<Account>> {
        Ok(self.inner.read().await.by_id.get(id).cloned())
    }

    async fn insert(&self, mut account: Account) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&account.email) {
            return Err(StoreError::DuplicateEmail(account.email));
        }
        if inner.by_id.contains_key(&account.id) {
            return Err(StoreError::Conflict(account.id.to_string()));
        }

        account.version = 1;
        inner.by_email.insert(account.email.clone(), account.id);
        inner.by_id.insert(account.id, account.clone());
        log::debug!("Inserted account {}", account.id);
        Ok(account)
    }

    async fn update(&self, mut account: Account) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .by_id
            .get(&account.id)
            .ok_or_else(|| StoreError::NotFound(account.id.to_string()))?;

        if stored.version != account.version {
            return Err(StoreError::Conflict(account.id.to_string()));
        }

        let previous_email = stored.email.clone();
        if previous_email != account.email {
            if inner.by_email.contains_key(&account.email) {
                return Err(StoreError::DuplicateEmail(account.email));
            }
            inner.by_email.remove(&previous_email);
            inner.by_email.insert(account.email.clone(), account.id);
        }

        account.version += 1;
        inner.by_id.insert(account.id, account.clone());
        log::debug!("Updated account {} to version {}", account.id, account.version);
        Ok(account)
    }

    async fn increment_creation_count(&self, id: &AccountId) -> StoreResult<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .by_id
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        account.creation_count = account.creation_count.saturating_add(1);
        account.version += 1;
        Ok(account.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;

    fn account(email: &str) -> Account {
        Account::new(email, "hash".to_string(), Utc::now())
    }

    #[tokio::test]
    async fn test_insert_enforces_unique_email() {
        let store = MemoryAccountStore::new();
        store.insert(account("ana@example.com")).await.unwrap();

        let err = store.insert(account("ana@example.com")).await.unwrap_err();
        assert_eq!(err, StoreError::DuplicateEmail("ana@example.com".to_string()));

        // case-sensitive uniqueness
        store.insert(account("Ana@example.com")).await.unwrap();
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_find_by_email_and_id() {
        let store = MemoryAccountStore::new();
        let inserted = store.insert(account("ana@example.com")).await.unwrap();

        let by_email = store.find_by_email("ana@example.com").await.unwrap().unwrap();
        let by_id = store.find_by_id(&inserted.id).await.unwrap().unwrap();

        assert_eq!(by_email, inserted);
        assert_eq!(by_id, inserted);
        assert!(store.find_by_email("bob@example.com").await.unwrap().is_none());
        assert!(store.find_by_id(&AccountId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let store = MemoryAccountStore::new();
        let inserted = store.insert(account("ana@example.com")).await.unwrap();

        let mut first = inserted.clone();
        first.is_premium = true;
        let updated = store.update(first).await.unwrap();
        assert_eq!(updated.version, inserted.version + 1);

        let mut stale = inserted.clone();
        stale.creation_count = 10;
        let err = store.update(stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let stored = store.find_by_id(&inserted.id).await.unwrap().unwrap();
        assert!(stored.is_premium);
        assert_eq!(stored.creation_count, 0);
    }

    #[tokio::test]
    async fn test_update_missing_account() {
        let store = MemoryAccountStore::new();
        let err = store.update(account("ana@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryAccountStore::new());
        let inserted = store.insert(account("ana@example.com")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            let id = inserted.id;
            handles.push(tokio::spawn(async move {
                store.increment_creation_count(&id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stored = store.find_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(stored.creation_count, 25);
    }
}
