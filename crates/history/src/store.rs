//! History store contract and the in-memory backend

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use voxpromo_auth::AccountId;

use crate::{AdArtifact, ArtifactId, HistoryError, Result};

/// Account-scoped artifact storage. No call ever reads or touches another
/// account's artifacts.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, account: &AccountId, artifact: AdArtifact) -> Result<AdArtifact>;

    /// Artifacts in creation order
    async fn list(&self, account: &AccountId) -> Result<Vec<AdArtifact>>;

    async fn get(&self, account: &AccountId, id: &ArtifactId) -> Result<Option<AdArtifact>>;

    /// Replace artifact `id`; the stored artifact keeps `id` whatever
    /// `artifact.id` says
    async fn replace(
        &self,
        account: &AccountId,
        id: &ArtifactId,
        artifact: AdArtifact,
    ) -> Result<AdArtifact>;

    async fn clear(&self, account: &AccountId) -> Result<()>;
}

/// In-memory [`HistoryStore`]
#[derive(Default)]
pub struct MemoryHistoryStore {
    by_account: RwLock<HashMap<AccountId, Vec<AdArtifact>>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, account: &AccountId, artifact: AdArtifact) -> Result<AdArtifact> {
        let mut by_account = self.by_account.write().await;
        let items = by_account.entry(*account).or_default();
        if items.iter().any(|item| item.id == artifact.id) {
            return Err(HistoryError::Duplicate(artifact.id));
        }
        items.push(artifact.clone());
        log::debug!("Appended artifact {} for account {}", artifact.id, account);
        Ok(artifact)
    }

    async fn list(&self, account: &AccountId) -> Result<Vec<AdArtifact>> {
        Ok(self
            .by_account
            .read()
            .await
            .get(account)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, account: &AccountId, id: &ArtifactId) -> Result<Option<AdArtifact>> {
        Ok(self
            .by_account
            .read()
            .await
            .get(account)
            .and_then(|items| items.iter().find(|item| item.id == *id))
            .cloned())
    }

    async fn replace(
        &self,
        account: &AccountId,
        id: &ArtifactId,
        mut artifact: AdArtifact,
    ) -> Result<AdArtifact> {
        let mut by_account = self.by_account.write().await;
        let slot = by_account
            .get_mut(account)
            .and_then(|items| items.iter_mut().find(|item| item.id == *id))
            .ok_or(HistoryError::NotFound(*id))?;

        artifact.id = *id;
        *slot = artifact.clone();
        Ok(artifact)
    }

    async fn clear(&self, account: &AccountId) -> Result<()> {
        if let Some(items) = self.by_account.write().await.remove(account) {
            log::info!("Cleared {} artifacts for account {}", items.len(), account);
        }
        Ok(())
    }
}
