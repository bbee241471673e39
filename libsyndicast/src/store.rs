//! Storage seams used by the dispatcher
//!
//! Posts and accounts belong to the host application and are only read.
//! Distribution records are owned here. [`Database`](crate::db::Database)
//! implements all three traits over SQLite; [`MemoryStore`] implements them
//! in process.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::distribution::{Distribution, DistributionStatus};
use crate::error::Result;
use crate::types::{Account, Post};

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>>;
}

#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Accounts with the given ids. Unknown ids are left out.
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait DistributionStore: Send + Sync {
    async fn insert_distribution(&self, distribution: &Distribution) -> Result<()>;

    /// Persist `distribution` only if the stored status still equals `expected`.
    ///
    /// Returns `false` (and writes nothing) when the stored record has moved
    /// on or does not exist. `engagement_metrics` is never overwritten.
    async fn update_distribution(
        &self,
        distribution: &Distribution,
        expected: DistributionStatus,
    ) -> Result<bool>;

    async fn get_distribution(&self, id: &str) -> Result<Option<Distribution>>;

    /// Remove a record that never left `pending`. Returns `false` if it was
    /// missing or has already been claimed.
    async fn delete_pending_distribution(&self, id: &str) -> Result<bool>;

    /// All distributions of a post, oldest first
    async fn list_distributions(&self, post_id: &str) -> Result<Vec<Distribution>>;
}

/// In-memory implementation of every store trait
#[derive(Default)]
pub struct MemoryStore {
    posts: RwLock<HashMap<String, Post>>,
    accounts: RwLock<HashMap<String, Account>>,
    /// Insertion order doubles as creation order
    distributions: RwLock<Vec<Distribution>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_post(&self, post: Post) {
        self.posts.write().await.insert(post.id.clone(), post);
    }

    pub async fn add_account(&self, account: Account) {
        self.accounts.write().await.insert(account.id.clone(), account);
    }

    /// Number of distribution records held
    pub async fn distribution_count(&self) -> usize {
        self.distributions.read().await.len()
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        Ok(self.posts.read().await.get(post_id).cloned())
    }
}

#[async_trait]
impl AccountDirectory for MemoryStore {
    async fn get_accounts(&self, account_ids: &[String]) -> Result<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(account_ids
            .iter()
            .filter_map(|id| accounts.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl DistributionStore for MemoryStore {
    async fn insert_distribution(&self, distribution: &Distribution) -> Result<()> {
        self.distributions.write().await.push(distribution.clone());
        Ok(())
    }

    async fn update_distribution(
        &self,
        distribution: &Distribution,
        expected: DistributionStatus,
    ) -> Result<bool> {
        let mut distributions = self.distributions.write().await;
        let Some(stored) = distributions.iter_mut().find(|d| d.id == distribution.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }

        let engagement_metrics = stored.engagement_metrics.take();
        *stored = distribution.clone();
        stored.engagement_metrics = engagement_metrics;
        Ok(true)
    }

    async fn get_distribution(&self, id: &str) -> Result<Option<Distribution>> {
        Ok(self
            .distributions
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn delete_pending_distribution(&self, id: &str) -> Result<bool> {
        let mut distributions = self.distributions.write().await;
        let before = distributions.len();
        distributions.retain(|d| !(d.id == id && d.status == DistributionStatus::Pending));
        Ok(distributions.len() < before)
    }

    async fn list_distributions(&self, post_id: &str) -> Result<Vec<Distribution>> {
        let mut found: Vec<Distribution> = self
            .distributions
            .read()
            .await
            .iter()
            .filter(|d| d.post_id == post_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order within the same second
        found.sort_by_key(|d| d.created_at);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_accounts_skips_unknown_ids() {
        let store = MemoryStore::new();
        let account = Account::new("twitter", None);
        store.add_account(account.clone()).await;

        let found = store
            .get_accounts(&[account.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found, vec![account]);
    }

    #[tokio::test]
    async fn test_update_requires_expected_status() {
        let store = MemoryStore::new();
        let mut d = Distribution::new("p", "a", 0, 0);
        store.insert_distribution(&d).await.unwrap();

        d.begin_attempt(1).unwrap();
        assert!(!store
            .update_distribution(&d, DistributionStatus::Failed)
            .await
            .unwrap());
        assert!(store
            .update_distribution(&d, DistributionStatus::Pending)
            .await
            .unwrap());

        // A second claim of the same record loses
        assert!(!store
            .update_distribution(&d, DistributionStatus::Pending)
            .await
            .unwrap());

        let stored = store.get_distribution(&d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DistributionStatus::Publishing);
    }

    #[tokio::test]
    async fn test_update_keeps_engagement_metrics() {
        let store = MemoryStore::new();
        let mut d = Distribution::new("p", "a", 0, 0);
        d.status = DistributionStatus::Failed;
        d.engagement_metrics = Some(serde_json::json!({"likes": 3}));
        store.insert_distribution(&d).await.unwrap();

        let mut retried = d.clone();
        retried.engagement_metrics = None;
        retried.reset_for_retry(5).unwrap();
        store
            .update_distribution(&retried, DistributionStatus::Failed)
            .await
            .unwrap();

        let stored = store.get_distribution(&d.id).await.unwrap().unwrap();
        assert_eq!(stored.engagement_metrics, Some(serde_json::json!({"likes": 3})));
        assert_eq!(stored.retry_count, 1);
    }

    #[tokio::test]
    async fn test_delete_only_pending() {
        let store = MemoryStore::new();
        let pending = Distribution::new("p", "a", 0, 0);
        let mut claimed = Distribution::new("p", "b", 0, 0);
        store.insert_distribution(&pending).await.unwrap();
        store.insert_distribution(&claimed).await.unwrap();
        claimed.begin_attempt(1).unwrap();
        store
            .update_distribution(&claimed, DistributionStatus::Pending)
            .await
            .unwrap();

        assert!(store.delete_pending_distribution(&pending.id).await.unwrap());
        assert!(!store.delete_pending_distribution(&pending.id).await.unwrap());
        assert!(!store.delete_pending_distribution(&claimed.id).await.unwrap());
        assert_eq!(store.distribution_count().await, 1);
    }

    #[tokio::test]
    async fn test_list_distributions_oldest_first() {
        let store = MemoryStore::new();
        let newer = Distribution::new("p", "a", 0, 20);
        let older = Distribution::new("p", "b", 0, 10);
        let other_post = Distribution::new("q", "a", 0, 5);
        for d in [&newer, &older, &other_post] {
            store.insert_distribution(d).await.unwrap();
        }

        let listed = store.list_distributions("p").await.unwrap();
        assert_eq!(
            listed.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec![older.id.as_str(), newer.id.as_str()]
        );
    }
}
