//! Fan-out of posts to accounts
//!
//! [`Dispatcher::publish`] creates one `pending` distribution per eligible
//! account and attempts them all concurrently. Platform failures are
//! recorded on the distribution and never abort the batch; only local
//! storage failures surface as errors.

use futures::future::join_all;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::credentials::CredentialStore;
use crate::distribution::{Distribution, DistributionStatus};
use crate::error::{DistributionError, Result, SyndicastError};
use crate::factory::ClientFactory;
use crate::platforms::PlatformClient;
use crate::store::{AccountDirectory, DistributionStore, PostStore};
use crate::types::{Account, Post};

/// A distribution whose latest state could not be saved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistError {
    pub distribution_id: String,
    pub account_id: String,
    /// Status the attempt reached in memory
    pub status: DistributionStatus,
    pub error: String,
}

/// Result of publishing one post
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// One record per eligible account, in request order. Each reflects what
    /// happened on the platform, even when saving it failed.
    pub distributions: Vec<Distribution>,
    /// Requested accounts that were missing, inactive or expired
    pub skipped_count: usize,
    /// Records whose stored state differs from `distributions`
    pub persist_errors: Vec<PersistError>,
}

impl PublishOutcome {
    pub fn succeeded(&self) -> Vec<&Distribution> {
        self.with_status(&[DistributionStatus::Completed])
    }

    /// Distributions that ended in `failed` or `error`
    pub fn failed(&self) -> Vec<&Distribution> {
        self.with_status(&[DistributionStatus::Failed, DistributionStatus::Error])
    }

    /// Every distribution completed and was saved
    pub fn all_succeeded(&self) -> bool {
        self.persist_errors.is_empty()
            && self
                .distributions
                .iter()
                .all(|d| d.status == DistributionStatus::Completed)
    }

    fn with_status(&self, statuses: &[DistributionStatus]) -> Vec<&Distribution> {
        self.distributions
            .iter()
            .filter(|d| statuses.contains(&d.status))
            .collect()
    }
}

pub struct Dispatcher {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountDirectory>,
    distributions: Arc<dyn DistributionStore>,
    credentials: Arc<dyn CredentialStore>,
    factory: ClientFactory,
    /// One client per account id, built on first use
    clients: Mutex<HashMap<String, Arc<dyn PlatformClient>>>,
}

impl Dispatcher {
    pub fn new(
        posts: Arc<dyn PostStore>,
        accounts: Arc<dyn AccountDirectory>,
        distributions: Arc<dyn DistributionStore>,
        credentials: Arc<dyn CredentialStore>,
        factory: ClientFactory,
    ) -> Self {
        Self {
            posts,
            accounts,
            distributions,
            credentials,
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Dispatcher over a single store that holds posts, accounts and distributions
    pub fn with_store<S>(store: Arc<S>, credentials: Arc<dyn CredentialStore>, factory: ClientFactory) -> Self
    where
        S: PostStore + AccountDirectory + DistributionStore + 'static,
    {
        Self::new(store.clone(), store.clone(), store, credentials, factory)
    }

    /// Publish a post to the given accounts.
    ///
    /// Duplicate ids are collapsed. Unknown, inactive and expired accounts
    /// are skipped and counted; every other account gets exactly one
    /// distribution, persisted as `pending` before any platform call is made.
    ///
    /// If a record cannot be created, the records already created are
    /// removed and the error is returned without contacting any platform.
    /// Once attempts start, a storage failure on one record is reported in
    /// [`PublishOutcome::persist_errors`] and never hides the others.
    pub async fn publish(&self, post_id: &str, account_ids: &[String]) -> Result<PublishOutcome> {
        let post = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| SyndicastError::NotFound(format!("post {}", post_id)))?;

        let mut seen = HashSet::new();
        let requested: Vec<String> = account_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect();

        let found: HashMap<String, Account> = self
            .accounts
            .get_accounts(&requested)
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let now = chrono::Utc::now().timestamp();
        let mut targets = Vec::new();
        let mut skipped_count = 0;
        for id in &requested {
            match found.get(id) {
                Some(account) if account.is_authenticated(now) => targets.push(account.clone()),
                Some(account) => {
                    warn!(
                        account_id = %id,
                        platform = %account.platform,
                        status = %account.connection_status,
                        "Skipping account that is not active or authenticated"
                    );
                    skipped_count += 1;
                }
                None => {
                    warn!(account_id = %id, "Skipping unknown account");
                    skipped_count += 1;
                }
            }
        }

        let scheduled_for = post.scheduled_for.unwrap_or(now);
        let mut pending = Vec::with_capacity(targets.len());
        for account in targets {
            let distribution = Distribution::new(&post.id, &account.id, scheduled_for, now);
            if let Err(e) = self.distributions.insert_distribution(&distribution).await {
                error!(
                    post_id = %post.id,
                    account_id = %account.id,
                    error = %e,
                    "Failed to create distribution; publishing nothing"
                );
                self.roll_back(&pending).await;
                return Err(e);
            }
            pending.push((account, distribution));
        }

        info!(
            post_id = %post.id,
            targets = pending.len(),
            skipped = skipped_count,
            "Publishing post"
        );

        let attempts = pending
            .into_iter()
            .map(|(account, distribution)| self.attempt(&post, account, distribution));
        let results = join_all(attempts).await;

        let mut distributions = Vec::with_capacity(results.len());
        let mut persist_errors = Vec::new();
        for (distribution, save_error) in results {
            if let Some(e) = save_error {
                persist_errors.push(PersistError {
                    distribution_id: distribution.id.clone(),
                    account_id: distribution.account_id.clone(),
                    status: distribution.status,
                    error: e.to_string(),
                });
            }
            distributions.push(distribution);
        }

        let outcome = PublishOutcome {
            distributions,
            skipped_count,
            persist_errors,
        };
        info!(
            post_id = %post.id,
            succeeded = outcome.succeeded().len(),
            failed = outcome.failed().len(),
            unsaved = outcome.persist_errors.len(),
            "Publish finished"
        );
        Ok(outcome)
    }

    /// Move a `failed` or `error` distribution back to `pending`.
    ///
    /// Increments `retry_count` and clears the last attempt. Does not
    /// contact the platform; see [`Dispatcher::retry`] for that.
    pub async fn retry_distribution(&self, distribution_id: &str) -> Result<Distribution> {
        let mut distribution = self.load_distribution(distribution_id).await?;
        let previous = distribution.status;

        distribution.reset_for_retry(chrono::Utc::now().timestamp())?;
        if !self
            .distributions
            .update_distribution(&distribution, previous)
            .await?
        {
            return Err(self
                .lost_race(distribution_id, DistributionStatus::Pending)
                .await);
        }

        info!(
            distribution_id,
            retry_count = distribution.retry_count,
            "Distribution reset for retry"
        );
        Ok(distribution)
    }

    /// Reset a failed distribution and attempt it again immediately
    pub async fn retry(&self, distribution_id: &str) -> Result<Distribution> {
        self.retry_distribution(distribution_id).await?;
        self.dispatch(distribution_id).await
    }

    /// Attempt a `pending` distribution now
    pub async fn dispatch(&self, distribution_id: &str) -> Result<Distribution> {
        let distribution = self.load_distribution(distribution_id).await?;
        if distribution.status != DistributionStatus::Pending {
            return Err(DistributionError::IllegalTransition {
                id: distribution.id,
                from: distribution.status,
                to: DistributionStatus::Publishing,
            }
            .into());
        }

        let post = self
            .posts
            .get_post(&distribution.post_id)
            .await?
            .ok_or_else(|| SyndicastError::NotFound(format!("post {}", distribution.post_id)))?;

        let account = self
            .accounts
            .get_accounts(std::slice::from_ref(&distribution.account_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SyndicastError::NotFound(format!("account {}", distribution.account_id)))?;

        match self.attempt(&post, account, distribution).await {
            (distribution, None) => Ok(distribution),
            (_, Some(e)) => Err(e),
        }
    }

    /// Distributions of a post, oldest first
    pub async fn list_distributions(&self, post_id: &str) -> Result<Vec<Distribution>> {
        self.distributions.list_distributions(post_id).await
    }

    /// Drop the cached client for an account (e.g. after its credentials change)
    pub async fn evict_client(&self, account_id: &str) -> bool {
        self.clients.lock().await.remove(account_id).is_some()
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }

    /// Claim a pending record, call the platform, persist the outcome.
    ///
    /// The returned record is what happened, whether or not it was saved.
    /// An error alongside it means the store does not hold that state: the
    /// claim was lost (nothing was sent) or the final write failed.
    async fn attempt(
        &self,
        post: &Post,
        account: Account,
        pending: Distribution,
    ) -> (Distribution, Option<SyndicastError>) {
        let mut distribution = pending.clone();
        if let Err(e) = distribution.begin_attempt(chrono::Utc::now().timestamp()) {
            return (pending, Some(e.into()));
        }
        match self
            .distributions
            .update_distribution(&distribution, DistributionStatus::Pending)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                let e = self.lost_race(&distribution.id, DistributionStatus::Publishing).await;
                return (pending, Some(e));
            }
            Err(e) => {
                warn!(distribution_id = %distribution.id, error = %e, "Failed to claim distribution");
                return (pending, Some(e));
            }
        }

        let now = || chrono::Utc::now().timestamp();
        let recorded = match self.client_for(&account).await {
            Ok(client) => {
                let options = post.options_for(&account.platform);
                let response = client
                    .post_content(&post.content, &post.media_refs, &options)
                    .await;
                for warning in response.warnings() {
                    warn!(distribution_id = %distribution.id, platform = %account.platform, "{}", warning);
                }
                distribution.record_response(&response, now())
            }
            Err(message) => distribution.record_error(message, now()),
        };
        if let Err(e) = recorded {
            return (distribution, Some(e.into()));
        }

        match distribution.status {
            DistributionStatus::Completed => info!(
                distribution_id = %distribution.id,
                platform = %account.platform,
                platform_post_id = ?distribution.platform_post_id,
                "Distribution completed"
            ),
            _ => warn!(
                distribution_id = %distribution.id,
                platform = %account.platform,
                status = %distribution.status,
                error = distribution.error_message.as_deref().unwrap_or(""),
                "Distribution not published"
            ),
        }

        let saved = match self
            .distributions
            .update_distribution(&distribution, DistributionStatus::Publishing)
            .await
        {
            Ok(true) => return (distribution, None),
            Ok(false) => self.lost_race(&distribution.id, distribution.status).await,
            Err(e) => e,
        };
        error!(
            distribution_id = %distribution.id,
            status = %distribution.status,
            error = %saved,
            "Outcome not saved"
        );
        (distribution, Some(saved))
    }

    /// Best-effort removal of records created for an aborted publish
    async fn roll_back(&self, created: &[(Account, Distribution)]) {
        for (_, distribution) in created {
            match self
                .distributions
                .delete_pending_distribution(&distribution.id)
                .await
            {
                Ok(true) => debug!(distribution_id = %distribution.id, "Removed unpublished distribution"),
                Ok(false) => warn!(distribution_id = %distribution.id, "Distribution already gone or claimed"),
                Err(e) => error!(
                    distribution_id = %distribution.id,
                    error = %e,
                    "Failed to remove unpublished distribution; it stays pending"
                ),
            }
        }
    }

    /// The cached client for `account`, building it on first use.
    ///
    /// Errors are messages to record on the distribution.
    async fn client_for(&self, account: &Account) -> std::result::Result<Arc<dyn PlatformClient>, String> {
        if !account.is_authenticated(chrono::Utc::now().timestamp()) {
            return Err(format!(
                "Account {} is not active or its authentication has expired",
                account.id
            ));
        }

        if let Some(client) = self.clients.lock().await.get(&account.id) {
            return Ok(Arc::clone(client));
        }

        let credentials = match self.credentials.credentials_for(account) {
            Ok(Some(credentials)) => credentials,
            Ok(None) => return Err(format!("No credentials stored for account {}", account.id)),
            Err(e) => return Err(format!("Failed to load credentials: {}", e)),
        };

        if !self.factory.supports(&account.platform) {
            return Err(format!("No client available for platform: {}", account.platform));
        }
        let client: Arc<dyn PlatformClient> =
            match self.factory.create_client(&account.platform, &credentials) {
                Some(client) => Arc::from(client),
                None => {
                    return Err(format!(
                        "Failed to create {} client for account {} (check credentials)",
                        account.platform, account.id
                    ))
                }
            };

        debug!(account_id = %account.id, platform = %account.platform, "Caching platform client");
        let mut clients = self.clients.lock().await;
        Ok(Arc::clone(clients.entry(account.id.clone()).or_insert(client)))
    }

    async fn load_distribution(&self, id: &str) -> Result<Distribution> {
        self.distributions
            .get_distribution(id)
            .await?
            .ok_or_else(|| SyndicastError::NotFound(format!("distribution {}", id)))
    }

    /// Error for a compare-and-set that found the record already moved
    async fn lost_race(&self, id: &str, to: DistributionStatus) -> SyndicastError {
        match self.distributions.get_distribution(id).await {
            Ok(Some(current)) => DistributionError::IllegalTransition {
                id: id.to_string(),
                from: current.status,
                to,
            }
            .into(),
            Ok(None) => SyndicastError::NotFound(format!("distribution {}", id)),
            Err(e) => e,
        }
    }
}
