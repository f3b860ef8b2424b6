//! Workflow-stage visibility for the calling user

use crate::federation::error::{FederationError, FederationResult};
use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Identifier of a workflow stage
pub type StageId = String;

/// The caller of a request.
///
/// `invisible_stages` is the set materialized on the user record, when the
/// session layer already has it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: Option<String>,
    pub invisible_stages: Option<BTreeSet<StageId>>,
}

impl UserContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn identified(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            invisible_stages: None,
        }
    }

    /// Attach an already-resolved invisible stage set
    pub fn with_invisible_stages<I, S>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StageId>,
    {
        self.invisible_stages = Some(stages.into_iter().map(Into::into).collect());
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id().is_none()
    }
}

/// Directory of users and their stage visibility
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Stages the user is not allowed to see documents in
    async fn get_invisible_stages(&self, user_id: &str) -> FederationResult<BTreeSet<StageId>>;
}

/// Resolves the invisible stage set for a request
#[derive(Clone)]
pub struct VisibilityResolver {
    directory: Arc<dyn UserDirectory>,
}

impl VisibilityResolver {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Invisible stages for `user`.
    ///
    /// A set carried on the user record wins without a directory call. An
    /// anonymous user gets the empty set. Directory failures for an identified
    /// user are returned as errors; the caller must not search without them.
    pub async fn invisible_stages(&self, user: &UserContext) -> FederationResult<BTreeSet<StageId>> {
        if let Some(stages) = &user.invisible_stages {
            debug!(stages = stages.len(), "Using invisible stages from user record");
            return Ok(stages.clone());
        }

        let Some(user_id) = user.user_id() else {
            return Ok(BTreeSet::new());
        };

        self.directory.get_invisible_stages(user_id).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Failed to resolve invisible stages");
            e
        })
    }
}

/// Fixed user-to-stages table, loaded from configuration.
///
/// Users missing from the table see every stage.
#[derive(Debug, Clone, Default)]
pub struct StaticUserDirectory {
    users: HashMap<String, BTreeSet<StageId>>,
}

impl StaticUserDirectory {
    pub fn new(users: HashMap<String, BTreeSet<StageId>>) -> Self {
        Self { users }
    }

    pub fn with_user<I, S>(mut self, user_id: impl Into<String>, stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StageId>,
    {
        self.users
            .insert(user_id.into(), stages.into_iter().map(Into::into).collect());
        self
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn get_invisible_stages(&self, user_id: &str) -> FederationResult<BTreeSet<StageId>> {
        Ok(self.users.get(user_id).cloned().unwrap_or_default())
    }
}

/// Caches another directory's answers for a bounded time.
///
/// Entries expire after the configured TTL; stage reassignments become visible
/// no later than that, or immediately after [`CachedUserDirectory::invalidate_all`].
#[derive(Clone)]
pub struct CachedUserDirectory {
    inner: Arc<dyn UserDirectory>,
    cache: Cache<String, BTreeSet<StageId>>,
}

impl CachedUserDirectory {
    pub fn new(inner: Arc<dyn UserDirectory>, max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Drop the cached entry for one user
    pub async fn invalidate(&self, user_id: &str) {
        self.cache.invalidate(user_id).await;
    }

    /// Drop every cached entry
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}

#[async_trait]
impl UserDirectory for CachedUserDirectory {
    async fn get_invisible_stages(&self, user_id: &str) -> FederationResult<BTreeSet<StageId>> {
        if let Some(stages) = self.cache.get(user_id).await {
            return Ok(stages);
        }

        let stages = self.inner.get_invisible_stages(user_id).await?;
        self.cache.insert(user_id.to_string(), stages.clone()).await;
        Ok(stages)
    }
}

/// Directory that always fails, for exercising fail-closed behaviour
#[derive(Debug, Clone, Default)]
pub struct UnavailableDirectory;

#[async_trait]
impl UserDirectory for UnavailableDirectory {
    async fn get_invisible_stages(&self, user_id: &str) -> FederationResult<BTreeSet<StageId>> {
        Err(FederationError::Directory(format!(
            "directory unavailable while resolving user {}",
            user_id
        )))
    }
}
