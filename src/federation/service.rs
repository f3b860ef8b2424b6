//! Federated search service
//!
//! Wires the resolvers, composer, executor, dispatcher and lookup together
//! behind the two entry points the API exposes.

use crate::federation::backend::SearchBackend;
use crate::federation::catalog::{DraftOwnershipFilter, PrivateContentFilter};
use crate::federation::composer::QueryComposer;
use crate::federation::config::FederationConfig;
use crate::federation::dispatch::{HookRegistry, ResultDispatcher};
use crate::federation::error::{FederationError, FederationResult};
use crate::federation::executor::SearchExecutor;
use crate::federation::hit::Hit;
use crate::federation::lookup::CrossRepositoryLookup;
use crate::federation::repository::RepositoryId;
use crate::federation::request::SearchRequest;
use crate::federation::resolver::{self, RepoSelector};
use crate::federation::visibility::{UserContext, UserDirectory, VisibilityResolver};
use crate::metrics::{FEDERATED_SEARCHES_TOTAL, SEARCH_HITS_TOTAL};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMeta {
    pub total: u64,
}

/// Federated search response, in backend order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    #[serde(rename = "_items")]
    pub items: Vec<Hit>,

    #[serde(rename = "_meta")]
    pub meta: ResponseMeta,

    #[serde(rename = "_aggregations", skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

impl SearchResponse {
    pub fn total(&self) -> u64 {
        self.meta.total
    }
}

/// Entry point for federated searches and cross-repository lookups
pub struct FederatedSearchService {
    config: Arc<FederationConfig>,
    visibility: VisibilityResolver,
    private_content: Arc<dyn PrivateContentFilter>,
    composer: QueryComposer,
    executor: SearchExecutor,
    dispatcher: ResultDispatcher,
    lookup: CrossRepositoryLookup,
}

impl FederatedSearchService {
    /// Create the service.
    ///
    /// Archive drafts are restricted with [`DraftOwnershipFilter`] and hooks do
    /// nothing until replaced with the `with_*` methods.
    pub fn new(
        config: FederationConfig,
        backend: Arc<dyn SearchBackend>,
        directory: Arc<dyn UserDirectory>,
    ) -> FederationResult<Self> {
        config.validate()?;
        let config = Arc::new(config);

        Ok(Self {
            visibility: VisibilityResolver::new(directory),
            private_content: Arc::new(DraftOwnershipFilter),
            composer: QueryComposer::new(config.clone()),
            executor: SearchExecutor::new(backend.clone()),
            dispatcher: ResultDispatcher::default(),
            lookup: CrossRepositoryLookup::new(backend, config.repositories.clone()),
            config,
        })
    }

    /// Replace the working repository's private-content rule
    pub fn with_private_content(mut self, filter: Arc<dyn PrivateContentFilter>) -> Self {
        self.private_content = filter;
        self
    }

    /// Replace the post-fetch hooks
    pub fn with_hooks(mut self, hooks: HookRegistry) -> Self {
        self.dispatcher = ResultDispatcher::new(hooks);
        self
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Repositories this service searches, in priority order
    pub fn repositories(&self) -> &[RepositoryId] {
        &self.config.repositories
    }

    pub fn backend_name(&self) -> &str {
        self.executor.backend().name()
    }

    /// Run one federated search for `user`.
    ///
    /// Repositories are resolved and the caller's DSL parsed before anything
    /// touches the backend. Stage visibility must resolve, or nothing is searched.
    #[instrument(skip(self, request, user), fields(user_id = user.user_id().unwrap_or("anonymous")))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        user: &UserContext,
    ) -> FederationResult<SearchResponse> {
        let result = self.run_search(request, user).await;

        FEDERATED_SEARCHES_TOTAL
            .with_label_values(&[outcome_label(&result)])
            .inc();

        result
    }

    async fn run_search(
        &self,
        request: &SearchRequest,
        user: &UserContext,
    ) -> FederationResult<SearchResponse> {
        let repos = resolver::resolve(&request.repo, &self.config.repositories)?;

        // Surface malformed DSL before the directory is consulted
        request.parse_source()?;

        let invisible_stages = self.visibility.invisible_stages(user).await?;
        let private_content = self.private_content.private_filter(user);

        let query = self.composer.compose(
            request,
            &repos,
            &invisible_stages,
            private_content.as_ref(),
        )?;

        let projection = request.projected_fields();
        let outcome = self
            .executor
            .execute(&query, &repos, projection.as_deref())
            .await?;

        let grouped = self.dispatcher.dispatch(outcome.hits, &repos);
        for bucket in &grouped.buckets {
            SEARCH_HITS_TOTAL
                .with_label_values(&[bucket.repo.as_str()])
                .inc_by(bucket.items.len() as f64);
        }

        let items = grouped.into_ordered();
        info!(
            repositories = repos.len(),
            invisible_stages = invisible_stages.len(),
            items = items.len(),
            total = outcome.total,
            "Federated search completed"
        );

        Ok(SearchResponse {
            items,
            meta: ResponseMeta {
                total: outcome.total,
            },
            aggregations: outcome.aggregations,
        })
    }

    /// Find one document by id, probing repositories in priority order
    #[instrument(skip(self, selector, user), fields(user_id = user.user_id().unwrap_or("anonymous")))]
    pub async fn find_one(
        &self,
        id: &str,
        selector: &RepoSelector,
        user: &UserContext,
    ) -> FederationResult<Option<Hit>> {
        if id.trim().is_empty() {
            return Err(FederationError::validation("document id must not be empty", id));
        }

        let private_content = self.private_content.private_filter(user);
        self.lookup
            .find_one(id, selector, private_content.as_ref())
            .await
    }
}

fn outcome_label<T>(result: &FederationResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(FederationError::Validation { .. }) => "validation_error",
        Err(FederationError::Directory(_)) => "directory_error",
        Err(FederationError::SearchBackend(_)) | Err(FederationError::BackendTimeout(_)) => {
            "backend_error"
        }
        Err(FederationError::InvalidConfiguration(_)) => "configuration_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::backend::InMemoryBackend;
    use crate::federation::visibility::{StaticUserDirectory, UnavailableDirectory};
    use serde_json::json;

    fn backend() -> Arc<InMemoryBackend> {
        Arc::new(InMemoryBackend::with_documents(vec![
            json!({ "_id": "i1", "_type": "ingest", "headline": "one" }),
            json!({ "_id": "a1", "_type": "archive", "state": "in_progress", "task": { "stage": "s1" } }),
            json!({ "_id": "a2", "_type": "archive", "state": "in_progress", "task": { "stage": "s2" } }),
        ]))
    }

    fn service(backend: Arc<InMemoryBackend>) -> FederatedSearchService {
        let directory = StaticUserDirectory::default().with_user("u1", ["s1"]);
        FederatedSearchService::new(FederationConfig::default(), backend, Arc::new(directory)).unwrap()
    }

    #[tokio::test]
    async fn test_search_applies_user_visibility() {
        let service = service(backend());
        let response = service
            .search(&SearchRequest::new(), &UserContext::identified("u1"))
            .await
            .unwrap();

        let ids: Vec<_> = response.items.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["i1", "a2"]);
        assert_eq!(response.total(), 2);
    }

    #[tokio::test]
    async fn test_validation_happens_before_backend() {
        let backend = backend();
        let service = service(backend.clone());

        let err = service
            .search(
                &SearchRequest::new().with_repo(RepoSelector::parse(Some("nope"))),
                &UserContext::anonymous(),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = service
            .search(&SearchRequest::new().with_source("{not json"), &UserContext::anonymous())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(backend.search_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_failure_fails_closed() {
        let backend = backend();
        let service = FederatedSearchService::new(
            FederationConfig::default(),
            backend.clone(),
            Arc::new(UnavailableDirectory),
        )
        .unwrap();

        let err = service
            .search(&SearchRequest::new(), &UserContext::identified("u1"))
            .await
            .unwrap_err();
        assert!(matches!(err, FederationError::Directory(_)));
        assert_eq!(backend.search_count(), 0);
    }

    #[tokio::test]
    async fn test_response_serializes_with_meta() {
        let service = service(backend());
        let response = service
            .search(
                &SearchRequest::new().with_repo(RepoSelector::parse(Some("ingest"))),
                &UserContext::anonymous(),
            )
            .await
            .unwrap();

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["_meta"]["total"], json!(1));
        assert_eq!(body["_items"][0]["_links"]["self"]["href"], json!("/ingest/i1"));
        assert!(body.get("_aggregations").is_none());
    }

    #[tokio::test]
    async fn test_find_one_rejects_blank_id() {
        let service = service(backend());
        let err = service
            .find_one(" ", &RepoSelector::All, &UserContext::anonymous())
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
