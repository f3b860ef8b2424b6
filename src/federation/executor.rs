//! Single-call federated search execution

use crate::federation::backend::{BackendResponse, SearchBackend};
use crate::federation::composer::ComposedQuery;
use crate::federation::error::{FederationError, FederationResult};
use crate::federation::hit::Hit;
use crate::federation::repository::RepositoryId;
use crate::metrics::{BACKEND_ERRORS_TOTAL, BACKEND_SEARCH_DURATION_SECONDS};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Result of one federated backend call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    /// Hits in backend order, tagged with their repository
    pub hits: Vec<Hit>,

    /// Total number of matching documents
    pub total: u64,

    /// Aggregation results
    pub aggregations: Option<Value>,
}

/// Sends composed queries to the backend
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SearchBackend>,
}

impl SearchExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    /// Run `query` over every repository in `repos` with one backend call.
    ///
    /// Backend failures are returned as they are; nothing is retried here.
    pub async fn execute(
        &self,
        query: &ComposedQuery,
        repos: &[RepositoryId],
        projection: Option<&[String]>,
    ) -> FederationResult<SearchOutcome> {
        let start = Instant::now();
        let result = self.backend.search(query, repos, projection).await;
        BACKEND_SEARCH_DURATION_SECONDS
            .with_label_values(&[self.backend.name()])
            .observe(start.elapsed().as_secs_f64());

        let response = result.map_err(|e| {
            self.record_error(&e);
            e
        })?;

        let outcome = tag_hits(response, repos).map_err(|e| {
            self.record_error(&e);
            e
        })?;

        debug!(
            backend = self.backend.name(),
            hits = outcome.hits.len(),
            total = outcome.total,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Federated search executed"
        );

        Ok(outcome)
    }

    fn record_error(&self, err: &FederationError) {
        let kind = match err {
            FederationError::BackendTimeout(_) => "timeout",
            _ => "failure",
        };
        BACKEND_ERRORS_TOTAL
            .with_label_values(&[self.backend.name(), kind])
            .inc();
        error!(backend = self.backend.name(), error = %err, "Search backend call failed");
    }
}

/// Attach a repository to every hit from its backend type.
///
/// A type that is unknown, or that was not part of the request, means the
/// backend answered a different question than it was asked.
fn tag_hits(response: BackendResponse, repos: &[RepositoryId]) -> FederationResult<SearchOutcome> {
    let mut hits = Vec::with_capacity(response.hits.len());

    for (rank, raw) in response.hits.into_iter().enumerate() {
        let repo = RepositoryId::from_str(&raw.doc_type)
            .ok()
            .filter(|repo| repos.contains(repo))
            .ok_or_else(|| {
                FederationError::SearchBackend(format!(
                    "malformed response: hit {} has unexpected type {:?}",
                    raw.id, raw.doc_type
                ))
            })?;

        hits.push(Hit::new(repo, raw.id, rank, raw.document));
    }

    Ok(SearchOutcome {
        hits,
        total: response.total,
        aggregations: response.aggregations,
    })
}
