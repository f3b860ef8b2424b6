//! Search backend collaborators
//!
//! The executor and the cross-repository lookup only talk to the
//! [`SearchBackend`] trait. Two implementations ship with the crate: an
//! Elasticsearch client over HTTP and an in-memory store that evaluates the
//! security filter itself.

mod elastic;
mod memory;

pub use elastic::{ElasticBackend, ElasticConfig};
pub use memory::InMemoryBackend;

use crate::federation::composer::ComposedQuery;
use crate::federation::error::FederationResult;
use crate::federation::filter::SecurityFilter;
use crate::federation::repository::RepositoryId;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A document as returned by the backend, before repository tagging
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    /// Backend document id
    pub id: String,

    /// Backend type metadata
    pub doc_type: String,

    /// Document body, including `_id` and `_type`
    pub document: Map<String, Value>,
}

/// Everything one federated search call returns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendResponse {
    /// Hits in backend order
    pub hits: Vec<RawHit>,

    /// Total number of matching documents
    pub total: u64,

    /// Aggregation results, when aggregations were requested
    pub aggregations: Option<Value>,
}

/// The document-search cluster
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name, used in logs and metrics
    fn name(&self) -> &str;

    /// Run one federated query over all `types` at once
    async fn search(
        &self,
        query: &ComposedQuery,
        types: &[RepositoryId],
        projection: Option<&[String]>,
    ) -> FederationResult<BackendResponse>;

    /// First document of `repo` satisfying `filter`
    async fn find_first(
        &self,
        repo: RepositoryId,
        filter: &SecurityFilter,
    ) -> FederationResult<Option<RawHit>>;
}
