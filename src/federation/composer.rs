//! Query composition
//!
//! Turns a caller's request into one self-contained backend query: the caller's
//! DSL, the OR of per-repository security filters, and the optional
//! aggregation, highlight and scan-depth blocks. Composition is pure; the same
//! inputs always produce the same [`ComposedQuery`].

use crate::federation::catalog::{self, STAGE_FIELD};
use crate::federation::config::FederationConfig;
use crate::federation::error::FederationResult;
use crate::federation::filter::SecurityFilter;
use crate::federation::repository::RepositoryId;
use crate::federation::request::SearchRequest;
use crate::federation::visibility::StageId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Location of the free-text clause in the caller's DSL
const QUERY_STRING_POINTER: &str = "/query/filtered/query/query_string";

/// A fully composed federated query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedQuery {
    /// Caller DSL after server-side defaults were applied
    pub source: Value,

    /// OR of the per-repository security filters
    pub filter: Option<SecurityFilter>,

    /// Aggregation definitions
    pub aggregations: Option<Map<String, Value>>,

    /// Highlight block
    pub highlight: Option<Value>,

    /// Maximum number of documents the backend may scan
    pub scan_cap: Option<u64>,
}

impl ComposedQuery {
    /// The free-text clause, if the caller sent one
    pub fn query_string(&self) -> Option<&Map<String, Value>> {
        self.source.pointer(QUERY_STRING_POINTER)?.as_object()
    }

    /// Render the backend request body.
    ///
    /// The security filter lands in `query.filtered.filter`. A filter the caller
    /// already placed there is kept and conjoined with it, and a caller query
    /// that is not `filtered` is wrapped so neither side is lost.
    pub fn to_body(&self) -> Value {
        let mut body = match &self.source {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };

        if let Some(filter) = &self.filter {
            let query = body.remove("query").unwrap_or_else(|| json!({}));
            body.insert("query".to_string(), attach_filter(query, filter.to_dsl()));
        }

        if let Some(aggregations) = &self.aggregations {
            body.insert("aggs".to_string(), Value::Object(aggregations.clone()));
        }

        if let Some(highlight) = &self.highlight {
            body.insert("highlight".to_string(), highlight.clone());
        }

        if let Some(cap) = self.scan_cap {
            body.insert("terminate_after".to_string(), json!(cap));
        }

        Value::Object(body)
    }
}

fn attach_filter(query: Value, security: Value) -> Value {
    let mut query = match query {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    let mut filtered = match query.remove("filtered") {
        Some(Value::Object(filtered)) => filtered,
        _ if query.is_empty() => Map::new(),
        _ => {
            // Wrap whatever the caller sent as the inner query
            let inner = Value::Object(std::mem::take(&mut query));
            let mut wrapped = Map::new();
            wrapped.insert("query".to_string(), inner);
            wrapped
        }
    };

    let combined = match filtered.remove("filter") {
        Some(existing) if !is_empty_object(&existing) => json!({ "and": [existing, security] }),
        _ => security,
    };
    filtered.insert("filter".to_string(), combined);
    query.insert("filtered".to_string(), Value::Object(filtered));

    Value::Object(query)
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().map(Map::is_empty).unwrap_or(false)
}

/// Security filter for a set of resolved repositories.
///
/// Each repository contributes its catalog filter; outside the inbound
/// repository it is conjoined with an exclusion of the invisible stages. The
/// result is `None` only when `repos` is empty.
pub fn security_filter(
    repos: &[RepositoryId],
    invisible_stages: &BTreeSet<StageId>,
    private_content: Option<&SecurityFilter>,
) -> Option<SecurityFilter> {
    let per_repo: Vec<SecurityFilter> = repos
        .iter()
        .map(|repo| {
            let base = catalog::filter_for(*repo, private_content);
            if !invisible_stages.is_empty() && repo.is_stage_scoped() {
                base.and_also(SecurityFilter::not(SecurityFilter::terms(
                    STAGE_FIELD,
                    invisible_stages.iter().cloned(),
                )))
            } else {
                base
            }
        })
        .collect();

    (!per_repo.is_empty()).then(|| SecurityFilter::or(per_repo))
}

/// Composes backend queries from requests
#[derive(Debug, Clone)]
pub struct QueryComposer {
    config: Arc<FederationConfig>,
}

impl QueryComposer {
    pub fn new(config: Arc<FederationConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Compose the query for one request.
    ///
    /// Fails only when the caller's DSL cannot be parsed.
    pub fn compose(
        &self,
        request: &SearchRequest,
        repos: &[RepositoryId],
        invisible_stages: &BTreeSet<StageId>,
        private_content: Option<&SecurityFilter>,
    ) -> FederationResult<ComposedQuery> {
        let mut source = request.parse_source()?;

        if let Some(query_string) = source
            .pointer_mut(QUERY_STRING_POINTER)
            .and_then(Value::as_object_mut)
        {
            query_string
                .entry("analyze_wildcard")
                .or_insert(Value::Bool(self.config.analyze_wildcard));
        }

        let aggregations = request
            .aggregations
            .then(|| self.config.aggregations.clone());

        let highlight = if request.highlight {
            source
                .pointer(QUERY_STRING_POINTER)
                .and_then(Value::as_object)
                .map(|query_string| self.highlight_block(query_string))
        } else {
            None
        };

        Ok(ComposedQuery {
            source,
            filter: security_filter(repos, invisible_stages, private_content),
            aggregations,
            highlight,
            scan_cap: self.config.max_search_depth.cap(),
        })
    }

    fn highlight_block(&self, query_string: &Map<String, Value>) -> Value {
        let highlight_query = json!({ "query_string": query_string });

        let fields: Map<String, Value> = self
            .config
            .highlight_fields
            .iter()
            .map(|field| {
                (
                    field.clone(),
                    json!({
                        "number_of_fragments": 0,
                        "highlight_query": highlight_query,
                    }),
                )
            })
            .collect();

        json!({
            "pre_tags": [self.config.highlight_pre_tag],
            "post_tags": [self.config.highlight_post_tag],
            "fields": fields,
        })
    }
}
