//! Elasticsearch backend over HTTP

use super::{BackendResponse, RawHit, SearchBackend};
use crate::federation::composer::ComposedQuery;
use crate::federation::error::{FederationError, FederationResult};
use crate::federation::filter::SecurityFilter;
use crate::federation::repository::RepositoryId;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Connection settings for the Elasticsearch cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub url: String,

    /// Index holding every repository's documents
    pub index: String,

    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "superdesk".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Search backend talking to Elasticsearch
#[derive(Clone)]
pub struct ElasticBackend {
    client: Client,
    config: ElasticConfig,
}

impl ElasticBackend {
    pub fn new(config: ElasticConfig) -> FederationResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                FederationError::InvalidConfiguration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn search_url(&self, types: &[RepositoryId]) -> String {
        let types: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        format!(
            "{}/{}/{}/_search",
            self.config.url.trim_end_matches('/'),
            self.config.index,
            types.join(",")
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> FederationError {
        if err.is_timeout() {
            FederationError::BackendTimeout(format!(
                "no answer from {} after {} seconds",
                self.config.url, self.config.timeout_secs
            ))
        } else {
            FederationError::from(err)
        }
    }

    async fn post(&self, url: &str, body: &Value) -> FederationResult<Value> {
        debug!(url = %url, "Sending search request");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            warn!(error = %e, "Failed to read search backend response body");
            self.transport_error(e)
        })?;

        if !status.is_success() {
            warn!(status = %status, "Search backend returned non-success status");
            return Err(FederationError::SearchBackend(format!(
                "backend returned status {}: {}",
                status,
                if text.is_empty() { "No response body" } else { &text }
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            FederationError::SearchBackend(format!("malformed response body: {}", e))
        })
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    fn name(&self) -> &str {
        "elastic"
    }

    async fn search(
        &self,
        query: &ComposedQuery,
        types: &[RepositoryId],
        projection: Option<&[String]>,
    ) -> FederationResult<BackendResponse> {
        let mut body = query.to_body();
        if let (Some(fields), Some(map)) = (projection, body.as_object_mut()) {
            map.insert("_source".to_string(), json!(fields));
        }

        let response = self.post(&self.search_url(types), &body).await?;
        parse_response(response)
    }

    async fn find_first(
        &self,
        repo: RepositoryId,
        filter: &SecurityFilter,
    ) -> FederationResult<Option<RawHit>> {
        let body = json!({
            "query": { "filtered": { "filter": filter.to_dsl() } },
            "size": 1,
        });

        let response = self.post(&self.search_url(&[repo]), &body).await?;
        Ok(parse_response(response)?.hits.into_iter().next())
    }
}

/// Read hits, total and aggregations out of a `_search` response
fn parse_response(response: Value) -> FederationResult<BackendResponse> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| FederationError::SearchBackend("malformed response: missing hits".into()))?;

    let total = match response.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(t)) => t.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => hits.len() as u64,
    };

    let hits = hits.iter().map(parse_hit).collect::<FederationResult<Vec<_>>>()?;

    Ok(BackendResponse {
        hits,
        total,
        aggregations: response.get("aggregations").cloned(),
    })
}

fn parse_hit(hit: &Value) -> FederationResult<RawHit> {
    let id = hit
        .get("_id")
        .and_then(Value::as_str)
        .ok_or_else(|| FederationError::SearchBackend("malformed response: hit without _id".into()))?;
    let doc_type = hit
        .get("_type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            FederationError::SearchBackend(format!("malformed response: hit {} without _type", id))
        })?;

    let mut document: Map<String, Value> = hit
        .get("_source")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    document.insert("_id".to_string(), json!(id));
    document.insert("_type".to_string(), json!(doc_type));
    if let Some(highlight) = hit.get("highlight") {
        document.insert("es_highlight".to_string(), highlight.clone());
    }

    Ok(RawHit {
        id: id.to_string(),
        doc_type: doc_type.to_string(),
        document,
    })
}
