//! In-memory search backend
//!
//! Keeps documents in insertion order and answers queries by evaluating the
//! rendered request body: the `query.filtered.filter` clause is parsed back into
//! a [`SecurityFilter`] and applied to every candidate, so whatever the
//! composer sends is exactly what restricts the results.

use super::{BackendResponse, RawHit, SearchBackend};
use crate::federation::composer::ComposedQuery;
use crate::federation::error::{FederationError, FederationResult};
use crate::federation::filter::{field_values, SecurityFilter};
use crate::federation::repository::RepositoryId;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_PAGE_SIZE: usize = 10;
const DEFAULT_BUCKETS: usize = 10;

/// Search backend holding its documents in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<Vec<Value>>,
    searches: AtomicUsize,
    probes: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents<I>(documents: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let backend = Self::new();
        for document in documents {
            backend.insert(document);
        }
        backend
    }

    /// Add a document. It needs `_id` and `_type` to ever be found.
    pub fn insert(&self, document: Value) {
        self.documents.write().push(document);
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of federated searches served
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of single-repository probes served
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(
        &self,
        query: &ComposedQuery,
        types: &[RepositoryId],
        projection: Option<&[String]>,
    ) -> FederationResult<BackendResponse> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        let body = query.to_body();
        let filter = match body.pointer("/query/filtered/filter") {
            Some(dsl) => Some(SecurityFilter::from_dsl(dsl).ok_or_else(|| {
                FederationError::SearchBackend(format!("unsupported filter clause: {}", dsl))
            })?),
            None => None,
        };
        let text_terms = body
            .pointer("/query/filtered/query/query_string/query")
            .and_then(Value::as_str)
            .map(text_terms)
            .unwrap_or_default();
        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body
            .get("size")
            .and_then(Value::as_u64)
            .map(|s| s as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE);

        let type_names: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
        let documents = self.documents.read();

        let mut scanned = 0u64;
        let mut matched: Vec<&Value> = Vec::new();
        for document in documents.iter() {
            let in_types = document
                .get("_type")
                .and_then(Value::as_str)
                .map(|t| type_names.contains(&t))
                .unwrap_or(false);
            if !in_types {
                continue;
            }

            if let Some(cap) = query.scan_cap {
                if scanned >= cap {
                    break;
                }
            }
            scanned += 1;

            let admitted = filter.as_ref().map(|f| f.matches(document)).unwrap_or(true);
            if admitted && matches_text(document, &text_terms) {
                matched.push(document);
            }
        }

        let aggregations = body
            .get("aggs")
            .and_then(Value::as_object)
            .map(|aggs| aggregate(aggs, &matched));

        let hits = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|document| to_raw_hit(document, projection))
            .collect();

        Ok(BackendResponse {
            hits,
            total: matched.len() as u64,
            aggregations,
        })
    }

    async fn find_first(
        &self,
        repo: RepositoryId,
        filter: &SecurityFilter,
    ) -> FederationResult<Option<RawHit>> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        let documents = self.documents.read();
        Ok(documents
            .iter()
            .filter(|d| d.get("_type").and_then(Value::as_str) == Some(repo.as_str()))
            .find(|d| filter.matches(d))
            .map(|d| to_raw_hit(d, None)))
    }
}

fn text_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|term| term.trim_matches(|c| c == '*' || c == '"').to_lowercase())
        .filter(|term| !term.is_empty())
        .collect()
}

fn matches_text(document: &Value, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }

    let mut text = String::new();
    collect_text(document, &mut text);
    let text = text.to_lowercase();
    terms.iter().all(|term| text.contains(term.as_str()))
}

fn collect_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => {
            out.push_str(s);
            out.push(' ');
        }
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_text(v, out)),
        _ => {}
    }
}

fn aggregate(aggs: &Map<String, Value>, matched: &[&Value]) -> Value {
    let mut results = Map::new();

    for (name, definition) in aggs {
        let Some(field) = definition.pointer("/terms/field").and_then(Value::as_str) else {
            continue;
        };
        let limit = definition
            .pointer("/terms/size")
            .and_then(Value::as_u64)
            .map(|s| s as usize)
            .unwrap_or(DEFAULT_BUCKETS);

        let mut counts: HashMap<String, u64> = HashMap::new();
        for document in matched {
            for value in field_values(document, field) {
                let key = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => continue,
                    other => other.to_string(),
                };
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut buckets: Vec<(String, u64)> = counts.into_iter().collect();
        buckets.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        buckets.truncate(limit);

        let buckets: Vec<Value> = buckets
            .into_iter()
            .map(|(key, count)| json!({ "key": key, "doc_count": count }))
            .collect();
        results.insert(name.clone(), json!({ "buckets": buckets }));
    }

    Value::Object(results)
}

fn to_raw_hit(document: &Value, projection: Option<&[String]>) -> RawHit {
    let id = document
        .get("_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let doc_type = document
        .get("_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut body = document.as_object().cloned().unwrap_or_default();
    if let Some(fields) = projection {
        body.retain(|key, _| {
            key == "_id"
                || key == "_type"
                || fields
                    .iter()
                    .any(|f| f == key || f.split('.').next() == Some(key.as_str()))
        });
    }

    RawHit {
        id,
        doc_type,
        document: body,
    }
}
