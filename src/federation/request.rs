//! Caller-supplied search request

use crate::federation::error::{FederationError, FederationResult};
use crate::federation::resolver::RepoSelector;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A federated search request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query DSL, as sent by the client
    pub source: Option<String>,

    /// Repositories to search
    #[serde(default)]
    pub repo: RepoSelector,

    /// Fields to return; `None` returns whole documents
    pub projection: Option<Vec<String>>,

    /// Attach the configured aggregations
    #[serde(default)]
    pub aggregations: bool,

    /// Attach a highlight block for the free-text clause
    #[serde(default)]
    pub highlight: bool,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_repo(mut self, repo: RepoSelector) -> Self {
        self.repo = repo;
        self
    }

    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_aggregations(mut self, enabled: bool) -> Self {
        self.aggregations = enabled;
        self
    }

    pub fn with_highlight(mut self, enabled: bool) -> Self {
        self.highlight = enabled;
        self
    }

    /// Parse the raw DSL into a JSON object.
    ///
    /// An absent or blank source is a match-all `filtered` query.
    pub fn parse_source(&self) -> FederationResult<Value> {
        let raw = match self.source.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Ok(json!({ "query": { "filtered": {} } })),
        };

        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| FederationError::validation(format!("malformed query source: {}", e), raw))?;

        if !parsed.is_object() {
            return Err(FederationError::validation(
                "query source must be a JSON object",
                raw,
            ));
        }

        if let Some(query) = parsed.get("query") {
            if !query.is_object() {
                return Err(FederationError::validation("`query` must be a JSON object", raw));
            }
        }

        Ok(parsed)
    }

    /// Projection with blank names removed; `None` when nothing remains
    pub fn projected_fields(&self) -> Option<Vec<String>> {
        let fields: Vec<String> = self
            .projection
            .as_ref()?
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();

        (!fields.is_empty()).then_some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_is_match_all() {
        let parsed = SearchRequest::new().parse_source().unwrap();
        assert_eq!(parsed, json!({ "query": { "filtered": {} } }));

        let blank = SearchRequest::new().with_source("   ").parse_source().unwrap();
        assert_eq!(blank, parsed);
    }

    #[test]
    fn test_malformed_source_is_validation_error() {
        let err = SearchRequest::new()
            .with_source("{\"query\": ")
            .parse_source()
            .unwrap_err();
        assert!(err.is_validation());

        let err = SearchRequest::new().with_source("[1, 2]").parse_source().unwrap_err();
        assert!(err.is_validation());

        let err = SearchRequest::new()
            .with_source("{\"query\": \"text\"}")
            .parse_source()
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_projection_cleanup() {
        let request = SearchRequest::new().with_projection(["headline", " ", "slugline"]);
        assert_eq!(
            request.projected_fields(),
            Some(vec!["headline".to_string(), "slugline".to_string()])
        );
        assert_eq!(SearchRequest::new().with_projection([""]).projected_fields(), None);
    }
}
