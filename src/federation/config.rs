//! Federated search configuration

use crate::federation::error::FederationError;
use crate::federation::repository::RepositoryId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Cap on the number of documents the backend scans per request.
///
/// Configuration files express "no cap" as `-1`; inside the crate it is
/// simply `SearchDepth(None)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct SearchDepth(Option<u64>);

impl SearchDepth {
    pub const UNLIMITED: SearchDepth = SearchDepth(None);

    /// A finite cap. Zero means no cap.
    pub fn limited(depth: u64) -> Self {
        if depth == 0 {
            Self::UNLIMITED
        } else {
            SearchDepth(Some(depth))
        }
    }

    pub fn cap(&self) -> Option<u64> {
        self.0
    }
}

impl TryFrom<i64> for SearchDepth {
    type Error = FederationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 | 0 => Ok(Self::UNLIMITED),
            v if v > 0 => Ok(SearchDepth(Some(v as u64))),
            v => Err(FederationError::InvalidConfiguration(format!(
                "max_search_depth must be -1 (unlimited) or positive, got {}",
                v
            ))),
        }
    }
}

impl From<SearchDepth> for i64 {
    fn from(depth: SearchDepth) -> Self {
        depth.0.map(|d| d.min(i64::MAX as u64) as i64).unwrap_or(-1)
    }
}

/// Federated search configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederationConfig {
    /// Known repositories, in priority order
    #[serde(default = "default_repositories")]
    pub repositories: Vec<RepositoryId>,

    /// Maximum number of documents scanned per search (`-1` for no cap)
    #[serde(default)]
    pub max_search_depth: SearchDepth,

    /// Default `analyze_wildcard` for free-text clauses
    #[serde(default)]
    pub analyze_wildcard: bool,

    /// Named aggregation definitions attached when aggregations are requested
    #[serde(default = "default_aggregations")]
    pub aggregations: Map<String, Value>,

    /// Fields highlighted when highlighting is requested
    #[serde(default = "default_highlight_fields")]
    pub highlight_fields: Vec<String>,

    /// Tag inserted before a highlighted term
    #[serde(default = "default_highlight_pre_tag")]
    pub highlight_pre_tag: String,

    /// Tag inserted after a highlighted term
    #[serde(default = "default_highlight_post_tag")]
    pub highlight_post_tag: String,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            repositories: default_repositories(),
            max_search_depth: SearchDepth::UNLIMITED,
            analyze_wildcard: false,
            aggregations: default_aggregations(),
            highlight_fields: default_highlight_fields(),
            highlight_pre_tag: default_highlight_pre_tag(),
            highlight_post_tag: default_highlight_post_tag(),
        }
    }
}

impl FederationConfig {
    /// Reject configurations that cannot serve any search
    pub fn validate(&self) -> Result<(), FederationError> {
        if self.repositories.is_empty() {
            return Err(FederationError::InvalidConfiguration(
                "at least one repository must be configured".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(self.repositories.len());
        for repo in &self.repositories {
            if seen.contains(repo) {
                return Err(FederationError::InvalidConfiguration(format!(
                    "repository {} is listed twice",
                    repo
                )));
            }
            seen.push(*repo);
        }

        for (name, definition) in &self.aggregations {
            if !definition.is_object() {
                return Err(FederationError::InvalidConfiguration(format!(
                    "aggregation {} must be an object",
                    name
                )));
            }
        }

        Ok(())
    }
}

fn default_repositories() -> Vec<RepositoryId> {
    RepositoryId::ALL.to_vec()
}

fn default_aggregations() -> Map<String, Value> {
    let aggregations = json!({
        "type": { "terms": { "field": "type" } },
        "desk": { "terms": { "field": "task.desk", "size": 40 } },
        "stage": { "terms": { "field": "task.stage", "size": 40 } },
        "category": { "terms": { "field": "anpa_category.name", "size": 40 } },
        "source": { "terms": { "field": "source", "size": 40 } },
        "state": { "terms": { "field": "state", "size": 40 } },
        "urgency": { "terms": { "field": "urgency" } },
        "priority": { "terms": { "field": "priority" } },
        "genre": { "terms": { "field": "genre.name", "size": 40 } },
        "language": { "terms": { "field": "language" } }
    });

    match aggregations {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn default_highlight_fields() -> Vec<String> {
    ["body_html", "headline", "slugline", "abstract", "description_text"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_highlight_pre_tag() -> String {
    "<span class=\"es-highlight\">".to_string()
}

fn default_highlight_post_tag() -> String {
    "</span>".to_string()
}

/// Builder for FederationConfig
pub struct FederationConfigBuilder {
    config: FederationConfig,
}

impl FederationConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FederationConfig::default(),
        }
    }

    pub fn repositories(mut self, repositories: Vec<RepositoryId>) -> Self {
        self.config.repositories = repositories;
        self
    }

    pub fn max_search_depth(mut self, depth: SearchDepth) -> Self {
        self.config.max_search_depth = depth;
        self
    }

    pub fn analyze_wildcard(mut self, enabled: bool) -> Self {
        self.config.analyze_wildcard = enabled;
        self
    }

    pub fn aggregation(mut self, name: impl Into<String>, definition: Value) -> Self {
        self.config.aggregations.insert(name.into(), definition);
        self
    }

    pub fn highlight_fields(mut self, fields: Vec<String>) -> Self {
        self.config.highlight_fields = fields;
        self
    }

    pub fn build(self) -> FederationConfig {
        self.config
    }
}

impl Default for FederationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
