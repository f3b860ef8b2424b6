use crate::error::{AppError, Result};
use crate::federation::{ElasticConfig, FederationConfig, StageId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Server configuration
    #[validate(nested)]
    pub server: ServerConfig,

    /// Federated search configuration
    #[serde(default)]
    pub search: FederationConfig,

    /// Search backend configuration
    #[validate(nested)]
    pub backend: BackendConfig,

    /// Stage visibility configuration
    #[serde(default)]
    #[validate(nested)]
    pub visibility: VisibilityConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, the file named by
    /// `FEDSEARCH_CONFIG` and the environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path = std::env::var("FEDSEARCH_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load configuration, reading overrides from `path` when given
    pub fn load_from(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        // Override with config file if it exists
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder
            // Override with environment variables (FEDSEARCH__SERVER__PORT=...)
            .add_source(
                config::Environment::with_prefix("FEDSEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Check field ranges and the federation settings together
    pub fn validate_all(&self) -> Result<()> {
        self.validate()?;
        self.search
            .validate()
            .map_err(|e| AppError::Configuration(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Elastic,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BackendConfig {
    /// Which backend serves searches
    #[serde(default)]
    pub kind: BackendKind,

    /// Elasticsearch base URL
    #[serde(default = "default_backend_url")]
    #[validate(url)]
    pub url: String,

    /// Index holding every repository
    #[serde(default = "default_index")]
    #[validate(length(min = 1))]
    pub index: String,

    /// Backend request timeout (seconds)
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,

    /// JSON array of documents loaded into the memory backend at startup
    pub seed_path: Option<PathBuf>,
}

impl BackendConfig {
    pub fn elastic(&self) -> ElasticConfig {
        ElasticConfig {
            url: self.url.clone(),
            index: self.index.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VisibilityConfig {
    /// How long a user's invisible stages are cached (seconds)
    #[serde(default = "default_cache_ttl")]
    #[validate(range(min = 1))]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached users
    #[serde(default = "default_cache_capacity")]
    #[validate(range(min = 1))]
    pub cache_capacity: u64,

    /// Invisible stages per user.
    ///
    /// A list of `[[visibility.users]]` tables rather than a map, since map
    /// keys are lowercased on load and user ids are case-sensitive.
    #[serde(default)]
    #[validate(nested)]
    pub users: Vec<UserStagesConfig>,
}

impl VisibilityConfig {
    /// Invisible stages keyed by user id. Repeated ids are merged.
    pub fn user_stages(&self) -> HashMap<String, BTreeSet<StageId>> {
        let mut table: HashMap<String, BTreeSet<StageId>> = HashMap::new();
        for user in &self.users {
            table
                .entry(user.id.clone())
                .or_default()
                .extend(user.invisible_stages.iter().cloned());
        }
        table
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserStagesConfig {
    /// User id, matched exactly against `X-User-Id`
    #[validate(length(min = 1))]
    pub id: String,

    /// Stages hidden from this user outside inbound
    #[serde(default)]
    pub invisible_stages: BTreeSet<StageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_backend_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "superdesk".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_cache_ttl() -> u64 {
    60
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
