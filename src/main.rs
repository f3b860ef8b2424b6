use anyhow::Context;
use federated_search::{
    api::{build_router, AppState},
    config::{BackendKind, Config},
    federation::{
        CachedUserDirectory, ElasticBackend, FederatedSearchService, InMemoryBackend,
        SearchBackend, StaticUserDirectory,
    },
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config);

    config.validate_all().context("Invalid configuration")?;

    tracing::info!("Starting federated search v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = federated_search::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // Initialize search backend
    let backend = create_backend(&config)?;
    tracing::info!(backend = backend.name(), "Search backend initialized");

    // Initialize user directory
    let user_stages = config.visibility.user_stages();
    let users = user_stages.len();
    let directory = Arc::new(CachedUserDirectory::new(
        Arc::new(StaticUserDirectory::new(user_stages)),
        config.visibility.cache_capacity,
        Duration::from_secs(config.visibility.cache_ttl_secs),
    ));
    tracing::info!(
        users,
        ttl_secs = config.visibility.cache_ttl_secs,
        "User directory initialized"
    );

    let service = FederatedSearchService::new(config.search.clone(), backend, directory)
        .context("Failed to create search service")?;
    tracing::info!(
        repositories = ?service.repositories(),
        max_search_depth = ?service.config().max_search_depth.cap(),
        "Federated search service initialized"
    );

    let app = build_router(AppState::new(Arc::new(service)));

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Search: http://{}/search", http_addr);

    let http_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(http_listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down gracefully...");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "federated_search={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn create_backend(config: &Config) -> anyhow::Result<Arc<dyn SearchBackend>> {
    match config.backend.kind {
        BackendKind::Elastic => {
            let backend = ElasticBackend::new(config.backend.elastic())?;
            tracing::info!(url = %config.backend.url, index = %config.backend.index, "Using Elasticsearch backend");
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => {
            let backend = InMemoryBackend::new();
            if let Some(path) = &config.backend.seed_path {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read seed file {}", path.display()))?;
                let documents: Vec<serde_json::Value> = serde_json::from_str(&raw)
                    .with_context(|| format!("Seed file {} is not a JSON array", path.display()))?;
                for document in documents {
                    backend.insert(document);
                }
            }
            tracing::info!(documents = backend.len(), "Using in-memory backend");
            Ok(Arc::new(backend))
        }
    }
}
