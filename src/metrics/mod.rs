/// Prometheus metrics for the federated search service.
///
/// Metrics cover:
/// - HTTP requests served by the API
/// - Federated searches and their outcome
/// - Search backend latency and failures
/// - Cross-repository lookup probes
///
/// # Example
/// ```no_run
/// use federated_search::metrics::FEDERATED_SEARCHES_TOTAL;
///
/// FEDERATED_SEARCHES_TOTAL.with_label_values(&["success"]).inc();
/// ```

mod middleware;

pub use middleware::track_http_metrics;

use lazy_static::lazy_static;
use prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "federated_search";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    // ============================================================================
    // Federation Metrics
    // ============================================================================

    /// Federated searches handled
    ///
    /// Labels: outcome (success, validation_error, backend_error, directory_error)
    pub static ref FEDERATED_SEARCHES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("federated_searches_total", "Total number of federated searches")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create FEDERATED_SEARCHES_TOTAL metric");

    /// Hits returned per repository
    ///
    /// Labels: repository
    pub static ref SEARCH_HITS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_hits_total", "Total number of hits returned per repository")
            .namespace(NAMESPACE),
        &["repository"]
    ).expect("Failed to create SEARCH_HITS_TOTAL metric");

    /// Search backend call duration in seconds
    ///
    /// Labels: backend
    pub static ref BACKEND_SEARCH_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "backend_search_duration_seconds",
            "Search backend call duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["backend"]
    ).expect("Failed to create BACKEND_SEARCH_DURATION_SECONDS metric");

    /// Search backend failures
    ///
    /// Labels: backend, kind (timeout, failure)
    pub static ref BACKEND_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("backend_errors_total", "Total number of search backend failures")
            .namespace(NAMESPACE),
        &["backend", "kind"]
    ).expect("Failed to create BACKEND_ERRORS_TOTAL metric");

    /// Single-repository probes made by cross-repository lookups
    ///
    /// Labels: repository, result (hit, miss)
    pub static ref LOOKUP_PROBES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("lookup_probes_total", "Total number of lookup probes")
            .namespace(NAMESPACE),
        &["repository", "result"]
    ).expect("Failed to create LOOKUP_PROBES_TOTAL metric");

    // ============================================================================
    // System Metrics
    // ============================================================================

    /// Build information
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register every metric with [`PROMETHEUS_REGISTRY`].
///
/// Safe to call more than once; metrics that are already registered are skipped.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(FEDERATED_SEARCHES_TOTAL.clone()),
        Box::new(SEARCH_HITS_TOTAL.clone()),
        Box::new(BACKEND_SEARCH_DURATION_SECONDS.clone()),
        Box::new(BACKEND_ERRORS_TOTAL.clone()),
        Box::new(LOOKUP_PROBES_TOTAL.clone()),
        Box::new(BUILD_INFO.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics for the /metrics endpoint
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
