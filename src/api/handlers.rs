use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::federation::{Hit, RepoSelector, SearchRequest, SearchResponse, UserContext};
use crate::metrics;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use validator::Validate;

/// Header carrying the authenticated user's id
pub const USER_ID_HEADER: &str = "x-user-id";

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.service.backend_name().to_string(),
        repositories: state
            .service
            .repositories()
            .iter()
            .map(|r| r.as_str().to_string())
            .collect(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    pub repositories: Vec<String>,
}

/// Prometheus exposition endpoint
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

/// Run a federated search
#[instrument(skip(state, headers), fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    params.validate()?;

    let request = params.into_request()?;
    let user = user_from_headers(&headers);

    let response = state.service.search(&request, &user).await?;
    Ok(Json(response))
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct SearchParams {
    /// Comma-separated repository names
    #[validate(length(max = 256))]
    pub repo: Option<String>,

    /// Query DSL as JSON text
    #[validate(length(max = 65536))]
    pub source: Option<String>,

    /// JSON array of field names to return
    #[validate(length(max = 4096))]
    pub projections: Option<String>,

    /// `1` or `true` to attach aggregations
    pub aggregations: Option<String>,

    /// `1` or `true` to attach highlights
    pub es_highlight: Option<String>,
}

impl SearchParams {
    /// Turn the wire parameters into a search request
    pub fn into_request(self) -> Result<SearchRequest> {
        let mut request = SearchRequest::new()
            .with_repo(RepoSelector::parse(self.repo.as_deref()))
            .with_aggregations(is_enabled(self.aggregations.as_deref()))
            .with_highlight(is_enabled(self.es_highlight.as_deref()));

        if let Some(source) = self.source {
            request = request.with_source(source);
        }

        if let Some(raw) = self.projections.as_deref().filter(|p| !p.trim().is_empty()) {
            let fields: Vec<String> = serde_json::from_str(raw).map_err(|e| {
                AppError::Validation(format!("projections must be a JSON array of field names: {}", e))
            })?;
            request = request.with_projection(fields);
        }

        Ok(request)
    }
}

/// Fetch one document by id across repositories
#[instrument(skip(state, headers), fields(request_id = %uuid::Uuid::new_v4()))]
pub async fn get_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<LookupParams>,
) -> Result<Json<Hit>> {
    let selector = RepoSelector::parse(params.repo.as_deref());
    let user = user_from_headers(&headers);

    state
        .service
        .find_one(&id, &selector, &user)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LookupParams {
    pub repo: Option<String>,
}

fn user_from_headers(headers: &HeaderMap) -> UserContext {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(UserContext::identified)
        .unwrap_or_default()
}

fn is_enabled(flag: Option<&str>) -> bool {
    matches!(
        flag.map(|f| f.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}
