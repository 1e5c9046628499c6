use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use tracing::info;
use validator::Validate;

use crate::{
    auth::Claims,
    error::{ApiError, Result},
    models::*,
    state::AppState,
};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
    })
}

/// Prometheus metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Metrics in Prometheus text format", body = String),
        (status = 404, description = "Metrics collection disabled")
    ),
    tag = "health"
)]
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.export_prometheus().await {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Protected sample resource
///
/// Reached only after authentication and the subject check succeed.
#[utoipa::path(
    get,
    path = "/secured",
    responses(
        (status = 200, description = "Subject check passed", body = SecuredResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorResponse),
        (status = 402, description = "Verifier rejected the subject", body = ErrorResponse),
        (status = 500, description = "Verifier could not be reached", body = ErrorResponse)
    ),
    tag = "secured"
)]
pub async fn secured(Extension(claims): Extension<Claims>) -> Json<SecuredResponse> {
    Json(SecuredResponse {
        good: "to go".to_string(),
        subject: claims.sub,
    })
}

/// Verdict cache statistics
#[utoipa::path(
    get,
    path = "/admin/cache",
    responses(
        (status = 200, description = "Cache statistics", body = CacheStatsResponse),
        (status = 403, description = "Admin key missing or wrong", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(state.engine.cache_stats().into())
}

/// Drop every cached verdict
#[utoipa::path(
    delete,
    path = "/admin/cache",
    responses(
        (status = 204, description = "Cache cleared"),
        (status = 403, description = "Admin key missing or wrong", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.engine.clear_cache();
    StatusCode::NO_CONTENT
}

/// Current subject-check configuration
#[utoipa::path(
    get,
    path = "/admin/config",
    responses(
        (status = 200, description = "Live configuration", body = ConfigBody),
        (status = 403, description = "Admin key missing or wrong", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigBody> {
    Json(state.engine.settings().into())
}

/// Replace the subject-check configuration
///
/// Takes effect on the next request; cached verdicts are kept. A blank
/// endpoint disables the check.
#[utoipa::path(
    put,
    path = "/admin/config",
    request_body = ConfigBody,
    responses(
        (status = 200, description = "Configuration replaced", body = ConfigBody),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 403, description = "Admin key missing or wrong", body = ErrorResponse)
    ),
    tag = "admin"
)]
pub async fn update_config(
    State(state): State<AppState>,
    Json(body): Json<ConfigBody>,
) -> Result<Json<ConfigBody>> {
    let body = body.normalized();
    body.validate()
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let config: subcheck::SubCheckConfig = body.into();
    info!(
        check_enabled = config.is_check_enabled(),
        allow_reads = config.allow_reads,
        allow_deletes = config.allow_deletes,
        "Subject-check configuration replaced"
    );
    state.config.replace(config);

    Ok(Json(state.engine.settings().into()))
}
