//! Route definitions for the gate
//!
//! - Health and metrics endpoints
//! - Protected sample resource behind `lockdown`
//! - Admin endpoints for the verdict cache and live configuration

use crate::{handlers, middleware, state::AppState};
use axum::{
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// OpenAPI documentation configuration
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Subject Check Gate",
        description = "Bearer-token gate with a cached external subject check"
    ),
    paths(
        handlers::health_check,
        handlers::metrics,
        handlers::secured,
        handlers::cache_stats,
        handlers::clear_cache,
        handlers::get_config,
        handlers::update_config,
    ),
    components(
        schemas(
            crate::models::HealthResponse,
            crate::models::SecuredResponse,
            crate::models::ConfigBody,
            crate::models::CacheStatsResponse,
            crate::models::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and monitoring endpoints"),
        (name = "secured", description = "Resources behind the subject check"),
        (name = "admin", description = "Cache and configuration control"),
    )
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let secured = Router::new()
        .route(
            "/secured",
            get(handlers::secured)
                .post(handlers::secured)
                .delete(handlers::secured),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::lockdown,
        ));

    let admin = Router::new()
        .route(
            "/admin/cache",
            get(handlers::cache_stats).delete(handlers::clear_cache),
        )
        .route(
            "/admin/config",
            get(handlers::get_config).put(handlers::update_config),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::admin_guard,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/api-docs/openapi.json", get(openapi))
        .merge(secured)
        .merge(admin)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
