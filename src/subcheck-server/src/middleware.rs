//! Middleware layer for the gate
//!
//! - Bearer authentication followed by the subject check (`lockdown`)
//! - Admin key guard
//! - Request ID tracking and request logging
//! - CORS configuration

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use subcheck::Outcome;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

/// Request ID header name
pub const X_REQUEST_ID: &str = "x-request-id";

/// Admin key header name
pub const X_ADMIN_KEY: &str = "x-admin-key";

/// Configure CORS middleware
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::HeaderName::from_static(X_REQUEST_ID),
            header::HeaderName::from_static(X_ADMIN_KEY),
        ])
        .expose_headers([header::HeaderName::from_static(X_REQUEST_ID)])
        .max_age(std::time::Duration::from_secs(3600))
}

fn request_id(request: &Request) -> Uuid {
    request
        .extensions()
        .get::<Uuid>()
        .copied()
        .unwrap_or_else(Uuid::new_v4)
}

/// Authenticate the bearer token, then run the subject check
///
/// Allow passes the request on with its [`Claims`](crate::auth::Claims) and
/// [`Decision`](subcheck::Decision) in the extensions. Deny answers 402 and a
/// verifier failure answers 500.
pub async fn lockdown(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let request_id = request_id(&request);

    let token = bearer_token(request.headers())
        .map_err(|e| {
            warn!(request_id = %request_id, error = %e, "Rejected request without usable token");
            e
        })?
        .to_string();

    let claims = state.validator.validate(&token).await.map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Token validation failed");
        e
    })?;

    let method = request.method().clone();
    let decision = state.engine.authorize(&method, &claims.sub).await;

    match decision.outcome {
        Outcome::Allow => {
            request.extensions_mut().insert(claims);
            request.extensions_mut().insert(decision);
            Ok(next.run(request).await)
        }
        Outcome::Deny => {
            info!(request_id = %request_id, subject = %claims.sub, "Subject check denied request");
            Err(ApiError::PaymentRequired(format!(
                "subject '{}' is not authorized",
                claims.sub
            )))
        }
        Outcome::Error => {
            error!(
                request_id = %request_id,
                subject = %claims.sub,
                reason = ?decision.reason,
                "Subject check could not be completed"
            );
            Err(ApiError::SubjectCheckFailed(format!("{:?}", decision.reason)))
        }
    }
}

/// Require the configured admin key on admin routes
pub async fn admin_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(X_ADMIN_KEY)
        .and_then(|v| v.to_str().ok());

    if provided == Some(expected) {
        Ok(next.run(request).await)
    } else {
        warn!(
            request_id = %request_id(&request),
            path = %request.uri().path(),
            "Admin request with missing or wrong key"
        );
        Err(ApiError::Forbidden("admin key required".to_string()))
    }
}

/// Request ID middleware
///
/// Reuses an incoming `x-request-id` UUID or generates one, and echoes it in
/// the response headers.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }

    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request_id(&request);

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let status = response.status();
    match status.as_u16() {
        500..=599 => error!(
            request_id = %request_id, method = %method, uri = %uri,
            status = status.as_u16(), duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
        400..=499 => warn!(
            request_id = %request_id, method = %method, uri = %uri,
            status = status.as_u16(), duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
        _ => info!(
            request_id = %request_id, method = %method, uri = %uri,
            status = status.as_u16(), duration_ms = elapsed.as_millis() as u64,
            "Request completed"
        ),
    }

    response
}
