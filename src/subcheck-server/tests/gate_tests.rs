//! End-to-end gate tests
//!
//! Drive the full router with bearer tokens while flipping the live
//! configuration and the verifier's behaviour between requests.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subcheck::{
    ConfigProvider, EngineConfig, HttpVerifier, MockClock, SharedConfig, SubCheckError, SubjectCache,
    SubjectCheckEngine, SubjectVerifier, VerdictCache, VerifierConfig,
};
use subcheck_server::{create_router, middleware::X_ADMIN_KEY, AppState, StaticTokenValidator};
use tower::ServiceExt;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "token-for-me";
const FAKE_URL: &str = "http://fake-url.com";

// ============================================================================
// TEST FIXTURES
// ============================================================================

#[derive(Clone, Copy)]
enum Reply {
    Status(u16),
    Boom,
}

struct ScriptedVerifier {
    reply: Mutex<Reply>,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    fn respond(&self, reply: Reply) {
        *self.reply.lock() = reply;
    }
}

#[async_trait]
impl SubjectVerifier for ScriptedVerifier {
    async fn check(&self, _endpoint: &str, _subject: &str) -> subcheck::Result<u16> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.reply.lock() {
            Reply::Status(status) => Ok(status),
            Reply::Boom => Err(SubCheckError::VerifierUnreachable("BOOM!".to_string())),
        }
    }
}

struct Gate {
    app: Router,
    config: SharedConfig,
    clock: MockClock,
    cache: Arc<SubjectCache>,
    verifier: Arc<ScriptedVerifier>,
}

fn gate() -> Gate {
    gate_with(|state| state)
}

fn gate_with(customize: impl FnOnce(AppState) -> AppState) -> Gate {
    let clock = MockClock::at(Utc.with_ymd_and_hms(2024, 3, 19, 16, 19, 0).unwrap());
    let cache = Arc::new(SubjectCache::with_clock(Arc::new(clock.clone())));
    let config = SharedConfig::default();
    let verifier = Arc::new(ScriptedVerifier {
        reply: Mutex::new(Reply::Status(200)),
        calls: AtomicUsize::new(0),
    });

    let engine = SubjectCheckEngine::new(
        EngineConfig::default(),
        Arc::new(config.clone()),
        cache.clone(),
        verifier.clone(),
    );
    let validator = StaticTokenValidator::new().with_token("me", TOKEN);
    let state = customize(AppState::new(engine, config.clone(), Arc::new(validator)));

    Gate {
        app: create_router(state),
        config,
        clock,
        cache,
        verifier,
    }
}

async fn call(app: &Router, method: Method, token: Option<&str>) -> StatusCode {
    let mut request = Request::builder().method(method).uri("/secured");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("bearer {token}"));
    }

    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

async fn get(app: &Router) -> StatusCode {
    call(app, Method::GET, Some(TOKEN)).await
}

async fn delete(app: &Router) -> StatusCode {
    call(app, Method::DELETE, Some(TOKEN)).await
}

// ============================================================================
// AUTHENTICATION GATE
// ============================================================================

#[tokio::test]
async fn test_missing_or_unknown_token_is_unauthorized() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);

    assert_eq!(call(&g.app, Method::GET, None).await, StatusCode::UNAUTHORIZED);
    assert_eq!(
        call(&g.app, Method::GET, Some("forged")).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(g.verifier.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_secured_body_carries_subject() {
    let g = gate();

    let response = g
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/secured")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["good"], "to go");
    assert_eq!(json["subject"], "me");
}

// ============================================================================
// SUBJECT CHECK SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_subject_check_success() {
    let g = gate();

    // Check skipped while no endpoint is configured
    assert_eq!(get(&g.app).await, StatusCode::OK);

    g.config.set_endpoint(FAKE_URL);
    g.verifier.respond(Reply::Status(404));
    assert_eq!(get(&g.app).await, StatusCode::PAYMENT_REQUIRED);

    // Denials are cached; start the next step from a clean cache
    g.cache.clear();
    g.verifier.respond(Reply::Boom);
    assert_eq!(get(&g.app).await, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(g.cache.is_empty());

    g.verifier.respond(Reply::Status(200));
    assert_eq!(get(&g.app).await, StatusCode::OK);
}

#[tokio::test]
async fn test_subject_check_uses_cache() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);

    g.verifier.respond(Reply::Status(200));
    assert_eq!(get(&g.app).await, StatusCode::OK);

    // Verifier is not called because the result is cached
    g.verifier.respond(Reply::Boom);
    g.clock.advance(Duration::from_secs(10 * 60));
    assert_eq!(get(&g.app).await, StatusCode::OK);
    assert_eq!(g.verifier.calls.load(Ordering::SeqCst), 1);

    // Cached result has expired
    g.clock
        .travel_to(Utc.with_ymd_and_hms(2024, 3, 19, 18, 19, 0).unwrap());
    assert_eq!(get(&g.app).await, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(g.verifier.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_subject_check_allow_reads() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);
    g.verifier.respond(Reply::Status(404));

    assert_eq!(get(&g.app).await, StatusCode::PAYMENT_REQUIRED);

    g.config.set_allow_reads(true);
    assert_eq!(get(&g.app).await, StatusCode::OK);

    // Not a read, so the check still applies
    assert_eq!(delete(&g.app).await, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_subject_check_allow_deletes() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);
    g.verifier.respond(Reply::Status(404));

    assert_eq!(delete(&g.app).await, StatusCode::PAYMENT_REQUIRED);

    g.config.set_allow_deletes(true);
    assert_eq!(delete(&g.app).await, StatusCode::OK);

    // Not a delete, so the check still applies
    assert_eq!(get(&g.app).await, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_real_http_verifier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("subject", "me"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = SharedConfig::new(subcheck::SubCheckConfig::with_endpoint(server.uri()));
    let engine = SubjectCheckEngine::new(
        EngineConfig::default(),
        Arc::new(config.clone()),
        Arc::new(SubjectCache::new()),
        Arc::new(HttpVerifier::new(VerifierConfig::default()).unwrap()),
    );
    let validator = StaticTokenValidator::new().with_token("me", TOKEN);
    let app = create_router(AppState::new(engine, config, Arc::new(validator)));

    assert_eq!(get(&app).await, StatusCode::PAYMENT_REQUIRED);
    // Second request served from the cached denial
    assert_eq!(get(&app).await, StatusCode::PAYMENT_REQUIRED);
}

// ============================================================================
// ADMIN SURFACE
// ============================================================================

fn admin_request(method: Method, uri: &str, key: Option<&str>, body: Option<&str>) -> Request<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        request = request.header(X_ADMIN_KEY, key);
    }
    match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_admin_clear_cache() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);
    g.verifier.respond(Reply::Status(404));
    assert_eq!(get(&g.app).await, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(g.cache.len(), 1);

    let response = g
        .app
        .clone()
        .oneshot(admin_request(Method::DELETE, "/admin/cache", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(g.cache.is_empty());

    g.verifier.respond(Reply::Status(200));
    assert_eq!(get(&g.app).await, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_config_update_takes_effect() {
    let g = gate();
    g.verifier.respond(Reply::Status(404));
    assert_eq!(delete(&g.app).await, StatusCode::OK);

    let body = format!(r#"{{"endpoint":"{FAKE_URL}","allow_reads":true}}"#);
    let response = g
        .app
        .clone()
        .oneshot(admin_request(Method::PUT, "/admin/config", None, Some(&body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(get(&g.app).await, StatusCode::OK);
    assert_eq!(delete(&g.app).await, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_admin_config_rejects_invalid_endpoint() {
    let g = gate();

    let response = g
        .app
        .clone()
        .oneshot(admin_request(
            Method::PUT,
            "/admin/config",
            None,
            Some(r#"{"endpoint":"not a url"}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!g.config.snapshot().is_check_enabled());
}

#[tokio::test]
async fn test_admin_config_blank_endpoint_disables_check() {
    let g = gate();
    g.config.set_endpoint(FAKE_URL);
    g.verifier.respond(Reply::Status(404));

    let response = g
        .app
        .clone()
        .oneshot(admin_request(
            Method::PUT,
            "/admin/config",
            None,
            Some(r#"{"endpoint":""}"#),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(!g.config.snapshot().is_check_enabled());
    assert_eq!(get(&g.app).await, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_key_required_when_configured() {
    let g = gate_with(|state| state.with_admin_key(Some("s3cret".to_string())));

    let denied = g
        .app
        .clone()
        .oneshot(admin_request(Method::GET, "/admin/config", None, None))
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let wrong = g
        .app
        .clone()
        .oneshot(admin_request(Method::DELETE, "/admin/cache", Some("nope"), None))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

    let allowed = g
        .app
        .clone()
        .oneshot(admin_request(Method::GET, "/admin/cache", Some("s3cret"), None))
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let g = gate();
    assert_eq!(get(&g.app).await, StatusCode::OK);

    let health = g
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let metrics = g
        .app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(metrics.status(), StatusCode::OK);
    let body = axum::body::to_bytes(metrics.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains(r#"subcheck_decisions_total{outcome="allow"} 1"#));
    assert!(text.contains("subcheck_bypassed_total 1"));
}
