#![cfg(feature = "server")]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::routing::get;
use serde_json::Value;
use shortly_database::Database;
use shortly_kernel::domain::config::ApiConfig;
use shortly_kernel::security::Principal;
use shortly_kernel::server::router::system_router;
use shortly_kernel::server::{ApiState, AuthUser};
use tower::ServiceExt;

fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.security.jwt.secret = "test-secret".into();
    config
}

async fn state() -> ApiState {
    let database =
        Database::builder().url("mem://").session("test", "kernel").init().await.unwrap();
    ApiState::builder().config(test_config()).db(database).build().unwrap()
}

async fn app() -> (ApiState, Router) {
    let state = state().await;
    let (router, _) = system_router().split_for_parts();
    let router = router
        .route("/whoami", get(|user: AuthUser| async move { user.email.clone() }))
        .with_state(state.clone());
    (state, router)
}

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec())
}

fn detail(body: &[u8]) -> String {
    let value: Value = serde_json::from_slice(body).unwrap();
    value["detail"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn health_is_not_cached() {
    let (_, router) = app().await;
    let response =
        router.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store, no-cache, must-revalidate");

    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
    assert_eq!(body["queued_tasks"], 0);
}

#[tokio::test]
async fn uptime_counts_from_state_build() {
    let (_, router) = app().await;
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let (status, body) = call(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["uptime"].as_u64().unwrap() >= 1, "{body}");
}

#[tokio::test]
async fn state_without_a_jwt_secret_is_refused() {
    let database = Database::builder().url("mem://").session("test", "kernel").init().await.unwrap();
    let err = ApiState::builder().config(ApiConfig::default()).db(database).build().unwrap_err();
    assert!(err.to_string().contains("JWT secret is empty"), "{err}");
}

#[tokio::test]
async fn missing_token_is_forbidden() {
    let (_, router) = app().await;
    let (status, body) = call(&router, Request::get("/whoami").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(detail(&body), "Not authenticated");
}

#[tokio::test]
async fn valid_token_resolves_principal() {
    let (state, router) = app().await;
    let token = state
        .tokens
        .issue(Principal { email: "bob@example.com".into(), role: "user".into(), is_active: true })
        .unwrap();

    let request = Request::get("/whoami")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"bob@example.com");
}

#[tokio::test]
async fn revoked_token_is_rejected_with_reason() {
    let (state, router) = app().await;
    let token = state
        .tokens
        .issue(Principal { email: "bob@example.com".into(), role: "user".into(), is_active: true })
        .unwrap();
    state.tokens.revoke(&token);

    let request = Request::get("/whoami")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&router, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(detail(&body), "Invalid authentication credentials: Token has been revoked");
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let (_, router) = app().await;
    let (status, body) =
        call(&router, Request::get("/api/tasks/nope").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(detail(&body), "Task not found");
}
