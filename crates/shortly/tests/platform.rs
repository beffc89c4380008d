use axum::body::Body;
use axum::http::{Request, StatusCode};
use shortly::domain::config::ApiConfig;
use shortly::kernel::server::ApiState;
use shortly_database::Database;
use shortly_event_bus::EventBus;
use tower::ServiceExt;

fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.security.jwt.secret = "test-secret".into();
    config
}

async fn state(config: &ApiConfig) -> ApiState {
    let database = Database::builder()
        .url("mem://")
        .session("test", "platform")
        .migrations(shortly::migrations())
        .init()
        .await
        .unwrap();
    let events = EventBus::new();
    let tasks = shortly::task_queue(config);
    let slices = shortly::init(config, &database, &events, &tasks).unwrap();

    ApiState::builder()
        .config(config.clone())
        .db(database)
        .events(events)
        .tasks(tasks)
        .register_slices(slices)
        .build()
        .unwrap()
}

#[tokio::test]
async fn every_slice_is_registered() {
    let state = state(&test_config()).await;
    assert_eq!(state.slice_names(), vec!["Assistant", "Chat", "Identity", "Links", "Mail"]);
    assert_eq!(shortly::features::ENABLED.len(), 5);
    assert!(shortly::features::is_enabled("chat"));
    assert!(!shortly::features::is_enabled("billing"));
}

#[tokio::test]
async fn background_tasks_are_registered() {
    let config = test_config();
    let state = state(&config).await;
    for task in [
        shortly::features::links::EXPIRE_URLS,
        shortly::features::mail::PARSE_GMAIL_EMAILS,
        shortly::features::mail::PARSE_OUTLOOK_EMAILS,
        shortly::features::mail::FETCH_EMAILS_FROM_DB,
    ] {
        assert!(state.tasks.is_registered(task), "{task}");
    }

    let scheduler = shortly::scheduler(&state.tasks).unwrap();
    assert_eq!(scheduler.entries().len(), 1);
    assert_eq!(scheduler.entries()[0].task, shortly::features::links::EXPIRE_URLS);
}

#[tokio::test]
async fn combined_router_serves_health_and_documents_every_slice() {
    let state = state(&test_config()).await;
    let (router, api) = shortly::router().split_for_parts();

    let paths: Vec<&str> = api.paths.paths.keys().map(String::as_str).collect();
    for expected in [
        "/health",
        "/api/tasks/{task_id}",
        "/api/auth/register",
        "/api/shorten",
        "/api/chat/",
        "/api/emails/gmail",
        "/api/ask",
    ] {
        assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
    }

    let response = router
        .with_state(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn migrations_cover_every_store() {
    let slices: Vec<&str> = shortly::migrations().iter().map(|m| m.slice()).collect();
    assert_eq!(slices, vec!["identity", "links", "chat", "mail"]);
}
