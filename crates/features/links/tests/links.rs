use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use shortly_database::Database;
use shortly_domain::config::LinksConfig;
use shortly_domain::events::Notification;
use shortly_event_bus::{EventBus, EventReceiverExt};
use shortly_kernel::domain::config::ApiConfig;
use shortly_kernel::server::ApiState;
use shortly_links::{EXPIRE_URLS, LinkRecord, Links};
use shortly_tasks::{TaskQueue, TaskState};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn test_config() -> ApiConfig {
    let mut config = ApiConfig::default();
    config.security.jwt.secret = "test-secret".into();
    config
}

/// Polls `check` until it yields a value or two seconds pass.
async fn wait_for<T, F, Fut>(mut check: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..200 {
        if let Some(value) = check().await {
            return Some(value);
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    None
}

struct Fixture {
    state: ApiState,
    router: Router,
    links: Links,
}

async fn fixture() -> Fixture {
    let database = Database::builder()
        .url("mem://")
        .session("test", "links")
        .migrations(shortly_links::migrations())
        .init()
        .await
        .unwrap();
    let events = EventBus::new();
    let tasks = TaskQueue::builder().workers(1).build();
    let config = LinksConfig { base_url: "http://sho.rt/api".into(), ..LinksConfig::default() };
    let links = shortly_links::init(&database, &events, &tasks, &config).unwrap();

    let state = ApiState::builder()
        .config(test_config())
        .db(database)
        .events(events)
        .tasks(tasks)
        .register_slice(links.clone().into())
        .build()
        .unwrap();
    let (router, _) = shortly_links::router().split_for_parts();
    Fixture { router: router.with_state(state.clone()), state, links }
}

async fn send(router: &Router, method: &str, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_owned());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, location, body)
}

async fn shorten(router: &Router, long_url: &str) -> String {
    let (status, _, body) = send(router, "POST", &format!("/api/shorten?long_url={long_url}")).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["short_url"].as_str().unwrap().to_owned()
}

fn code_of(short_url: &str) -> &str {
    short_url.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn shortening_is_idempotent_and_well_formed() {
    let fx = fixture().await;

    let first = shorten(&fx.router, "https://example.com/page").await;
    let second = shorten(&fx.router, "https://example.com/page").await;
    assert_eq!(first, second);

    let code = first.strip_prefix("http://sho.rt/api/short.ly/").unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    let other = shorten(&fx.router, "https://example.com/other").await;
    assert_ne!(first, other);
}

#[tokio::test]
async fn invalid_urls_are_rejected() {
    let fx = fixture().await;
    for bad in ["not-a-url", "ftp://example.com/file", "/relative"] {
        let (status, _, _) = send(&fx.router, "POST", &format!("/api/shorten?long_url={bad}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
    }
}

#[tokio::test]
async fn redirect_counts_every_click() {
    let fx = fixture().await;
    let short_url = shorten(&fx.router, "https://example.com/landing").await;
    let code = code_of(&short_url);

    let (status, _, body) = send(&fx.router, "GET", &format!("/api/short.ly/{code}/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "click_count": 0, "last_clicked_at": null }));

    for _ in 0..3 {
        let (status, location, _) = send(&fx.router, "GET", &format!("/api/short.ly/{code}")).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(location.as_deref(), Some("https://example.com/landing"));
    }

    let (_, _, body) = send(&fx.router, "GET", &format!("/api/short.ly/{code}/stats")).await;
    assert_eq!(body["click_count"], 3);
    assert!(body["last_clicked_at"].is_string());

    let (status, _, body) = send(&fx.router, "GET", "/api/short.ly/zzzzzz").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Short URL not found");
}

#[tokio::test]
async fn slug_lookup_update_and_delete() {
    let fx = fixture().await;
    let short_url = shorten(&fx.router, "https://example.com/one").await;
    let taken = shorten(&fx.router, "https://example.com/two").await;
    let code = code_of(&short_url);

    let (status, _, body) = send(&fx.router, "GET", &format!("/api/{code}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "long_url": "https://example.com/one" }));

    let (status, _, body) =
        send(&fx.router, "PUT", &format!("/api/{code}?new_long_url=https://example.com/uno")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "short_url": short_url, "long_url": "https://example.com/uno" }));

    // Cached value must not survive the update.
    let (_, _, body) = send(&fx.router, "GET", &format!("/api/{code}")).await;
    assert_eq!(body["long_url"], "https://example.com/uno");

    let (status, _, _) =
        send(&fx.router, "PUT", &format!("/api/{code}?new_long_url=https://example.com/two")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_ne!(code, code_of(&taken));

    let (status, _, _) = send(&fx.router, "PUT", &format!("/api/{code}?new_long_url=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(&fx.router, "DELETE", &format!("/api/{code}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Short URL deleted successfully");

    let (status, _, body) = send(&fx.router, "GET", &format!("/api/{code}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Slug not found");

    let (status, _, _) = send(&fx.router, "DELETE", &format!("/api/{code}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shortening_publishes_notifications() {
    let fx = fixture().await;
    let mut rx = fx.state.events.subscribe::<Notification>().unwrap();

    shorten(&fx.router, "https://example.com/news").await;
    shorten(&fx.router, "https://example.com/news").await;

    let created = rx.next_event().await.unwrap();
    let repeated = rx.next_event().await.unwrap();
    assert_eq!(created.topic, "links");
    assert_eq!(created.message, "New short URL created");
    assert_eq!(repeated.message, "Short URL already created");
}

fn record(code: &str, age_days: i64) -> LinkRecord {
    LinkRecord {
        code: code.to_owned(),
        long_url: format!("https://example.com/{code}"),
        short_url: format!("http://sho.rt/api/short.ly/{code}"),
        click_count: 0,
        last_clicked_at: None,
        created_at: (Utc::now() - Duration::days(age_days)).timestamp_millis(),
        updated_at: None,
    }
}

#[tokio::test]
async fn expiry_removes_only_old_links_across_batches() {
    let fx = fixture().await;
    for (code, age) in [("old001", 45), ("old002", 31), ("old003", 90), ("new001", 29), ("new002", 0)] {
        fx.links.store().insert(record(code, age)).await.unwrap().unwrap();
    }

    let deleted = fx.links.expire(2, Utc::now()).await.unwrap();
    assert_eq!(deleted, 3);

    for code in ["old001", "old002", "old003"] {
        assert!(fx.links.store().find_by_code(code).await.unwrap().is_none(), "{code}");
    }
    for code in ["new001", "new002"] {
        assert!(fx.links.store().find_by_code(code).await.unwrap().is_some(), "{code}");
    }
    assert_eq!(fx.links.expire(2, Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn expire_task_runs_on_the_queue() {
    let fx = fixture().await;
    fx.links.store().insert(record("stale1", 60)).await.unwrap().unwrap();

    let cancel = CancellationToken::new();
    let workers = fx.state.tasks.start(&cancel);
    let task_id = fx.state.tasks.enqueue(EXPIRE_URLS, json!({ "batch_size": 10 })).unwrap();

    let record = wait_for(|| {
        let status = fx.state.tasks.status(&task_id);
        async move { status.filter(|r| matches!(r.state, TaskState::Success | TaskState::Failure)) }
    })
    .await
    .unwrap();

    assert_eq!(record.state, TaskState::Success, "{:?}", record.error);
    let result = record.result.unwrap();
    assert_eq!(result["deleted"], 1);
    assert!(result["execution_time_ms"].is_u64());

    cancel.cancel();
    workers.join().await;
}

#[test]
fn expiry_is_scheduled_daily() {
    let schedules = shortly_links::schedules().unwrap();
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].task, EXPIRE_URLS);
}
