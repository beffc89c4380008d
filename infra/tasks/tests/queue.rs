use async_trait::async_trait;
use serde_json::{Value, json};
use shortly_tasks::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Double;

#[async_trait]
impl TaskHandler for Double {
    fn name(&self) -> &'static str {
        "double"
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let n = payload["n"].as_i64().ok_or_else(|| TaskError::failed("n is required"))?;
        Ok(json!({ "n": n * 2 }))
    }
}

#[derive(Debug)]
struct Explode;

#[async_trait]
impl TaskHandler for Explode {
    fn name(&self) -> &'static str {
        "explode"
    }

    async fn run(&self, _: Value) -> Result<Value, TaskError> {
        panic!("boom")
    }
}

#[derive(Debug, Default)]
struct Counter(Arc<AtomicUsize>);

#[async_trait]
impl TaskHandler for Counter {
    fn name(&self) -> &'static str {
        "count"
    }

    async fn run(&self, _: Value) -> Result<Value, TaskError> {
        Ok(json!(self.0.fetch_add(1, Ordering::SeqCst) + 1))
    }
}

async fn wait_for(queue: &TaskQueue, id: &str) -> TaskRecord {
    for _ in 0..200 {
        let record = queue.status(id).expect("record exists");
        if matches!(record.state, TaskState::Success | TaskState::Failure) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} did not finish");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_handler_and_stores_result() {
    let queue = TaskQueue::builder().workers(2).build();
    queue.register(Double);
    let cancel = CancellationToken::new();
    let pool = queue.start(&cancel);

    let id = queue.enqueue("double", json!({ "n": 21 })).unwrap();
    let record = wait_for(&queue, &id).await;

    assert_eq!(record.state, TaskState::Success);
    assert_eq!(record.result, Some(json!({ "n": 42 })));
    assert!(record.finished_at.is_some());

    cancel.cancel();
    pool.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handler_errors_and_panics_become_failures() {
    let queue = TaskQueue::builder().workers(1).build();
    queue.register(Double);
    queue.register(Explode);
    let cancel = CancellationToken::new();
    let pool = queue.start(&cancel);

    let bad = queue.enqueue("double", json!({})).unwrap();
    let record = wait_for(&queue, &bad).await;
    assert_eq!(record.state, TaskState::Failure);
    assert!(record.error.unwrap().contains("n is required"));

    let panicked = queue.enqueue("explode", json!({})).unwrap();
    assert_eq!(wait_for(&queue, &panicked).await.state, TaskState::Failure);

    // The worker survived the panic.
    let ok = queue.enqueue("double", json!({ "n": 1 })).unwrap();
    assert_eq!(wait_for(&queue, &ok).await.state, TaskState::Success);

    cancel.cancel();
    pool.join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn handlers_registered_after_start_are_used() {
    let queue = TaskQueue::builder().workers(1).build();
    let cancel = CancellationToken::new();
    let pool = queue.start(&cancel);

    assert!(!queue.is_registered("double"));
    queue.register(Double);
    let id = queue.enqueue("double", json!({ "n": 2 })).unwrap();
    assert_eq!(wait_for(&queue, &id).await.result, Some(json!({ "n": 4 })));

    cancel.cancel();
    pool.join().await;
}

#[tokio::test(start_paused = true)]
async fn scheduler_enqueues_on_interval() {
    let queue = TaskQueue::builder().workers(1).build();
    let hits = Arc::new(AtomicUsize::new(0));
    queue.register(Counter(hits.clone()));
    let cancel = CancellationToken::new();
    let pool = queue.start(&cancel);

    let mut scheduler = Scheduler::new(queue.clone());
    scheduler
        .add(ScheduledTask::new("count", Schedule::Every(Duration::from_secs(60)), json!({})))
        .unwrap();
    let timers = scheduler.start(&cancel);

    tokio::time::sleep(Duration::from_secs(185)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(hits.load(Ordering::SeqCst), 3);

    cancel.cancel();
    for timer in timers {
        timer.await.unwrap();
    }
    pool.join().await;
}
