use crate::error::TaskError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxhash::FxHashMap;
use moka::sync::Cache;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_CAPACITY: usize = 1024;
const DEFAULT_RESULT_TTL: Duration = Duration::from_secs(3600);
const MAX_TRACKED_RESULTS: u64 = 100_000;
const TASK_ID_LEN: usize = 21;

/// A named unit of background work.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Name jobs are enqueued under.
    fn name(&self) -> &'static str;

    async fn run(&self, payload: Value) -> Result<Value, TaskError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Started,
    Success,
    Failure,
}

/// Observable state of a single job.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub name: String,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Job {
    id: String,
    name: &'static str,
    payload: Value,
}

struct TaskQueueInner {
    handlers: RwLock<FxHashMap<&'static str, Arc<dyn TaskHandler>>>,
    sender: mpsc::Sender<Job>,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    records: Cache<String, TaskRecord>,
    workers: usize,
}

/// Cloneable handle to the shared queue.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<TaskQueueInner>,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.inner.handlers.read().keys().copied().collect();
        handlers.sort_unstable();
        f.debug_struct("TaskQueue")
            .field("handlers", &handlers)
            .field("workers", &self.inner.workers)
            .field("queued", &self.queued())
            .finish_non_exhaustive()
    }
}

#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug)]
pub struct TaskQueueBuilder {
    workers: usize,
    capacity: usize,
    result_ttl: Duration,
}

impl Default for TaskQueueBuilder {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, capacity: DEFAULT_CAPACITY, result_ttl: DEFAULT_RESULT_TTL }
    }
}

impl TaskQueueBuilder {
    /// Number of concurrent workers; at least one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Jobs that may wait before `enqueue` reports a full queue; at least one.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// How long a job's record stays queryable.
    pub const fn result_ttl(mut self, ttl: Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    pub fn build(self) -> TaskQueue {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let records =
            Cache::builder().max_capacity(MAX_TRACKED_RESULTS).time_to_live(self.result_ttl).build();

        TaskQueue {
            inner: Arc::new(TaskQueueInner {
                handlers: RwLock::default(),
                sender,
                receiver: Arc::new(Mutex::new(receiver)),
                records,
                workers: self.workers,
            }),
        }
    }
}

impl TaskQueue {
    pub fn builder() -> TaskQueueBuilder {
        TaskQueueBuilder::default()
    }

    /// Registers a handler; a later registration under the same name replaces it.
    pub fn register(&self, handler: impl TaskHandler) {
        let name = handler.name();
        if self.inner.handlers.write().insert(name, Arc::new(handler)).is_some() {
            warn!(task = name, "Task handler replaced");
        } else {
            debug!(task = name, "Task handler registered");
        }
    }

    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.handlers.read().contains_key(name)
    }

    /// Queues a job and returns its id.
    ///
    /// # Errors
    /// * [`TaskError::UnknownTask`] if no handler carries `name`.
    /// * [`TaskError::QueueFull`] if every slot is taken.
    /// * [`TaskError::QueueClosed`] if the receiving side is gone.
    pub fn enqueue(&self, name: &str, payload: Value) -> Result<String, TaskError> {
        let Some(name) = self.inner.handlers.read().get_key_value(name).map(|(key, _)| *key) else {
            return Err(TaskError::UnknownTask { message: name.to_owned().into(), context: None });
        };

        let id = nanoid::nanoid!(TASK_ID_LEN);
        let record = TaskRecord {
            task_id: id.clone(),
            name: name.to_owned(),
            state: TaskState::Pending,
            result: None,
            error: None,
            enqueued_at: Utc::now(),
            finished_at: None,
        };
        self.inner.records.insert(id.clone(), record);

        self.inner.sender.try_send(Job { id: id.clone(), name, payload }).map_err(|err| {
            self.inner.records.invalidate(&id);
            match err {
                mpsc::error::TrySendError::Full(_) => TaskError::QueueFull {
                    message: name.into(),
                    context: Some(format!("{} slots", self.inner.sender.max_capacity()).into()),
                },
                mpsc::error::TrySendError::Closed(_) => {
                    TaskError::QueueClosed { message: name.into(), context: None }
                },
            }
        })?;

        debug!(task = name, task_id = %id, "Task enqueued");
        Ok(id)
    }

    /// Jobs waiting for a free worker.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.sender.max_capacity() - self.inner.sender.capacity()
    }

    /// Current record of a job, `None` once unknown or expired.
    #[must_use]
    pub fn status(&self, task_id: &str) -> Option<TaskRecord> {
        self.inner.records.get(task_id)
    }

    /// Spawns the worker pool. Workers stop taking jobs once `cancel` fires;
    /// a job already running is finished first.
    pub fn start(&self, cancel: &CancellationToken) -> WorkerPool {
        let handles = (0..self.inner.workers)
            .map(|worker| {
                let queue = self.clone();
                let cancel = cancel.clone();
                tokio::spawn(
                    async move { queue.work(cancel).await }
                        .instrument(info_span!("task_worker", worker)),
                )
            })
            .collect();
        info!(workers = self.inner.workers, "Task workers started");
        WorkerPool { handles }
    }

    async fn work(&self, cancel: CancellationToken) {
        loop {
            let job = {
                let mut receiver = self.inner.receiver.lock().await;
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    job = receiver.recv() => job,
                }
            };
            let Some(job) = job else { break };
            self.execute(job).await;
        }
        debug!("Task worker stopped");
    }

    async fn execute(&self, job: Job) {
        let Some(handler) = self.inner.handlers.read().get(job.name).cloned() else {
            self.finish(&job.id, Err(format!("No handler for {}", job.name)));
            return;
        };

        self.update(&job.id, |record| record.state = TaskState::Started);
        let started = Instant::now();
        let payload = job.payload;

        // A panicking handler must not take the worker down with it.
        let outcome = match tokio::spawn(async move { handler.run(payload).await }).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(err.to_string()),
            Err(join) => Err(format!("Task aborted: {join}")),
        };

        let elapsed_ms = started.elapsed().as_millis();
        match &outcome {
            Ok(_) => info!(task = job.name, task_id = %job.id, elapsed_ms, "Task succeeded"),
            Err(err) => error!(task = job.name, task_id = %job.id, elapsed_ms, error = %err, "Task failed"),
        }
        self.finish(&job.id, outcome);
    }

    fn finish(&self, id: &str, outcome: Result<Value, String>) {
        self.update(id, |record| {
            record.finished_at = Some(Utc::now());
            match outcome {
                Ok(value) => {
                    record.state = TaskState::Success;
                    record.result = Some(value);
                },
                Err(err) => {
                    record.state = TaskState::Failure;
                    record.error = Some(err);
                },
            }
        });
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut TaskRecord)) {
        if let Some(mut record) = self.inner.records.get(id) {
            apply(&mut record);
            self.inner.records.insert(id.to_owned(), record);
        }
    }
}

/// Join handles of the running workers.
#[derive(Debug)]
#[must_use = "dropping the pool detaches the workers"]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub const fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every worker to exit.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "Task worker terminated abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn run(&self, _: Value) -> Result<Value, TaskError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let queue = TaskQueue::builder().build();
        let err = queue.enqueue("missing", json!({})).unwrap_err();
        assert!(matches!(err, TaskError::UnknownTask { .. }));
    }

    #[tokio::test]
    async fn enqueued_task_starts_pending() {
        let queue = TaskQueue::builder().build();
        queue.register(Noop);
        let id = queue.enqueue("noop", json!({})).unwrap();
        let record = queue.status(&id).unwrap();
        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.name, "noop");
    }

    #[tokio::test]
    async fn full_queue_is_reported_and_untracked() {
        let queue = TaskQueue::builder().capacity(1).build();
        queue.register(Noop);
        queue.enqueue("noop", json!({})).unwrap();
        let err = queue.enqueue("noop", json!({})).unwrap_err();
        assert!(matches!(err, TaskError::QueueFull { .. }));
        assert_eq!(queue.queued(), 1);
        queue.inner.records.run_pending_tasks();
        assert_eq!(queue.inner.records.entry_count(), 1);
    }

    #[test]
    fn record_serializes_uppercase_states() {
        let record = TaskRecord {
            task_id: "id".into(),
            name: "noop".into(),
            state: TaskState::Success,
            result: Some(json!({"deleted": 3})),
            error: None,
            enqueued_at: Utc::now(),
            finished_at: None,
        };
        let value = serde_json::to_value(record).unwrap();
        assert_eq!(value["state"], "SUCCESS");
        assert!(value.get("error").is_none());
    }
}
