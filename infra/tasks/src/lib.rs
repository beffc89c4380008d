//! # Tasks
//!
//! Background work for the server without an external broker.
//!
//! * [`TaskQueue`] accepts jobs by handler name into a bounded channel,
//! * a pool of workers drains it and runs the matching [`TaskHandler`],
//! * every job's [`TaskRecord`] stays queryable for the configured result TTL,
//! * [`Scheduler`] enqueues jobs periodically ([`Schedule::Every`]) or daily at a UTC time.
//!
//! ```rust
//! use async_trait::async_trait;
//! use serde_json::{Value, json};
//! use shortly_tasks::{TaskError, TaskHandler, TaskQueue};
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Debug)]
//! struct Echo;
//!
//! #[async_trait]
//! impl TaskHandler for Echo {
//!     fn name(&self) -> &'static str { "echo" }
//!     async fn run(&self, payload: Value) -> Result<Value, TaskError> { Ok(payload) }
//! }
//!
//! # #[tokio::main] async fn main() -> Result<(), TaskError> {
//! let queue = TaskQueue::builder().workers(2).build();
//! queue.register(Echo);
//! let cancel = CancellationToken::new();
//! let workers = queue.start(&cancel);
//!
//! let id = queue.enqueue("echo", json!({"hello": "world"}))?;
//! assert!(queue.status(&id).is_some());
//!
//! cancel.cancel();
//! workers.join().await;
//! # Ok(()) }
//! ```

mod error;
mod queue;
mod schedule;

pub use error::{TaskError, TaskErrorExt};
pub use queue::{TaskHandler, TaskQueue, TaskQueueBuilder, TaskRecord, TaskState, WorkerPool};
pub use schedule::{Schedule, ScheduledTask, Scheduler};
