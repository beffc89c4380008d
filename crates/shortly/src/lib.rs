//! Facade crate for the Shortly platform.
//! Re-exports the shared crates and composes every feature slice: initialization,
//! migrations, routes, task queue and schedules.
//! Keep this crate thin: it should compose other crates, not implement business logic.
//!
//! ## Usage
//! ```rust,no_run
//! # async fn boot(config: shortly::domain::config::ApiConfig) -> Result<(), Box<dyn std::error::Error>> {
//! use shortly_database::Database;
//! use shortly_event_bus::EventBus;
//!
//! let database = Database::builder().url("mem://").migrations(shortly::migrations()).init().await?;
//! let events = EventBus::new();
//! let tasks = shortly::task_queue(&config);
//! let slices = shortly::init(&config, &database, &events, &tasks)?;
//! # Ok(())
//! # }
//! ```

use shortly_database::{Database, Migration};
use shortly_domain::config::ApiConfig;
use shortly_domain::registry::InitializedSlice;
use shortly_event_bus::EventBus;
use shortly_kernel::server::ApiState;
use shortly_tasks::{Scheduler, TaskError, TaskQueue};
use std::borrow::Cow;
use std::time::Duration;
use utoipa_axum::router::OpenApiRouter;

pub use shortly_domain as domain;
pub use shortly_kernel as kernel;

pub mod server {
    pub mod router {
        pub use shortly_kernel::server::router::system_router;
    }
}

/// Feature registry for runtime introspection.
pub mod features {
    pub use shortly_assistant as assistant;
    pub use shortly_chat as chat;
    pub use shortly_identity as identity;
    pub use shortly_links as links;
    pub use shortly_mail as mail;

    /// Slices composed by [`crate::init`], in initialization order.
    pub const ENABLED: &[&str] = &[identity::SLICE, links::SLICE, chat::SLICE, mail::SLICE, assistant::SLICE];

    #[must_use]
    pub fn is_enabled(name: &str) -> bool {
        ENABLED.contains(&name)
    }
}

/// A specialized [`PlatformError`] enum of this crate.
#[shortly_derive::shortly_error]
pub enum PlatformError {
    #[error("Identity bootstrap failed{}: {source}", format_context(.context))]
    Identity {
        #[source]
        source: features::identity::IdentityError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Links bootstrap failed{}: {source}", format_context(.context))]
    Links {
        #[source]
        source: features::links::LinksError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Chat bootstrap failed{}: {source}", format_context(.context))]
    Chat {
        #[source]
        source: features::chat::ChatError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Mail bootstrap failed{}: {source}", format_context(.context))]
    Mail {
        #[source]
        source: features::mail::MailError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Assistant bootstrap failed{}: {source}", format_context(.context))]
    Assistant {
        #[source]
        source: features::assistant::AssistantError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Task setup failed{}: {source}", format_context(.context))]
    Task {
        #[source]
        source: TaskError,
        context: Option<Cow<'static, str>>,
    },
    #[error("Internal platform error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Every slice's migrations, in dependency order.
#[must_use]
pub fn migrations() -> Vec<Migration> {
    let mut all = features::identity::migrations();
    all.extend(features::links::migrations());
    all.extend(features::chat::migrations());
    all.extend(features::mail::migrations());
    all
}

/// The background task queue sized from `tasks.*`.
#[must_use]
pub fn task_queue(config: &ApiConfig) -> TaskQueue {
    TaskQueue::builder()
        .workers(config.tasks.workers)
        .capacity(config.tasks.queue_capacity)
        .result_ttl(Duration::from_secs(config.tasks.result_ttl_seconds))
        .build()
}

/// Initialize all feature slices and register their background tasks on `tasks`.
///
/// # Errors
/// The first slice that fails to initialize.
pub fn init(
    config: &ApiConfig,
    database: &Database,
    events: &EventBus,
    tasks: &TaskQueue,
) -> Result<Vec<InitializedSlice>, PlatformError> {
    let slices: Vec<InitializedSlice> = vec![
        features::identity::init(database)?.into(),
        features::links::init(database, events, tasks, &config.links)?.into(),
        features::chat::init(database, events, &config.chat)?.into(),
        features::mail::init(database, tasks, &config.mail)?.into(),
        features::assistant::init(&config.assistant)?.into(),
    ];

    tracing::info!(slices = slices.len(), "Platform slices initialized");
    Ok(slices)
}

/// Periodic jobs of every slice, validated against `tasks`.
///
/// # Errors
/// [`PlatformError::Task`] for a schedule that can never fire.
pub fn scheduler(tasks: &TaskQueue) -> Result<Scheduler, PlatformError> {
    let mut scheduler = Scheduler::new(tasks.clone());
    for entry in features::links::schedules()? {
        scheduler.add(entry)?;
    }
    Ok(scheduler)
}

/// System routes plus every slice's routes.
pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .merge(server::router::system_router())
        .merge(features::identity::router())
        .merge(features::links::router())
        .merge(features::chat::router())
        .merge(features::mail::router())
        .merge(features::assistant::router())
}
