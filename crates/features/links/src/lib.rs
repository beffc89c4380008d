//! Links feature slice.
//!
//! Shortens URLs to `{base_url}/short.ly/{code}`, redirects while counting clicks,
//! and expires old links through the `expire_urls` background task.

mod error;
mod handlers;
pub mod models;
mod repository;
mod service;
mod tasks;

pub use crate::error::{LinksError, LinksErrorExt};
pub use crate::repository::{LinkRecord, LinkStore};
pub use crate::service::Shortened;
pub use crate::tasks::{EXPIRE_URLS, ExpireUrls, schedules};

use moka::sync::Cache;
use shortly_database::{Database, Migration};
use shortly_domain::config::LinksConfig;
use shortly_event_bus::EventBus;
use shortly_kernel::server::ApiState;
use shortly_tasks::TaskQueue;
use std::time::Duration;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SLICE: &str = "links";

/// Links feature state.
#[shortly_derive::shortly_slice]
pub struct Links {
    store: LinkStore,
    /// `code -> long_url`
    cache: Cache<String, String>,
    events: EventBus,
    config: LinksConfig,
}

impl Links {
    #[must_use]
    pub fn config(&self) -> &LinksConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &LinkStore {
        &self.inner.store
    }
}

/// Initialize the links feature and register its background task.
///
/// # Errors
/// [`LinksError::Validation`] for an unusable slug length or base URL.
pub fn init(
    database: &Database,
    events: &EventBus,
    tasks: &TaskQueue,
    config: &LinksConfig,
) -> Result<Links, LinksError> {
    if config.slug_length == 0 {
        return Err(LinksError::Validation { message: "links.slug_length must be positive".into(), context: None });
    }
    url::Url::parse(&config.base_url)
        .map_err(|e| LinksError::Validation { message: e.to_string().into(), context: Some("links.base_url".into()) })?;

    let cache = Cache::builder()
        .max_capacity(config.cache_capacity)
        .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
        .build();

    let links = Links::new(LinksInner {
        store: LinkStore::new(database.clone()),
        cache,
        events: events.clone(),
        config: config.clone(),
    });
    tasks.register(ExpireUrls::new(links.clone()));

    tracing::info!(base_url = %config.base_url, "Links slice initialized");
    Ok(links)
}

#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![Migration::new(SLICE, "001_links", include_str!("../migrations/001_links.surql"))]
}

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::shorten))
        .routes(routes!(handlers::get_long_url, handlers::update_long_url, handlers::delete_short_url))
        .routes(routes!(handlers::redirect_short_url))
        .routes(routes!(handlers::link_stats))
}
