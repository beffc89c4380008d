//! Chat feature slice.
//!
//! Two-person rooms over a WebSocket at `/api/chat/`, with presence, read receipts,
//! typing indicators and paged history. Frames for other users travel over the
//! event bus as [`Delivery`] events, so every socket of a user sees them.
//! `/api/notifications/` streams bus [`Notification`](shortly_domain::events::Notification)s.

mod error;
mod handlers;
mod inbox;
pub mod models;
mod presence;
pub mod protocol;
mod repository;
mod session;
mod socket;

pub use crate::error::{ChatError, ChatErrorExt};
pub use crate::inbox::Inbox;
pub use crate::presence::{Presence, Status};
pub use crate::protocol::{Delivery, Recipient};
pub use crate::repository::{Attachment, ChatStore, MessageRecord, RoomRecord, UnreadCount};
pub use crate::session::Session;

use moka::sync::Cache;
use serde_json::Value;
use shortly_database::{Database, Migration};
use shortly_domain::config::ChatConfig;
use shortly_event_bus::EventBus;
use shortly_identity::Users;
use shortly_kernel::server::ApiState;
use std::time::Duration;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SLICE: &str = "chat";

const RESPONSE_CACHE_CAPACITY: u64 = 10_000;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Chat feature state.
#[shortly_derive::shortly_slice]
pub struct Chat {
    store: ChatStore,
    users: Users,
    presence: Presence,
    /// `user.list` responses by caller and query.
    user_lists: Cache<String, Value>,
    /// `message.list` responses, keyed `room_id:email:page:page_size`.
    message_lists: Cache<String, Value>,
    events: EventBus,
    config: ChatConfig,
}

impl Chat {
    #[must_use]
    pub fn store(&self) -> &ChatStore {
        &self.inner.store
    }

    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.inner.presence
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.inner.config
    }
}

/// Initialize the chat feature.
///
/// # Errors
/// [`ChatError::Validation`] for a zero page-cache lifetime or attachment limit.
pub fn init(database: &Database, events: &EventBus, config: &ChatConfig) -> Result<Chat, ChatError> {
    if config.max_file_bytes == 0 {
        return Err(ChatError::validation("chat.max_file_bytes must be positive"));
    }
    if config.user_list_cache_seconds == 0 || config.message_list_cache_seconds == 0 {
        return Err(ChatError::validation("chat cache lifetimes must be positive"));
    }

    let chat = Chat::new(ChatInner {
        store: ChatStore::new(database.clone()),
        users: Users::new(database.clone()),
        presence: Presence::new(Duration::from_secs(config.last_seen_ttl_days.saturating_mul(SECONDS_PER_DAY))),
        user_lists: Cache::builder()
            .max_capacity(RESPONSE_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.user_list_cache_seconds))
            .build(),
        message_lists: Cache::builder()
            .max_capacity(RESPONSE_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.message_list_cache_seconds))
            .support_invalidation_closures()
            .build(),
        events: events.clone(),
        config: config.clone(),
    });

    tracing::info!(max_file_bytes = config.max_file_bytes, "Chat slice initialized");
    Ok(chat)
}

#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![Migration::new(SLICE, "001_chat", include_str!("../migrations/001_chat.surql"))]
}

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(handlers::chat_socket)).routes(routes!(handlers::notifications_socket))
}
