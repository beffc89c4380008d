//! Assistant feature slice: `POST /api/ask` backed by a chat-completions API.
mod client;
mod error;
mod handlers;
pub mod models;

pub use crate::client::ChatClient;
pub use crate::error::{AssistantError, AssistantErrorExt, UNAVAILABLE};

use shortly_domain::config::AssistantConfig;
use shortly_kernel::server::ApiState;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SLICE: &str = "assistant";

/// Assistant feature state.
#[shortly_derive::shortly_slice]
pub struct Assistant {
    client: ChatClient,
}

impl Assistant {
    #[must_use]
    pub fn client(&self) -> &ChatClient {
        &self.inner.client
    }
}

/// Initialize the assistant feature.
///
/// # Errors
/// [`AssistantError::Http`] if the HTTP client cannot be built.
pub fn init(config: &AssistantConfig) -> Result<Assistant, AssistantError> {
    if config.api_key.is_empty() {
        tracing::warn!("assistant.api_key is empty; /api/ask will fail upstream");
    }
    let assistant = Assistant::new(AssistantInner { client: ChatClient::new(config.clone())? });
    tracing::info!(model = %config.model, "Assistant slice initialized");
    Ok(assistant)
}

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new().routes(routes!(handlers::ask))
}
