use crate::models::ChatQuery;
use crate::session::Session;
use crate::{Chat, socket};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use shortly_derive::api_handler;
use shortly_domain::constants::CHAT_TAG;
use shortly_kernel::server::auth::authenticate;
use shortly_kernel::server::{ApiError, ApiState};

#[api_handler(
    get,
    path = "/api/chat/",
    params(ChatQuery),
    responses(
        (status = SWITCHING_PROTOCOLS, description = "Chat socket opened"),
        (status = FORBIDDEN, description = "Missing, invalid or inactive credentials"),
    ),
    tag = CHAT_TAG,
)]
pub(crate) async fn chat_socket(
    State(state): State<ApiState>,
    Query(query): Query<ChatQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let token = query.bare_token().ok_or_else(|| ApiError::forbidden("No token provided"))?;
    let user = authenticate(&state, token)?;
    if !user.is_active {
        return Err(ApiError::forbidden("User is inactive"));
    }
    let chat = state.try_get_slice::<Chat>()?.clone();

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    let session = Session::new(chat, user.email.clone());
    Ok(upgrade.on_upgrade(move |ws| socket::serve_chat(ws, session)))
}

#[api_handler(
    get,
    path = "/api/notifications/",
    responses((status = SWITCHING_PROTOCOLS, description = "Notification stream opened")),
    tag = CHAT_TAG,
)]
pub(crate) async fn notifications_socket(State(state): State<ApiState>, upgrade: WebSocketUpgrade) -> Response {
    let events = state.events.clone();
    upgrade.on_upgrade(move |ws| socket::serve_notifications(ws, events))
}
