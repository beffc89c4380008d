use crate::Mail;
use crate::models::{EmailListQuery, EmailView, GmailTriggerResponse, OutlookTriggerResponse, UserIdsRequest};
use crate::tasks::{MailboxUser, PARSE_GMAIL_EMAILS, PARSE_OUTLOOK_EMAILS, list_limit};
use axum::Json;
use axum::extract::{Query, State};
use serde_json::json;
use shortly_derive::api_handler;
use shortly_domain::constants::{EMAILS_TAG, GMAIL, OUTLOOK};
use shortly_kernel::server::{ApiError, ApiState, AuthUser};
use tracing::info;

/// Users visible to the caller that are listed in `user_ids` and hold a `provider` token.
async fn mailbox_users(
    mail: &Mail,
    caller: &AuthUser,
    user_ids: &[String],
    provider: &str,
) -> Result<Vec<MailboxUser>, ApiError> {
    let visible = mail.users().visible_to(caller).await?;
    Ok(visible
        .into_iter()
        .filter(|user| user_ids.contains(&user.user_id))
        .filter_map(|user| {
            let token_json = user.provider_token(provider)?.to_owned();
            Some(MailboxUser { user_id: user.user_id, email: user.email, token_json: Some(token_json) })
        })
        .collect())
}

#[api_handler(
    post,
    path = "/api/emails/gmail",
    request_body = UserIdsRequest,
    responses(
        (status = OK, body = GmailTriggerResponse),
        (status = BAD_REQUEST, description = "No users with valid OAuth tokens found"),
        (status = SERVICE_UNAVAILABLE, description = "Task queue is full"),
    ),
    tag = EMAILS_TAG,
)]
pub(crate) async fn trigger_gmail(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(payload): Json<UserIdsRequest>,
) -> Result<Json<GmailTriggerResponse>, ApiError> {
    let mail = state.try_get_slice::<Mail>()?;
    let users = mailbox_users(mail, &user, &payload.user_ids, GMAIL).await?;
    if users.is_empty() {
        return Err(ApiError::bad_request("No users with valid OAuth tokens found"));
    }

    let count = users.len();
    let task_id = state.tasks.enqueue(PARSE_GMAIL_EMAILS, json!({ "users": users }))?;
    info!(caller = %user.email, users = count, %task_id, "Gmail parsing queued");

    Ok(Json(GmailTriggerResponse { status: format!("Gmail email parsing started for {count} users."), task_id }))
}

#[api_handler(
    post,
    path = "/api/emails/outlook",
    request_body = UserIdsRequest,
    responses(
        (status = OK, body = OutlookTriggerResponse),
        (status = BAD_REQUEST, description = "No users with valid Outlook OAuth tokens found"),
        (status = SERVICE_UNAVAILABLE, description = "Task queue is full"),
    ),
    tag = EMAILS_TAG,
)]
pub(crate) async fn trigger_outlook(
    State(state): State<ApiState>,
    user: AuthUser,
    Json(payload): Json<UserIdsRequest>,
) -> Result<Json<OutlookTriggerResponse>, ApiError> {
    let mail = state.try_get_slice::<Mail>()?;
    let users = mailbox_users(mail, &user, &payload.user_ids, OUTLOOK).await?;
    if users.is_empty() {
        return Err(ApiError::bad_request("No users with valid Outlook OAuth tokens found"));
    }

    let count = users.len();
    let mut task_ids = Vec::with_capacity(count);
    for mailbox in users {
        let payload = serde_json::to_value(mailbox).map_err(|e| ApiError::internal(e.to_string()))?;
        task_ids.push(state.tasks.enqueue(PARSE_OUTLOOK_EMAILS, payload)?);
    }
    info!(caller = %user.email, users = count, "Outlook parsing queued");

    Ok(Json(OutlookTriggerResponse { status: format!("Outlook email parsing started for {count} users."), task_ids }))
}

#[api_handler(
    get,
    path = "/api/emails/list",
    params(EmailListQuery),
    responses(
        (status = OK, body = Vec<EmailView>),
        (status = FORBIDDEN, description = "Not authorized to view these emails"),
        (status = NOT_FOUND, description = "Current user not found"),
    ),
    tag = EMAILS_TAG,
)]
pub(crate) async fn list_emails(
    State(state): State<ApiState>,
    user: AuthUser,
    Query(query): Query<EmailListQuery>,
) -> Result<Json<Vec<EmailView>>, ApiError> {
    let mail = state.try_get_slice::<Mail>()?;

    let owner = if user.is_admin() {
        query.user_id
    } else {
        let me = mail
            .users()
            .find_by_email(&user.email)
            .await?
            .ok_or_else(|| ApiError::not_found("Current user not found"))?;
        if query.user_id.as_ref().is_some_and(|id| *id != me.user_id) {
            return Err(ApiError::forbidden("Not authorized to view these emails"));
        }
        Some(me.user_id)
    };

    let emails = mail.emails().list(owner.as_deref(), list_limit(query.limit)).await?;
    Ok(Json(emails.into_iter().map(Into::into).collect()))
}
