use crate::repository::EmailRecord;
use chrono::DateTime;
use shortly_derive::api_model;
use utoipa::IntoParams;

#[api_model]
pub struct UserIdsRequest {
    pub user_ids: Vec<String>,
}

#[api_model]
pub struct GmailTriggerResponse {
    pub status: String,
    pub task_id: String,
}

#[api_model]
pub struct OutlookTriggerResponse {
    pub status: String,
    pub task_ids: Vec<String>,
}

#[api_model]
#[derive(IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailListQuery {
    /// Defaults to the caller for non-admins.
    pub user_id: Option<String>,
    /// 1..=500, default 100.
    pub limit: Option<u32>,
}

#[api_model]
#[derive(Clone, PartialEq, Eq)]
pub struct EmailView {
    pub message_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub user_id: String,
    pub provider: String,
    /// RFC 3339
    pub created_at: String,
}

impl From<EmailRecord> for EmailView {
    fn from(record: EmailRecord) -> Self {
        Self {
            created_at: DateTime::from_timestamp_millis(record.created_at)
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            message_id: record.message_id,
            subject: record.subject,
            sender: record.sender,
            body: record.body,
            user_id: record.user_id,
            provider: record.provider,
        }
    }
}
