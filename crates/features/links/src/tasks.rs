use crate::Links;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use shortly_tasks::{Schedule, ScheduledTask, TaskError, TaskHandler};
use std::time::Instant;

pub const EXPIRE_URLS: &str = "expire_urls";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ExpirePayload {
    batch_size: Option<u32>,
}

/// Deletes links past the retention window.
///
/// Payload `{"batch_size"?: n}`; returns `{message, deleted, execution_time_ms}`.
#[derive(Debug, Clone)]
pub struct ExpireUrls {
    links: Links,
}

impl ExpireUrls {
    #[must_use]
    pub const fn new(links: Links) -> Self {
        Self { links }
    }
}

#[async_trait]
impl TaskHandler for ExpireUrls {
    fn name(&self) -> &'static str {
        EXPIRE_URLS
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let payload: ExpirePayload =
            if payload.is_null() { ExpirePayload::default() } else { serde_json::from_value(payload)? };
        let batch_size = payload.batch_size.unwrap_or(self.links.config().expire_batch_size);

        let started = Instant::now();
        let deleted = self.links.expire(batch_size, Utc::now()).await?;
        let execution_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(json!({
            "message": format!("Expired URLs older than {} days have been deleted.", self.links.config().retention_days),
            "deleted": deleted,
            "execution_time_ms": execution_time_ms,
        }))
    }
}

/// Daily expiry at midnight UTC.
///
/// # Errors
/// Never in practice; the schedule time is constant.
pub fn schedules() -> Result<Vec<ScheduledTask>, TaskError> {
    Ok(vec![ScheduledTask::new(EXPIRE_URLS, Schedule::daily(0, 0)?, json!({}))])
}
