use crate::Mail;
use crate::error::MailError;
use crate::gmail::GmailToken;
use crate::message::{Fetched, ParsedEmail};
use crate::models::EmailView;
use crate::outlook::{Mailbox, delegated_token};
use crate::repository::EmailRecord;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shortly_domain::constants::{GMAIL, OUTLOOK};
use shortly_tasks::{TaskError, TaskHandler};
use std::time::Instant;
use tracing::{info, warn};

pub const PARSE_GMAIL_EMAILS: &str = "parse_gmail_emails";
pub const PARSE_OUTLOOK_EMAILS: &str = "parse_outlook_emails";
pub const FETCH_EMAILS_FROM_DB: &str = "fetch_emails_from_db";

pub const DEFAULT_LIST_LIMIT: u32 = 100;
pub const MAX_LIST_LIMIT: u32 = 500;

/// A mailbox owner as handed to the ingestion tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxUser {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub token_json: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GmailPayload {
    users: Vec<MailboxUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FetchPayload {
    user_id: Option<String>,
    limit: Option<u32>,
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn records(parsed: impl IntoIterator<Item = ParsedEmail>, user_id: &str, provider: &str) -> Vec<EmailRecord> {
    let now = Utc::now().timestamp_millis();
    parsed
        .into_iter()
        .map(|email| EmailRecord {
            message_id: email.message_id,
            subject: email.subject,
            sender: email.sender,
            body: email.body,
            user_id: user_id.to_owned(),
            provider: provider.to_owned(),
            created_at: now,
        })
        .collect()
}

/// Clamps a requested page size into `1..=MAX_LIST_LIMIT`.
#[must_use]
pub fn list_limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

impl Mail {
    /// Ingests one Gmail mailbox, refreshing and persisting its token when needed.
    ///
    /// # Errors
    /// Missing or unusable token, provider or storage failures.
    pub async fn ingest_gmail(&self, user: &MailboxUser) -> Result<Value, MailError> {
        let started = Instant::now();
        let token_json = user.token_json.as_deref().ok_or_else(|| MailError::Validation {
            message: "User has no Gmail token".into(),
            context: None,
        })?;

        let (token, refreshed) = self.inner.gmail.ensure_fresh(GmailToken::parse(token_json)?).await?;
        if refreshed {
            self.inner.users.set_provider_token(&user.user_id, GMAIL, token.to_json()).await?;
        }

        let fetched = self.inner.gmail.fetch_latest(&token.token, self.inner.config.max_results).await?;
        let parsed = fetched.iter().filter_map(|f| match f {
            Fetched::Parsed(email) => Some(email.clone()),
            Fetched::Failed { .. } => None,
        });
        let stored = self.inner.emails.insert_new(records(parsed, &user.user_id, GMAIL)).await?;

        info!(user_id = %user.user_id, fetched = fetched.len(), stored, "Gmail mailbox ingested");
        Ok(json!({
            "user_id": user.user_id,
            "emails": fetched,
            "stored": stored,
            "execution_time_ms": elapsed_ms(started),
        }))
    }

    /// Ingests one Outlook mailbox, with the user's delegated token when present
    /// and app-only access otherwise.
    ///
    /// # Errors
    /// Provider or storage failures.
    pub async fn ingest_outlook(&self, user: &MailboxUser) -> Result<Value, MailError> {
        let started = Instant::now();
        let delegated = delegated_token(user.token_json.as_deref());
        let mailbox = match delegated.as_deref() {
            Some(access_token) => Mailbox::Delegated { access_token },
            None => Mailbox::Application { address: &user.email },
        };

        let parsed = self.inner.outlook.fetch_latest(mailbox, self.inner.config.max_results).await?;
        let stored = self.inner.emails.insert_new(records(parsed.clone(), &user.user_id, OUTLOOK)).await?;

        info!(user_id = %user.user_id, fetched = parsed.len(), stored, "Outlook mailbox ingested");
        Ok(json!({
            "user_id": user.user_id,
            "emails": parsed,
            "stored": stored,
            "execution_time_ms": elapsed_ms(started),
        }))
    }
}

/// Payload `{users: [{user_id, email, token_json}]}`; one result entry per user.
#[derive(Debug, Clone)]
pub struct ParseGmailEmails {
    mail: Mail,
}

impl ParseGmailEmails {
    #[must_use]
    pub const fn new(mail: Mail) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl TaskHandler for ParseGmailEmails {
    fn name(&self) -> &'static str {
        PARSE_GMAIL_EMAILS
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let payload: GmailPayload = serde_json::from_value(payload)?;

        let mut results = Vec::with_capacity(payload.users.len());
        for user in &payload.users {
            results.push(match self.mail.ingest_gmail(user).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(user_id = %user.user_id, error = %e, "Gmail ingestion failed");
                    json!({ "user_id": user.user_id, "error": e.to_string() })
                },
            });
        }
        info!(users = results.len(), "Gmail emails parsed");
        Ok(Value::Array(results))
    }
}

/// Payload `{user_id, email, token_json?}`.
#[derive(Debug, Clone)]
pub struct ParseOutlookEmails {
    mail: Mail,
}

impl ParseOutlookEmails {
    #[must_use]
    pub const fn new(mail: Mail) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl TaskHandler for ParseOutlookEmails {
    fn name(&self) -> &'static str {
        PARSE_OUTLOOK_EMAILS
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let user: MailboxUser = serde_json::from_value(payload)?;
        Ok(self.mail.ingest_outlook(&user).await?)
    }
}

/// Payload `{user_id?, limit?}`; returns `{emails, execution_time_ms}`.
#[derive(Debug, Clone)]
pub struct FetchEmailsFromDb {
    mail: Mail,
}

impl FetchEmailsFromDb {
    #[must_use]
    pub const fn new(mail: Mail) -> Self {
        Self { mail }
    }
}

#[async_trait]
impl TaskHandler for FetchEmailsFromDb {
    fn name(&self) -> &'static str {
        FETCH_EMAILS_FROM_DB
    }

    async fn run(&self, payload: Value) -> Result<Value, TaskError> {
        let payload: FetchPayload =
            if payload.is_null() { FetchPayload::default() } else { serde_json::from_value(payload)? };
        let started = Instant::now();

        let emails: Vec<EmailView> = self
            .mail
            .emails()
            .list(payload.user_id.as_deref(), list_limit(payload.limit))
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        Ok(json!({ "emails": emails, "execution_time_ms": elapsed_ms(started) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(list_limit(None), 100);
        assert_eq!(list_limit(Some(0)), 1);
        assert_eq!(list_limit(Some(42)), 42);
        assert_eq!(list_limit(Some(10_000)), 500);
    }
}
