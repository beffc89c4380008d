//! Mail feature slice.
//!
//! Queues Gmail and Outlook mailbox ingestion on the task queue and serves the
//! stored messages. Provider credentials are the JSON tokens kept on user records.

mod error;
mod gmail;
mod handlers;
mod message;
pub mod models;
mod outlook;
mod repository;
mod tasks;

pub use crate::error::{MailError, MailErrorExt};
pub use crate::gmail::{GmailClient, GmailToken};
pub use crate::message::{Fetched, ParsedEmail};
pub use crate::outlook::{Mailbox, OutlookClient};
pub use crate::repository::{EmailRecord, EmailStore};
pub use crate::tasks::{
    FETCH_EMAILS_FROM_DB, FetchEmailsFromDb, MailboxUser, PARSE_GMAIL_EMAILS, PARSE_OUTLOOK_EMAILS,
    ParseGmailEmails, ParseOutlookEmails,
};

use reqwest::Client;
use shortly_database::{Database, Migration};
use shortly_domain::config::MailConfig;
use shortly_identity::Users;
use shortly_kernel::server::ApiState;
use shortly_tasks::TaskQueue;
use std::time::Duration;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub const SLICE: &str = "mail";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Mail feature state.
#[shortly_derive::shortly_slice]
pub struct Mail {
    emails: EmailStore,
    users: Users,
    gmail: GmailClient,
    outlook: OutlookClient,
    config: MailConfig,
}

impl Mail {
    #[must_use]
    pub fn emails(&self) -> &EmailStore {
        &self.inner.emails
    }

    #[must_use]
    pub fn users(&self) -> &Users {
        &self.inner.users
    }

    #[must_use]
    pub fn config(&self) -> &MailConfig {
        &self.inner.config
    }
}

/// Initialize the mail feature and register its tasks.
///
/// # Errors
/// [`MailError::Http`] if the HTTP client cannot be built.
pub fn init(database: &Database, tasks: &TaskQueue, config: &MailConfig) -> Result<Mail, MailError> {
    let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let mail = Mail::new(MailInner {
        emails: EmailStore::new(database.clone()),
        users: Users::new(database.clone()),
        gmail: GmailClient::new(http.clone(), config.gmail.clone()),
        outlook: OutlookClient::new(http, config.outlook.clone()),
        config: config.clone(),
    });

    tasks.register(ParseGmailEmails::new(mail.clone()));
    tasks.register(ParseOutlookEmails::new(mail.clone()));
    tasks.register(FetchEmailsFromDb::new(mail.clone()));

    tracing::info!(max_results = config.max_results, "Mail slice initialized");
    Ok(mail)
}

#[must_use]
pub fn migrations() -> Vec<Migration> {
    vec![Migration::new(SLICE, "001_emails", include_str!("../migrations/001_emails.surql"))]
}

pub fn router() -> OpenApiRouter<ApiState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::trigger_gmail))
        .routes(routes!(handlers::trigger_outlook))
        .routes(routes!(handlers::list_emails))
}
