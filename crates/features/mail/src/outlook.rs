//! Microsoft Graph client for Outlook mailboxes.

use crate::error::MailError;
use crate::message::ParsedEmail;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use shortly_domain::config::OutlookConfig;
use tracing::instrument;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagePage {
    #[serde(default)]
    value: Vec<Value>,
}

/// Which mailbox to read and with which credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mailbox<'a> {
    /// Delegated token of the mailbox owner (`/me/messages`).
    Delegated { access_token: &'a str },
    /// App-only access to a named mailbox (`/users/{address}/messages`).
    Application { address: &'a str },
}

#[derive(Debug, Clone)]
pub struct OutlookClient {
    http: Client,
    config: OutlookConfig,
}

impl OutlookClient {
    #[must_use]
    pub const fn new(http: Client, config: OutlookConfig) -> Self {
        Self { http, config }
    }

    /// Client-credentials token from the Microsoft identity platform.
    ///
    /// # Errors
    /// [`MailError::Provider`] when the response carries no access token.
    #[instrument(skip(self))]
    pub async fn acquire_app_token(&self) -> Result<String, MailError> {
        if self.config.tenant_id.is_empty() || self.config.client_id.is_empty() {
            return Err(MailError::Provider {
                message: "Outlook client credentials are not configured".into(),
                context: None,
            });
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority.trim_end_matches('/'),
            self.config.tenant_id
        );
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", GRAPH_SCOPE),
        ];
        let token: TokenResponse = self.http.post(url).form(&form).send().await?.json().await?;
        token.access_token.filter(|t| !t.is_empty()).ok_or_else(|| MailError::Provider {
            message: "Failed to acquire Outlook access token".into(),
            context: None,
        })
    }

    /// Latest `top` messages of `mailbox`.
    ///
    /// # Errors
    /// Token or Graph request failures.
    pub async fn fetch_latest(&self, mailbox: Mailbox<'_>, top: u32) -> Result<Vec<ParsedEmail>, MailError> {
        let base = self.config.graph_base.trim_end_matches('/');
        let (url, token) = match mailbox {
            Mailbox::Delegated { access_token } => (format!("{base}/me/messages"), access_token.to_owned()),
            Mailbox::Application { address } => {
                (format!("{base}/users/{address}/messages"), self.acquire_app_token().await?)
            },
        };

        let page: MessagePage = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[("$top", top)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.value.iter().filter_map(parse_message).collect())
    }
}

/// `None` for entries without an id.
#[must_use]
pub fn parse_message(message: &Value) -> Option<ParsedEmail> {
    let text = |value: &Value| value.as_str().unwrap_or_default().to_owned();
    Some(ParsedEmail {
        message_id: message["id"].as_str().filter(|id| !id.is_empty())?.to_owned(),
        subject: text(&message["subject"]),
        sender: text(&message["from"]["emailAddress"]["address"]),
        body: text(&message["body"]["content"]),
    })
}

/// Delegated access token stored for the user, if any.
#[must_use]
pub fn delegated_token(token_json: Option<&str>) -> Option<String> {
    let value: Value = serde_json::from_str(token_json?).ok()?;
    value["access_token"].as_str().filter(|t| !t.is_empty()).map(str::to_owned)
}
