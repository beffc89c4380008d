//! Gmail REST client: token refresh, message listing and MIME body extraction.

use crate::error::MailError;
use crate::message::{Fetched, ParsedEmail};
use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::{DecodePaddingMode, general_purpose};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shortly_domain::config::GmailConfig;
use tracing::{debug, instrument, warn};

/// Gmail bodies are base64url, sometimes without padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_SECONDS: i64 = 60;

/// Stored Google authorized-user credential. Unknown keys survive a refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GmailToken {
    #[serde(default, alias = "access_token")]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    /// Refresh endpoint recorded with the credential; `gmail.token_url` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GmailToken {
    /// # Errors
    /// [`MailError::Validation`] for malformed JSON.
    pub fn parse(token_json: &str) -> Result<Self, MailError> {
        serde_json::from_str(token_json).map_err(|e| MailError::Validation {
            message: format!("Invalid Gmail token: {e}").into(),
            context: None,
        })
    }

    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.token.is_empty()
            || self.expiry.is_some_and(|expiry| expiry <= now + Duration::seconds(EXPIRY_SKEW_SECONDS))
    }

    fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    config: GmailConfig,
}

impl GmailClient {
    #[must_use]
    pub const fn new(http: Client, config: GmailConfig) -> Self {
        Self { http, config }
    }

    /// Returns a usable token, refreshing it when expired. `Some` in the second
    /// slot means the credential changed and should be persisted.
    ///
    /// # Errors
    /// [`MailError::Provider`] when the token is expired and cannot be refreshed.
    pub async fn ensure_fresh(&self, token: GmailToken) -> Result<(GmailToken, bool), MailError> {
        let now = Utc::now();
        if !token.is_expired(now) {
            return Ok((token, false));
        }
        if !token.can_refresh() {
            return Err(MailError::Provider {
                message: "Gmail token expired and cannot be refreshed".into(),
                context: None,
            });
        }
        self.refresh(token, now).await.map(|token| (token, true))
    }

    #[instrument(skip_all)]
    async fn refresh(&self, mut token: GmailToken, now: DateTime<Utc>) -> Result<GmailToken, MailError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", token.refresh_token.as_deref().unwrap_or_default()),
            ("client_id", token.client_id.as_deref().unwrap_or_default()),
            ("client_secret", token.client_secret.as_deref().unwrap_or_default()),
        ];
        let token_url = token.token_uri.as_deref().filter(|uri| !uri.is_empty()).unwrap_or(&self.config.token_url);
        let refreshed: RefreshResponse =
            self.http.post(token_url).form(&form).send().await?.error_for_status()?.json().await?;

        debug!(token_url, "Gmail access token refreshed");
        token.token = refreshed.access_token;
        token.expiry = refreshed.expires_in.map(|secs| now + Duration::seconds(secs));
        Ok(token)
    }

    /// Latest `max_results` messages of the authenticated mailbox.
    ///
    /// # Errors
    /// Listing failures; single message failures come back as [`Fetched::Failed`].
    #[instrument(skip(self, access_token))]
    pub async fn fetch_latest(&self, access_token: &str, max_results: u32) -> Result<Vec<Fetched>, MailError> {
        let base = self.config.api_base.trim_end_matches('/');
        let list: MessageList = self
            .http
            .get(format!("{base}/users/me/messages"))
            .bearer_auth(access_token)
            .query(&[("maxResults", max_results)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut fetched = Vec::with_capacity(list.messages.len());
        for message in list.messages {
            let result = async {
                self.http
                    .get(format!("{base}/users/me/messages/{}", message.id))
                    .bearer_auth(access_token)
                    .query(&[("format", "full")])
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<Value>()
                    .await
            }
            .await;

            fetched.push(match result {
                Ok(body) => Fetched::Parsed(parse_message(&message.id, &body)),
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Gmail message fetch failed");
                    Fetched::Failed { message_id: message.id, error: e.to_string() }
                },
            });
        }
        Ok(fetched)
    }
}

/// Subject and From headers plus the first body with data: the top-level body,
/// else the first part that carries data.
#[must_use]
pub fn parse_message(message_id: &str, message: &Value) -> ParsedEmail {
    let payload = &message["payload"];
    let header = |name: &str| {
        payload["headers"]
            .as_array()
            .and_then(|headers| headers.iter().find(|h| h["name"] == name))
            .and_then(|h| h["value"].as_str())
            .unwrap_or_default()
            .to_owned()
    };

    let top_level = payload["body"]["data"].as_str().filter(|data| !data.is_empty());
    let data = top_level.or_else(|| {
        payload["parts"].as_array().and_then(|parts| {
            parts.iter().find_map(|part| part["body"]["data"].as_str().filter(|data| !data.is_empty()))
        })
    });

    ParsedEmail {
        message_id: message_id.to_owned(),
        subject: header("Subject"),
        sender: header("From"),
        body: data.map(decode_body).unwrap_or_default(),
    }
}

fn decode_body(data: &str) -> String {
    BASE64URL
        .decode(data)
        .or_else(|_| general_purpose::STANDARD.decode(data))
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(text: &str) -> String {
        general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn reads_headers_and_top_level_body() {
        let message = json!({
            "payload": {
                "headers": [
                    { "name": "From", "value": "Ann <ann@example.com>" },
                    { "name": "Subject", "value": "Hello" },
                ],
                "body": { "data": encode("Hi there?>") },
            }
        });
        let parsed = parse_message("m1", &message);
        assert_eq!(parsed.subject, "Hello");
        assert_eq!(parsed.sender, "Ann <ann@example.com>");
        assert_eq!(parsed.body, "Hi there?>");
    }

    #[test]
    fn falls_back_to_first_part_with_data() {
        let message = json!({
            "payload": {
                "headers": [],
                "body": { "size": 0 },
                "parts": [
                    { "body": { "size": 0 } },
                    { "body": { "data": encode("plain part") } },
                    { "body": { "data": encode("html part") } },
                ],
            }
        });
        let parsed = parse_message("m2", &message);
        assert_eq!(parsed.body, "plain part");
        assert_eq!(parsed.subject, "");
    }

    #[test]
    fn token_expiry_and_round_trip() {
        let now = Utc::now();
        let token = GmailToken::parse(
            r#"{"token":"abc","refresh_token":"r","client_id":"c","client_secret":"s","scopes":["x"]}"#,
        )
        .unwrap();
        assert!(!token.is_expired(now));
        assert!(token.can_refresh());
        assert!(token.to_json().contains("\"scopes\":[\"x\"]"));

        let stale = GmailToken { expiry: Some(now - Duration::minutes(5)), ..token };
        assert!(stale.is_expired(now));
        assert!(GmailToken::default().is_expired(now));
        assert!(GmailToken::parse("nope").is_err());
    }
}
