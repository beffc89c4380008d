//! OpenAI-compatible chat-completions client.

use crate::error::AssistantError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shortly_domain::config::AssistantConfig;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    reasoning_effort: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    config: AssistantConfig,
}

impl ChatClient {
    /// # Errors
    /// [`AssistantError::Http`] if the HTTP client cannot be built.
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let http = Client::builder().timeout(Duration::from_secs(config.timeout_seconds)).build()?;
        Ok(Self { http, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// Sends `question` as a single user message and returns the trimmed answer.
    ///
    /// # Errors
    /// [`AssistantError::Upstream`] on a non-success status or an empty completion,
    /// [`AssistantError::Http`] on transport failures.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn ask(&self, question: &str) -> Result<String, AssistantError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage { role: "user", content: question }],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            reasoning_effort: &self.config.reasoning_effort,
            stream: false,
        };

        let response =
            self.http.post(self.completions_url()).bearer_auth(&self.config.api_key).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream {
                message: format!("{status}: {body}").into(),
                context: None,
            });
        }

        let completion: ChatResponse = response.json().await?;
        let answer = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| AssistantError::Upstream { message: "Completion has no content".into(), context: None })?;

        debug!(chars = answer.len(), "Completion received");
        Ok(answer.trim().to_owned())
    }
}
