//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::SummarizeError;
use crate::http::{parse_retry_after, truncate_error_body};
use crate::job::{DocumentMetadata, JobOptions};

use super::prompt::{build_messages, build_translation_messages, ChatMessage};
use super::Summarizer;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn request_error(e: reqwest::Error) -> SummarizeError {
    if e.is_timeout() {
        SummarizeError::Timeout
    } else {
        SummarizeError::Network(e.without_url().to_string())
    }
}

/// Pulls `error.message` out of an OpenAI error body, falling back to the
/// raw body.
fn upstream_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|env| env.error.message)
        .unwrap_or_else(|_| body.to_string());
    truncate_error_body(&message)
}

/// [`Summarizer`] that calls `POST {base_url}/chat/completions`.
pub struct OpenAiSummarizer {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(client: Client, api_key: SecretString, base_url: &str, model: &str) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends one chat completion and returns the trimmed first choice.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, SummarizeError> {
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            tracing::warn!(retry_after = ?retry_after, "Chat completion rate limited");
            return Err(SummarizeError::RateLimited { retry_after });
        }

        let body = response.text().await.map_err(request_error)?;
        if !status.is_success() {
            return Err(SummarizeError::Upstream {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| SummarizeError::Malformed(format!("invalid completion body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(SummarizeError::Malformed(
                "completion contained no text".to_string(),
            ));
        }
        Ok(content)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
        options: &JobOptions,
    ) -> Result<String, SummarizeError> {
        let summary = self
            .complete(build_messages(text, metadata, options))
            .await?;
        tracing::debug!(model = %self.model, chars = summary.len(), "Summary received");
        Ok(summary)
    }

    async fn translate(&self, summary: &str, language: &str) -> Result<String, SummarizeError> {
        let translated = self
            .complete(build_translation_messages(summary, language))
            .await?;
        tracing::debug!(
            model = %self.model,
            %language,
            chars = translated.len(),
            "Translation received"
        );
        Ok(translated)
    }
}
