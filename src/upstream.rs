// src/upstream.rs
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";
const MAX_COMPLETION_TOKENS: u32 = 8000;

/// Client for the OpenAI-compatible chat-completions endpoint.
///
/// Requests are always streamed; the returned response body is handed to the
/// relay untouched. Failures are never retried here: the user resubmits.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

/// One role-tagged message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
    max_completion_tokens: u32,
    temperature: f32,
}

impl CompletionClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Issues one streaming completion request.
    ///
    /// Non-success statuses are mapped to the turn error taxonomy before any
    /// body is read: 429 is a rate limit, 402 an exhausted quota, everything
    /// else an upstream failure.
    pub async fn stream_chat(
        &self,
        messages: Vec<WireMessage>,
    ) -> Result<reqwest::Response, RelayError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream: true,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            temperature: 0.0,
        };

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending streaming completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::NetworkFailure(e.to_string()))?;

        let status = response.status();
        match status.as_u16() {
            429 => {
                tracing::warn!("completion API rate limited the request");
                Err(RelayError::RateLimited)
            }
            402 => {
                tracing::warn!("completion API reported insufficient credits");
                Err(RelayError::QuotaExceeded)
            }
            code if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = code, %body, "completion API error");
                Err(RelayError::UpstreamFailure { status: code })
            }
            _ => Ok(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_matches_the_wire_format() {
        let request = ChatCompletionRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![
                WireMessage::system("analyze"),
                WireMessage::new("user", "how much?"),
            ],
            stream: true,
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            temperature: 0.0,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "how much?");
        assert_eq!(value["max_completion_tokens"], 8000);
    }

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = CompletionClient::new("k".into())
            .with_base_url("http://localhost:9999/v1/".into());
        assert_eq!(client.base_url, "http://localhost:9999/v1");
    }
}
