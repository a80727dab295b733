//! OpenAI-compatible chat completion provider (`/v1/chat/completions`).
//!
//! All wire types are private to this module — callers only see
//! [`crate::llm::ChatMessage`] in and `String` out. History assembly is the
//! caller's responsibility; this provider is one round-trip and stateless.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::llm::{ChatMessage, ProviderError};

// ── Public provider ───────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`:
/// OpenAI itself, local servers (Ollama, LM Studio…), and hosted
/// alternatives. Constructed once, then cheaply cloned because
/// `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// Build a provider from config values and an optional API key.
    ///
    /// `api_key` is `None` for keyless local models. When present it is
    /// sent as `Authorization: Bearer <key>` on every request.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: f32,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base_url,
            model,
            temperature,
            api_key,
        })
    }

    /// Send the ordered message list and return the first choice's text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| Message {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: self.temperature,
        };

        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            "sending completion request"
        );

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "completion HTTP request failed");
            ProviderError::Request(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ProviderError::Request(format!("failed to parse response body: {e}")))?;

        debug!(choices = parsed.choices.len(), "received completion response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))
    }
}

// ── Private wire types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Consume the response and return it if successful, or a structured error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        format!("HTTP {status}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "completion request returned HTTP error");
    Err(ProviderError::Request(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_and_without_key() {
        let p = OpenAiCompatibleProvider::new(
            "http://localhost:11434/v1/chat/completions".into(),
            "qwen2.5:3b".into(),
            0.7,
            30,
            None,
        )
        .unwrap();
        assert!(p.api_key.is_none());

        let p = OpenAiCompatibleProvider::new(
            "https://api.openai.com/v1/chat/completions".into(),
            "gpt-4o-mini".into(),
            0.7,
            30,
            Some("sk-test".into()),
        )
        .unwrap();
        assert_eq!(p.api_key.as_deref(), Some("sk-test"));
    }

    #[tokio::test]
    async fn complete_against_unreachable_endpoint_is_typed_error() {
        let p = OpenAiCompatibleProvider::new(
            // Reserved TEST-NET address — connection fails fast, no real traffic.
            "http://192.0.2.1:1/v1/chat/completions".into(),
            "m".into(),
            0.0,
            1,
            None,
        )
        .unwrap();
        let err = p.complete(&[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
