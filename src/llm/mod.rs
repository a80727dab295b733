//! Chat-completion and title-summarization collaborators.
//!
//! `LlmProvider` is an enum over concrete backends. Provider instances are
//! shared immutable capabilities — clone them freely; completion requests
//! run as independent async calls and never touch the graph. Latency and
//! failure are opaque to the engine: the caller gets text or a typed
//! [`ProviderError`], nothing else.

pub mod providers;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Messages ──────────────────────────────────────────────────────────────

/// One turn of conversation history, also the element of a node's
/// accumulated history slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

// ── Error ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("provider request failed: {0}")]
    Request(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────

/// All available completion backends.
///
/// Enum dispatch avoids `dyn` trait objects and the `async-trait`
/// dependency. Adding a backend = new module + new variant + new arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

/// System prompt for the 2-3 word title summarizer.
const TITLE_SYSTEM_PROMPT: &str = "You are a title generator. \
Given a message, reply with a short descriptive title.\n\
- ONLY output the title, nothing else\n\
- Keep it between 2-3 words\n\
- Use title case\n\
- NO punctuation\n\
- NO explanations";

impl LlmProvider {
    /// Send an ordered message list and return the completion text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(messages).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(messages).await,
        }
    }

    /// Ask the backend for a short session title for `snippet`.
    ///
    /// The reply is clamped to three words regardless of what the model
    /// returns.
    pub async fn summarize_title(&self, snippet: &str) -> Result<String, ProviderError> {
        let messages = [
            ChatMessage::system(TITLE_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "Create a 2-3 word title for this message: {snippet}"
            )),
        ];
        let reply = self.complete(&messages).await?;
        let title = reply
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ");
        Ok(title)
    }

    /// [`LlmProvider::summarize_title`] with a timestamp fallback — never
    /// fails, so session creation cannot be blocked by a collaborator.
    pub async fn title_or_default(&self, snippet: &str) -> String {
        match self.summarize_title(snippet).await {
            Ok(title) if !title.is_empty() => title,
            Ok(_) | Err(_) => {
                format!("Chat {}", chrono::Local::now().format("%Y%m%d_%H%M"))
            }
        }
    }
}
