//! Dummy provider — echoes the last message back prefixed with `[echo]`.
//! Used to exercise the full completion round-trip without a real API key.

use crate::llm::{ChatMessage, ProviderError};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let last = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("[echo] {last}"))
    }
}
