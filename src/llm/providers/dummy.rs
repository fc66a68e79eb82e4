//! Dummy LLM provider: echoes the latest user message back prefixed with `[echo]`.
//! Used for exercising the full conversation round-trip without a real API key.

use crate::llm::{ChatMessage, LlmResponse, ProviderError, Role};

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse, ProviderError> {
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let text = format!("[echo] {last}");
        let raw = serde_json::json!({ "choices": [{ "message": { "content": text } }] });
        Ok(LlmResponse { text, raw, usage: None })
    }
}
