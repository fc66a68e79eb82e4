//! Backend-mediated provider: talks to the `ai-chat` function of a
//! [`crate::server`] instance (or any service with the same contract).
//!
//! The credential never leaves the backend. The request carries the new user
//! message and the prior history; the backend prepends its own system prompt.
//!
//! ```text
//! POST {base_url}/ai-chat   { "userMessage": "...", "conversationHistory": [{role, content}, …] }
//!   200 { "content": "...", "cognitiveState": {…} }
//!   503 { "error": "...", "code": "not_configured" }
//!   4xx/5xx { "error": "..." }
//! ```

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::llm::{ChatMessage, LlmResponse, ProviderError, Role};

#[derive(Debug, Clone)]
pub struct BackendProvider {
    client: Client,
    base_url: String,
}

impl BackendProvider {
    pub fn new(base_url: String, timeout_seconds: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn chat_url(&self) -> String {
        format!("{}/ai-chat", self.base_url)
    }

    pub fn status_url(&self) -> String {
        format!("{}/check-ai-config", self.base_url)
    }

    /// Split `messages` into history + trailing user message and relay them.
    ///
    /// System messages are dropped; the backend owns the system prompt.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse, ProviderError> {
        let (last, history) = messages
            .split_last()
            .filter(|(last, _)| last.role == Role::User)
            .ok_or_else(|| ProviderError::Request("outbound messages must end with a user message".into()))?;

        let conversation_history: Vec<&ChatMessage> =
            history.iter().filter(|m| m.role != Role::System).collect();

        let payload = AiChatRequest {
            user_message: &last.content,
            conversation_history,
        };

        let url = self.chat_url();
        debug!(%url, history = payload.conversation_history.len(), "sending backend chat request");

        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            error!(%url, error = %e, "backend chat request failed (transport)");
            ProviderError::Request(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                warn!(%status, %detail, "backend reports it is not configured");
                return Err(ProviderError::NotConfigured(detail));
            }
            error!(%status, %detail, "backend chat returned HTTP error");
            return Err(ProviderError::Request(format!("HTTP {status}: {detail}")));
        }

        let raw = response.json::<serde_json::Value>().await.map_err(|e| {
            ProviderError::Request(format!("failed to parse response body: {e}"))
        })?;

        let text = raw
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Request("empty or missing content in response".into()))?;

        Ok(LlmResponse { text, raw, usage: None })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AiChatRequest<'a> {
    user_message: &'a str,
    conversation_history: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> BackendProvider {
        BackendProvider::new(format!("{}/functions/v1/", server.uri()), 5).unwrap()
    }

    #[test]
    fn urls_are_joined_without_double_slash() {
        let p = BackendProvider::new("http://h/functions/v1/".into(), 1).unwrap();
        assert_eq!(p.chat_url(), "http://h/functions/v1/ai-chat");
        assert_eq!(p.status_url(), "http://h/functions/v1/check-ai-config");
    }

    #[tokio::test]
    async fn posts_user_message_and_history_without_system() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/ai-chat"))
            .and(body_json(json!({
                "userMessage": "what is meaning?",
                "conversationHistory": [
                    { "role": "user", "content": "hi" },
                    { "role": "assistant", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "Meaning emerges.",
                "cognitiveState": { "recursionDepth": 2 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let msgs = vec![
            ChatMessage::new(Role::System, "persona"),
            ChatMessage::new(Role::User, "hi"),
            ChatMessage::new(Role::Assistant, "hello"),
            ChatMessage::new(Role::User, "what is meaning?"),
        ];
        let resp = provider(&server).complete(&msgs).await.unwrap();
        assert_eq!(resp.text, "Meaning emerges.");
        assert!(resp.raw.get("cognitiveState").is_some());
    }

    #[tokio::test]
    async fn service_unavailable_maps_to_not_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "LLM_API_KEY not configured",
                "code": "not_configured"
            })))
            .mount(&server)
            .await;

        let msgs = vec![ChatMessage::new(Role::User, "hi")];
        let err = provider(&server).complete(&msgs).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(ref m) if m.contains("LLM_API_KEY")));
    }

    #[tokio::test]
    async fn server_error_maps_to_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "error": "upstream down" })))
            .mount(&server)
            .await;

        let msgs = vec![ChatMessage::new(Role::User, "hi")];
        let err = provider(&server).complete(&msgs).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(ref m) if m.contains("upstream down")));
    }

    #[tokio::test]
    async fn content_is_returned_verbatim_and_blank_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "userMessage": "a", "conversationHistory": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": " spaced\n" })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_json(json!({ "userMessage": "b", "conversationHistory": [] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "   " })))
            .mount(&server)
            .await;

        let p = provider(&server);
        let resp = p.complete(&[ChatMessage::new(Role::User, "a")]).await.unwrap();
        assert_eq!(resp.text, " spaced\n");
        let err = p.complete(&[ChatMessage::new(Role::User, "b")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }

    #[tokio::test]
    async fn trailing_non_user_message_rejected() {
        let p = BackendProvider::new("http://127.0.0.1:1".into(), 1).unwrap();
        let err = p.complete(&[ChatMessage::new(Role::Assistant, "x")]).await.unwrap_err();
        assert!(matches!(err, ProviderError::Request(_)));
    }
}
