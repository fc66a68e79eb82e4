//! Conversation orchestrator.
//!
//! One [`ConversationSession`] per conversation. It owns the rolling context,
//! the relay, the synthesizer's RNG and the session statistics, and shares the
//! configuration probe with any observers. `send_turn` takes `&mut self`, so
//! at most one turn is in flight per session.
//!
//! ```text
//! Unconfigured ──check()/set_api_key()──▶ Configured
//!      ▲                                     │
//!      └──── reset() / NotConfigured ◀───────┘
//! ```

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, warn};

use super::ConversationError;
use super::cognitive;
use super::context::ContextWindow;
use super::message::{CognitiveState, Message};
use super::probe::{ConfigurationProbe, ConfigurationState, CredentialStore};
use super::relay::{CompletionRelay, load_system_prompt};
use crate::config::Config;
use crate::error::AppError;
use crate::llm::providers;

/// Outcome of a turn that produced a visible reply.
#[derive(Debug, Clone)]
pub struct Turn {
    pub reply: Message,
    /// Set when the relay failed and `reply` is the fixed fallback.
    pub failure: Option<String>,
}

impl Turn {
    pub fn is_fallback(&self) -> bool {
        self.failure.is_some()
    }
}

/// Running averages over every assistant reply of the session, including
/// replies already evicted from the context window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub turns: u64,
    pub avg_empathy: f64,
    pub avg_recursion_depth: f64,
}

impl SessionStats {
    fn record(&mut self, state: &CognitiveState) {
        self.turns += 1;
        let n = self.turns as f64;
        self.avg_empathy += (state.empathy_level() - self.avg_empathy) / n;
        self.avg_recursion_depth += (state.recursion_depth() - self.avg_recursion_depth) / n;
    }
}

pub struct ConversationSession {
    probe: ConfigurationProbe,
    relay: CompletionRelay,
    context: ContextWindow,
    rng: StdRng,
    stats: SessionStats,
}

impl ConversationSession {
    pub fn new(probe: ConfigurationProbe, relay: CompletionRelay, context_cap: usize) -> Self {
        Self {
            probe,
            relay,
            context: ContextWindow::new(context_cap),
            rng: StdRng::from_entropy(),
            stats: SessionStats::default(),
        }
    }

    /// Replace the synthesizer's randomness source, e.g. with a seeded one.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Wire provider, credential store, probe and relay from `config`.
    ///
    /// The session starts `Unconfigured`; call [`check_configuration`](Self::check_configuration).
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm)
            .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
        let credentials = CredentialStore::new(config.llm_api_key.clone());
        let probe = ConfigurationProbe::for_provider(
            &provider,
            credentials.clone(),
            config.llm.require_api_key,
            config.llm.backend.timeout_seconds,
        )
        .map_err(|e| AppError::Config(format!("configuration probe: {e}")))?;
        let system_prompt = load_system_prompt(config.conversation.system_prompt_file.as_deref())?;
        let relay = CompletionRelay::new(provider, system_prompt, credentials, probe.requires_local_key());

        info!(
            provider = relay.provider().name(),
            context_cap = config.conversation.context_cap,
            "conversation session ready"
        );
        Ok(Self::new(probe, relay, config.conversation.context_cap))
    }

    pub fn probe(&self) -> &ConfigurationProbe {
        &self.probe
    }

    pub fn context(&self) -> &ContextWindow {
        &self.context
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub async fn state(&self) -> ConfigurationState {
        self.probe.state().await
    }

    pub async fn check_configuration(&self) -> ConfigurationState {
        self.probe.check().await
    }

    pub async fn set_api_key(&self, key: impl Into<String>) -> ConfigurationState {
        self.probe.set_api_key(key).await
    }

    /// Drop the credential and return to `Unconfigured`. History is kept.
    pub async fn reset(&self) {
        self.probe.reset().await;
    }

    /// Run one conversational turn.
    ///
    /// Errors leave the context untouched. A relay failure is not an error
    /// here: the fixed fallback reply is appended and returned instead.
    pub async fn send_turn(&mut self, user_text: &str) -> Result<Turn, ConversationError> {
        let text = user_text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        if !self.probe.state().await.is_configured() {
            return Err(ConversationError::NotReady);
        }

        let user = Message::user(text);
        // The relay sees the window as it was before this turn.
        let outcome = self.relay.complete(text, self.context.windowed()).await;

        match outcome {
            Ok(completion) => {
                let state = cognitive::synthesize(text, &completion.text, &mut self.rng);
                let reply = Message::assistant(completion.text, state);
                self.commit(user, reply.clone());
                Ok(Turn { reply, failure: None })
            }
            Err(ConversationError::RelayFailure(cause)) => {
                warn!(%cause, "relay failed; answering with fallback");
                let reply = Message::fallback();
                self.commit(user, reply.clone());
                Ok(Turn { reply, failure: Some(cause) })
            }
            Err(ConversationError::NotConfigured(cause)) => {
                warn!(%cause, "credential missing mid-session");
                self.probe.mark_unconfigured(cause).await;
                Err(ConversationError::NotReady)
            }
            Err(other) => Err(other),
        }
    }

    fn commit(&mut self, user: Message, reply: Message) {
        if let Some(state) = reply.cognitive_state() {
            self.stats.record(state);
        }
        self.context.append(user).append(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::message::{FALLBACK_REPLY, ReasoningMode};
    use crate::llm::providers::backend::BackendProvider;
    use crate::llm::providers::dummy::DummyProvider;
    use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
    use crate::llm::{LlmProvider, Role};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn seeded(session: ConversationSession) -> ConversationSession {
        session.with_rng(StdRng::seed_from_u64(11))
    }

    fn dummy_session(cap: usize) -> ConversationSession {
        let credentials = CredentialStore::default();
        let probe = ConfigurationProbe::credential(credentials.clone(), false);
        let relay = CompletionRelay::new(LlmProvider::Dummy(DummyProvider), "persona", credentials, false);
        seeded(ConversationSession::new(probe, relay, cap))
    }

    fn openai_session(server: &MockServer, key: Option<&str>) -> ConversationSession {
        let provider = LlmProvider::OpenAiCompatible(
            OpenAiCompatibleProvider::new(
                format!("{}/v1/chat/completions", server.uri()),
                "m".into(),
                0.8,
                100,
                5,
            )
            .unwrap(),
        );
        let credentials = CredentialStore::new(key.map(String::from));
        let probe = ConfigurationProbe::credential(credentials.clone(), true);
        let relay = CompletionRelay::new(provider, "persona", credentials, true);
        seeded(ConversationSession::new(probe, relay, 8))
    }

    #[tokio::test]
    async fn unconfigured_turn_is_not_ready_and_side_effect_free() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let mut s = openai_session(&server, None);
        assert_eq!(s.check_configuration().await, ConfigurationState::Unconfigured);
        let err = s.send_turn("hello").await.unwrap_err();
        assert!(matches!(err, ConversationError::NotReady));
        assert!(s.context().is_empty());
        assert_eq!(s.stats().turns, 0);
    }

    #[tokio::test]
    async fn empty_message_rejected_without_side_effect() {
        let mut s = dummy_session(8);
        s.check_configuration().await;
        assert!(matches!(s.send_turn("   ").await, Err(ConversationError::EmptyMessage)));
        assert!(s.context().is_empty());
    }

    #[tokio::test]
    async fn successful_turn_appends_user_then_reply() {
        let mut s = dummy_session(8);
        s.check_configuration().await;
        let turn = s.send_turn("  why do we dream?  ").await.unwrap();
        assert!(!turn.is_fallback());
        assert_eq!(turn.reply.content(), "[echo] why do we dream?");
        assert!(turn.reply.cognitive_state().is_some());

        let window = s.context().windowed();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].role(), Role::User);
        assert_eq!(window[0].content(), "why do we dream?");
        assert_eq!(window[1].id(), turn.reply.id());
    }

    #[tokio::test]
    async fn relay_failure_appends_exactly_one_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": { "message": "boom" } })))
            .mount(&server)
            .await;

        let mut s = openai_session(&server, Some("k"));
        assert!(s.check_configuration().await.is_configured());
        let turn = s.send_turn("hello").await.unwrap();
        assert!(turn.is_fallback());
        assert!(turn.failure.as_deref().unwrap().contains("boom"));

        let assistants: Vec<&Message> =
            s.context().windowed().iter().filter(|m| m.role() == Role::Assistant).collect();
        assert_eq!(assistants.len(), 1);
        assert_eq!(assistants[0].content(), FALLBACK_REPLY);
        assert_eq!(
            assistants[0].cognitive_state().unwrap().reasoning_mode(),
            ReasoningMode::ErrorRecovery
        );
        // still configured: a relay failure is not a configuration failure
        assert!(s.state().await.is_configured());
    }

    #[tokio::test]
    async fn mid_session_not_configured_reverts_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/functions/v1/check-ai-config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isConfigured": true })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/ai-chat"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "LLM_API_KEY not configured", "code": "not_configured"
            })))
            .mount(&server)
            .await;

        let backend = LlmProvider::Backend(
            BackendProvider::new(format!("{}/functions/v1", server.uri()), 5).unwrap(),
        );
        let credentials = CredentialStore::default();
        let probe = ConfigurationProbe::for_provider(&backend, credentials.clone(), true, 5).unwrap();
        let relay = CompletionRelay::new(backend, "persona", credentials, probe.requires_local_key());
        let mut s = seeded(ConversationSession::new(probe, relay, 8));

        assert!(s.check_configuration().await.is_configured());
        let err = s.send_turn("hello").await.unwrap_err();
        assert!(matches!(err, ConversationError::NotReady));
        assert_eq!(s.state().await, ConfigurationState::Unconfigured);
        assert!(s.probe().last_cause().await.unwrap().contains("LLM_API_KEY"));
        assert!(s.context().is_empty());
    }

    #[tokio::test]
    async fn set_api_key_then_reset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "I am here." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut s = openai_session(&server, None);
        assert!(s.set_api_key("gsk_live").await.is_configured());
        assert_eq!(s.send_turn("hello").await.unwrap().reply.content(), "I am here.");

        s.reset().await;
        assert!(matches!(s.send_turn("again").await, Err(ConversationError::NotReady)));
        assert_eq!(s.context().len(), 2);
    }

    #[tokio::test]
    async fn window_keeps_latest_eight_after_ten_pairs() {
        let mut s = dummy_session(8);
        s.check_configuration().await;
        for i in 0..10 {
            s.send_turn(&format!("message {i}")).await.unwrap();
        }
        let window = s.context().windowed();
        assert_eq!(window.len(), 8);
        assert_eq!(window[0].content(), "message 6");
        assert!(window.iter().all(|m| m.content() != "message 0" && m.content() != "[echo] message 0"));
        assert_eq!(s.stats().turns, 10);
    }

    #[test]
    fn stats_are_running_means() {
        let mut stats = SessionStats::default();
        stats.record(&CognitiveState::new(4.0, 60.0, ReasoningMode::CrossDomain, 70.0, ["a"]));
        stats.record(&CognitiveState::new(8.0, 80.0, ReasoningMode::CrossDomain, 70.0, ["a"]));
        assert_eq!(stats.turns, 2);
        assert!((stats.avg_recursion_depth - 6.0).abs() < 1e-9);
        assert!((stats.avg_empathy - 70.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn from_config_builds_dummy_session() {
        let cfg = Config::test_default();
        let mut s = ConversationSession::from_config(&cfg).unwrap();
        assert_eq!(s.state().await, ConfigurationState::Unconfigured);
        assert!(s.check_configuration().await.is_configured());
        assert!(s.send_turn("hi").await.is_ok());
    }
}
