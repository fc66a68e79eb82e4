//! End-to-end conversation tests against a mocked OpenAI-compatible upstream.

use daedalus::conversation::message::{FALLBACK_REPLY, ReasoningMode};
use daedalus::conversation::{
    CompletionRelay, ConfigurationProbe, ConfigurationState, ConversationError, ConversationSession,
    CredentialStore,
};
use daedalus::llm::LlmProvider;
use daedalus::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Replies with the number of messages it received, so tests can see how
/// much context went upstream.
struct CountingResponder;

impl Respond for CountingResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let messages = body["messages"].as_array().unwrap();
        let last = messages.last().unwrap()["content"].as_str().unwrap();
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "content": format!("reply to {last} ({} sent)", messages.len()) } }]
        }))
    }
}

fn session(server: &MockServer, key: Option<&str>, cap: usize) -> ConversationSession {
    let provider = LlmProvider::OpenAiCompatible(
        OpenAiCompatibleProvider::new(
            format!("{}/openai/v1/chat/completions", server.uri()),
            "llama-3.3-70b-versatile".into(),
            0.8,
            1000,
            5,
        )
        .unwrap(),
    );
    let credentials = CredentialStore::new(key.map(String::from));
    let probe = ConfigurationProbe::credential(credentials.clone(), true);
    let relay = CompletionRelay::new(provider, "You are DAEDALUS.", credentials, true);
    ConversationSession::new(probe, relay, cap).with_rng(StdRng::seed_from_u64(2024))
}

#[tokio::test]
async fn ten_pairs_leave_the_latest_eight_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/openai/v1/chat/completions"))
        .respond_with(CountingResponder)
        .expect(10)
        .mount(&server)
        .await;

    let mut s = session(&server, Some("gsk_test"), 8);
    assert_eq!(s.check_configuration().await, ConfigurationState::Configured);

    let mut sent = Vec::new();
    for i in 0..10 {
        let turn = s.send_turn(&format!("q{i}")).await.unwrap();
        assert!(!turn.is_fallback());
        sent.push(turn.reply.content().to_string());
    }

    // system + window (capped at 8) + new user message
    assert_eq!(sent[0], "reply to q0 (2 sent)");
    assert_eq!(sent[4], "reply to q4 (10 sent)");
    assert_eq!(sent[9], "reply to q9 (10 sent)");

    let window = s.context().windowed();
    assert_eq!(window.len(), 8);
    assert!(window.iter().all(|m| m.content() != "q0" && m.content() != "q1"));
    assert!(window.iter().all(|m| !m.content().starts_with("reply to q0") && !m.content().starts_with("reply to q1")));
    assert_eq!(window[0].content(), "q6");
    assert_eq!(window[7].content(), sent[9]);
    assert_eq!(s.stats().turns, 10);
}

#[tokio::test]
async fn relay_failure_then_recovery_keeps_continuity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "message": "model overloaded" }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST")).respond_with(CountingResponder).mount(&server).await;

    let mut s = session(&server, Some("gsk_test"), 8);
    s.check_configuration().await;

    let failed = s.send_turn("first").await.unwrap();
    assert!(failed.is_fallback());
    assert_eq!(failed.reply.content(), FALLBACK_REPLY);
    assert_eq!(
        failed.reply.cognitive_state().unwrap().reasoning_mode(),
        ReasoningMode::ErrorRecovery
    );

    // the fallback is part of the context the next call sees
    let ok = s.send_turn("second").await.unwrap();
    assert_eq!(ok.reply.content(), "reply to second (4 sent)");
    assert_eq!(s.context().len(), 4);
}

#[tokio::test]
async fn unconfigured_until_key_is_set() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(CountingResponder).expect(1).mount(&server).await;

    let mut s = session(&server, None, 8);
    assert_eq!(s.check_configuration().await, ConfigurationState::Unconfigured);
    assert!(matches!(s.send_turn("hello").await, Err(ConversationError::NotReady)));
    assert!(s.context().is_empty());

    s.set_api_key("gsk_late").await;
    assert!(s.send_turn("hello").await.is_ok());
}
