//! Axum handlers for `/functions/v1/*`.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use super::ServerState;
use crate::conversation::ConversationError;
use crate::conversation::cognitive;
use crate::llm::ChatMessage;

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AiChatRequest {
    user_message: String,
    #[serde(default)]
    conversation_history: Vec<ChatMessage>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /functions/v1/check-ai-config
pub(super) async fn check_config(State(state): State<ServerState>) -> Response {
    let configured = state.probe.check().await.is_configured();
    (StatusCode::OK, Json(json!({ "isConfigured": configured }))).into_response()
}

/// POST /functions/v1/ai-chat
pub(super) async fn ai_chat(State(state): State<ServerState>, Json(req): Json<AiChatRequest>) -> Response {
    let text = req.user_message.trim();
    if text.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "userMessage must not be empty" })))
            .into_response();
    }

    let history = &req.conversation_history;
    let history = &history[history.len().saturating_sub(state.history_cap)..];
    debug!(history = history.len(), "ai-chat request");

    match state.relay.complete_chat(text, history).await {
        Ok(completion) => {
            let cognitive_state = {
                let mut rng = state.rng.lock().await;
                cognitive::synthesize(text, &completion.text, &mut *rng)
            };
            let body = json!({ "content": completion.text, "cognitiveState": cognitive_state });
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(ConversationError::NotConfigured(msg)) => {
            warn!(%msg, "ai-chat refused: not configured");
            state.probe.mark_unconfigured(msg.clone()).await;
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": format!("LLM_API_KEY not configured: {msg}"), "code": "not_configured" })),
            )
                .into_response()
        }
        Err(ConversationError::RelayFailure(msg)) => {
            error!(%msg, "ai-chat relay failed");
            (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() }))).into_response(),
    }
}
