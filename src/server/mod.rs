//! Backend relay service: holds the LLM credential server-side so clients
//! only ever learn whether one is present.
//!
//! `run()` drives the axum event loop; the [`CancellationToken`] is wired to
//! axum's graceful shutdown.
//!
//! ## URL layout
//!
//! ```text
//! GET  /functions/v1/check-ai-config   → { isConfigured }
//! POST /functions/v1/ai-chat           → { content, cognitiveState }
//! ```

mod api;

use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderName, Method, header},
    routing::{get, post},
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::conversation::probe::{ConfigurationProbe, CredentialStore};
use crate::conversation::relay::{CompletionRelay, load_system_prompt};
use crate::error::AppError;
use crate::llm::{LlmProvider, providers};

/// Route prefix shared by both functions.
pub const FUNCTIONS_PREFIX: &str = "/functions/v1";

// ── Shared request state ──────────────────────────────────────────────────────

/// Axum router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct ServerState {
    relay: Arc<CompletionRelay>,
    probe: ConfigurationProbe,
    /// Most recent history entries forwarded upstream.
    history_cap: usize,
    rng: Arc<Mutex<StdRng>>,
}

impl ServerState {
    pub fn new(relay: CompletionRelay, probe: ConfigurationProbe, history_cap: usize) -> Self {
        Self {
            relay: Arc::new(relay),
            probe,
            history_cap: history_cap.max(1),
            rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Arc::new(Mutex::new(rng));
        self
    }

    /// The service calls the LLM directly; it cannot sit in front of another
    /// backend relay.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let provider = providers::build(&config.llm)
            .map_err(|e| AppError::Config(format!("llm provider: {e}")))?;
        if let LlmProvider::Backend(_) = provider {
            return Err(AppError::Config(
                "the relay service needs llm.default = \"openai\" or \"dummy\", not \"backend\"".into(),
            ));
        }
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
        Ok(Self::new(relay, probe, config.conversation.context_cap))
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn run(bind_addr: String, state: ServerState, shutdown: CancellationToken) -> Result<(), AppError> {
    let configured = state.probe.check().await;
    let router = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, ?configured, "relay service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("axum server error: {e}")))?;

    info!("relay service shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    let functions = Router::new()
        .route("/check-ai-config", get(api::check_config))
        .route("/ai-chat",         post(api::ai_chat));

    Router::new()
        .nest(FUNCTIONS_PREFIX, functions)
        .layer(cors)
        .with_state(state)
}
