//! Conversation pipeline.
//!
//! ```text
//! ConversationSession::send_turn(text)
//!   ├─ ConfigurationProbe      state gate (Configured / Unconfigured)
//!   ├─ ContextWindow           pre-append snapshot, capped, oldest-first
//!   ├─ CompletionRelay         [system] ++ context ++ [user] → LlmProvider
//!   ├─ cognitive::synthesize   keyword heuristics + injected jitter
//!   └─ ContextWindow::append   user message, then reply (or fallback)
//! ```

pub mod cognitive;
pub mod context;
pub mod message;
pub mod probe;
pub mod relay;
pub mod session;

use thiserror::Error;

use crate::llm::ProviderError;

pub use context::ContextWindow;
pub use message::{CognitiveState, Message, ReasoningMode};
pub use probe::{ConfigurationProbe, ConfigurationState, CredentialStore};
pub use relay::{Completion, CompletionRelay};
pub use session::{ConversationSession, SessionStats, Turn};

#[derive(Debug, Error)]
pub enum ConversationError {
    /// No credential is available, locally or at the backend.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// Transport or provider-side failure on one call. Retrying the turn is fine.
    #[error("relay failure: {0}")]
    RelayFailure(String),

    /// A turn was attempted while the session is unconfigured.
    #[error("session not ready: configure an API key first")]
    NotReady,

    #[error("message must not be empty")]
    EmptyMessage,
}

impl From<ProviderError> for ConversationError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(msg) => ConversationError::NotConfigured(msg),
            other => ConversationError::RelayFailure(other.to_string()),
        }
    }
}
