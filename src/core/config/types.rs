//! Public configuration types.
//!
//! These are the resolved, ready-to-use structs that the rest of the crate
//! consumes. Raw TOML deserialization types live in `raw.rs`.

use std::path::PathBuf;

// ── LLM ──────────────────────────────────────────────────────────────────────

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Upper bound on generated tokens per completion.
    pub max_tokens: u32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Backend relay configuration (credential held server-side).
/// Populated from `[llm.backend]` in the TOML.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the functions endpoint, e.g. `http://127.0.0.1:8787/functions/v1`.
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Active provider: `"openai"`, `"backend"` or `"dummy"`.
    pub provider: String,
    /// When `false`, the direct pattern treats a missing key as configured
    /// (keyless local models).
    pub require_api_key: bool,
    pub openai: OpenAiConfig,
    pub backend: BackendConfig,
}

// ── Conversation ─────────────────────────────────────────────────────────────

/// Conversation session configuration.
#[derive(Debug, Clone)]
pub struct ConversationConfig {
    /// Maximum number of non-system messages kept in the rolling window.
    pub context_cap: usize,
    /// Optional file overriding the built-in system prompt.
    pub system_prompt_file: Option<PathBuf>,
}

// ── Server ───────────────────────────────────────────────────────────────────

/// Backend relay service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the axum listener binds to.
    pub bind: String,
}

// ── Top-level ────────────────────────────────────────────────────────────────

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub log_level: String,
    /// Append log output to this file instead of stderr.
    pub log_file: Option<PathBuf>,
    pub llm: LlmConfig,
    /// API key: sourced from `LLM_API_KEY` (or `GROQ_API_KEY`), never from TOML.
    pub llm_api_key: Option<String>,
    pub conversation: ConversationConfig,
    pub server: ServerConfig,
}
