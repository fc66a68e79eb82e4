//! Raw TOML deserialization types.
//!
//! These structs mirror the TOML file shape and use `serde` defaults.
//! The `load` module converts them into the public `types` structs.

use serde::Deserialize;

// ── Top-level ────────────────────────────────────────────────────────────────

/// Raw TOML shape: serde target before resolution.
#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub app: RawApp,
    #[serde(default)]
    pub llm: RawLlm,
    #[serde(default)]
    pub conversation: RawConversation,
    #[serde(default)]
    pub server: RawServer,
}

#[derive(Deserialize)]
pub(super) struct RawApp {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for RawApp {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_true")]
    pub require_api_key: bool,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
    #[serde(default)]
    pub backend: RawBackendConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            require_api_key: true,
            openai: RawOpenAiConfig::default(),
            backend: RawBackendConfig::default(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            max_tokens: default_openai_max_tokens(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawBackendConfig {
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for RawBackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

// ── Conversation ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawConversation {
    #[serde(default = "default_context_cap")]
    pub context_cap: usize,
    #[serde(default)]
    pub system_prompt_file: Option<String>,
}

impl Default for RawConversation {
    fn default() -> Self {
        Self {
            context_cap: default_context_cap(),
            system_prompt_file: None,
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct RawServer {
    #[serde(default = "default_server_bind")]
    pub bind: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_server_bind() }
    }
}

// ── Default functions (used by serde) ────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_app_name() -> String {
    "daedalus".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_openai_api_base_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}
fn default_openai_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_openai_temperature() -> f32 {
    0.8
}
fn default_openai_max_tokens() -> u32 {
    1000
}
fn default_timeout_seconds() -> u64 {
    60
}
fn default_backend_base_url() -> String {
    "http://127.0.0.1:8787/functions/v1".to_string()
}

pub(super) fn default_context_cap() -> usize {
    8
}

pub(super) fn default_server_bind() -> String {
    "127.0.0.1:8787".to_string()
}
