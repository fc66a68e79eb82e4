//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies the `DAEDALUS_LOG_LEVEL` env override. The LLM credential is
//! read from `LLM_API_KEY` (or `GROQ_API_KEY`) and never from TOML.
//!
//! # Module layout
//!
//! - **types**: Public configuration structs (`Config`, `LlmConfig`, …).
//! - **raw**: Raw TOML deserialization types (`RawConfig`, `RawLlm`, …).
//!   These mirror the file shape and use serde defaults; kept private.
//! - **load**: Loading logic: `merge_toml`, `load_raw_merged`, `load`,
//!   `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{expand_home, load, load_from};
pub use types::*;

impl Config {
    /// Safe `Config` for tests: dummy LLM, no API keys, no external calls.
    pub fn test_default() -> Self {
        Self {
            name: "test".into(),
            log_level: "info".into(),
            log_file: None,
            llm: LlmConfig {
                provider: "dummy".into(),
                require_api_key: false,
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    max_tokens: 64,
                    timeout_seconds: 1,
                },
                backend: BackendConfig {
                    base_url: "http://localhost:0/functions/v1".into(),
                    timeout_seconds: 1,
                },
            },
            llm_api_key: None,
            conversation: ConversationConfig {
                context_cap: raw::default_context_cap(),
                system_prompt_file: None,
            },
            server: ServerConfig {
                bind: raw::default_server_bind(),
            },
        }
    }
}
