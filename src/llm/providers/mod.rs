//! LLM provider implementations.
//!
//! `build(config)` is the factory: called at startup.
//! Adding a new backend = new module + new match arm.

pub mod backend;
pub mod dummy;
pub mod openai_compatible;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config.
///
/// The credential is not captured here; the relay hands it over per call.
pub fn build(config: &LlmConfig) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" | "groq" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.max_tokens,
                oai.timeout_seconds,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        "backend" => {
            let b = &config.backend;
            let p = backend::BackendProvider::new(b.base_url.clone(), b.timeout_seconds)?;
            Ok(LlmProvider::Backend(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
