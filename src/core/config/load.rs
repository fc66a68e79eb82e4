//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies the `DAEDALUS_LOG_LEVEL` env override.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Deep-merge two TOML values.
/// Tables are merged recursively: the overlay only needs to specify keys that
/// differ from the base. For every other type (string, integer, array, …)
/// the overlay value replaces the base value wholesale.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(
    path: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let log_level_override = env::var("DAEDALUS_LOG_LEVEL").ok();

    if let Some(path) = config_path {
        return load_from(Path::new(path), log_level_override.as_deref());
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, log_level_override.as_deref())
    } else {
        Ok(resolve(RawConfig::default(), log_level_override.as_deref()))
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
/// Follows `[meta] base = "..."` inheritance chains before resolving.
pub fn load_from(path: &Path, log_level_override: Option<&str>) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val)
        .map_err(|e: toml::de::Error| {
            AppError::Config(format!("config error in {}: {e}", path.display()))
        })?;

    let config = resolve(parsed, log_level_override);
    if config.conversation.context_cap == 0 {
        return Err(AppError::Config(format!(
            "conversation.context_cap must be at least 1 in {}",
            path.display()
        )));
    }
    Ok(config)
}

fn resolve(parsed: RawConfig, log_level_override: Option<&str>) -> Config {
    let app = parsed.app;
    let log_level = log_level_override.unwrap_or(&app.log_level).to_string();

    Config {
        name: app.name,
        log_level,
        log_file: app.log_file.as_deref().map(expand_home),
        llm: LlmConfig {
            provider: parsed.llm.provider,
            require_api_key: parsed.llm.require_api_key,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                max_tokens: parsed.llm.openai.max_tokens,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
            backend: BackendConfig {
                base_url: parsed.llm.backend.base_url.trim_end_matches('/').to_string(),
                timeout_seconds: parsed.llm.backend.timeout_seconds,
            },
        },
        llm_api_key: api_key_from_env(),
        conversation: ConversationConfig {
            context_cap: parsed.conversation.context_cap,
            system_prompt_file: parsed.conversation.system_prompt_file.as_deref().map(expand_home),
        },
        server: ServerConfig {
            bind: parsed.server.bind,
        },
    }
}

fn api_key_from_env() -> Option<String> {
    pick_api_key(env::var("LLM_API_KEY").ok(), env::var("GROQ_API_KEY").ok())
}

/// `LLM_API_KEY` wins; `GROQ_API_KEY` is accepted for existing deployments.
/// Blank values count as absent.
fn pick_api_key(llm: Option<String>, groq: Option<String>) -> Option<String> {
    [llm, groq]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn llm_key_takes_precedence_over_groq_key() {
        assert_eq!(pick_api_key(some("llm"), some("groq")), some("llm"));
        assert_eq!(pick_api_key(None, some("groq")), some("groq"));
        assert_eq!(pick_api_key(None, None), None);
    }

    #[test]
    fn blank_keys_count_as_absent() {
        assert_eq!(pick_api_key(some("   "), some(" groq ")), some("groq"));
        assert_eq!(pick_api_key(some(""), some("\t")), None);
    }
}
