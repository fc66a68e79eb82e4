//! Configuration probe: answers "is a usable backend credential available?".
//!
//! Two targets:
//!
//! - **status endpoint** (backend-mediated pattern): `GET {base}/check-ai-config`
//!   returning `{ "isConfigured": bool }`. The credential never reaches this
//!   process.
//! - **credential** (direct pattern): the key lives in a local
//!   [`CredentialStore`] and `set_api_key` substitutes for a remote check.
//!
//! The last result is cached behind an async `RwLock`; state and cause are
//! written together so readers never see a torn update. "Not configured" is a
//! normal answer, and transport failures collapse to it with the cause kept
//! for logging.

use std::sync::Arc;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::llm::{LlmProvider, ProviderError};

// ── ConfigurationState ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfigurationState {
    Unconfigured,
    Configured,
}

impl ConfigurationState {
    pub fn is_configured(self) -> bool {
        self == ConfigurationState::Configured
    }

    fn from_flag(flag: bool) -> Self {
        if flag { Self::Configured } else { Self::Unconfigured }
    }
}

// ── CredentialStore ───────────────────────────────────────────────────────────

/// Locally held API key for the direct pattern.
///
/// Clone freely: clones share the same slot.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialStore(<redacted>)")
    }
}

impl CredentialStore {
    /// Blank keys are treated as absent.
    pub fn new(initial: Option<String>) -> Self {
        Self { inner: Arc::new(RwLock::new(normalize(initial))) }
    }

    pub async fn set(&self, key: impl Into<String>) -> bool {
        let key = normalize(Some(key.into()));
        let present = key.is_some();
        *self.inner.write().await = key;
        present
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    pub async fn is_present(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub(crate) async fn get(&self) -> Option<String> {
        self.inner.read().await.clone()
    }
}

fn normalize(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

// ── ConfigurationProbe ────────────────────────────────────────────────────────

#[derive(Debug)]
enum ProbeTarget {
    StatusEndpoint { client: Client, url: String },
    Credential { require_key: bool },
}

#[derive(Debug, Clone)]
struct ProbeStatus {
    state: ConfigurationState,
    cause: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    is_configured: bool,
}

/// Cached configuration flag plus the means to refresh it.
///
/// Starts `Unconfigured` until the first [`check`](Self::check).
#[derive(Debug, Clone)]
pub struct ConfigurationProbe {
    target: Arc<ProbeTarget>,
    credentials: CredentialStore,
    status: Arc<RwLock<ProbeStatus>>,
}

impl ConfigurationProbe {
    fn with_target(target: ProbeTarget, credentials: CredentialStore) -> Self {
        Self {
            target: Arc::new(target),
            credentials,
            status: Arc::new(RwLock::new(ProbeStatus {
                state: ConfigurationState::Unconfigured,
                cause: None,
            })),
        }
    }

    /// Probe a remote `check-ai-config` endpoint.
    pub fn status_endpoint(url: impl Into<String>, timeout_seconds: u64) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build probe client: {e}")))?;
        Ok(Self::with_target(
            ProbeTarget::StatusEndpoint { client, url: url.into() },
            CredentialStore::default(),
        ))
    }

    /// Probe a local credential store. With `require_key == false` the probe
    /// reports `Configured` even without a key (keyless local models).
    pub fn credential(credentials: CredentialStore, require_key: bool) -> Self {
        Self::with_target(ProbeTarget::Credential { require_key }, credentials)
    }

    /// Pick the target that matches where `provider` keeps its credential.
    pub fn for_provider(
        provider: &LlmProvider,
        credentials: CredentialStore,
        require_key: bool,
        timeout_seconds: u64,
    ) -> Result<Self, ProviderError> {
        match provider {
            LlmProvider::Backend(b) => Self::status_endpoint(b.status_url(), timeout_seconds),
            LlmProvider::Dummy(_) => Ok(Self::credential(credentials, false)),
            LlmProvider::OpenAiCompatible(_) => Ok(Self::credential(credentials, require_key)),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Whether a missing local key must block relay calls.
    pub fn requires_local_key(&self) -> bool {
        matches!(*self.target, ProbeTarget::Credential { require_key: true })
    }

    /// Query the target, update the cache, and return the fresh state.
    /// Idempotent; callers may re-probe at any time.
    pub async fn check(&self) -> ConfigurationState {
        let (state, cause) = match &*self.target {
            ProbeTarget::StatusEndpoint { client, url } => query_status(client, url).await,
            ProbeTarget::Credential { require_key } => {
                let present = self.credentials.is_present().await;
                let cause = (!present && *require_key).then(|| "no API key set".to_string());
                (ConfigurationState::from_flag(present || !*require_key), cause)
            }
        };
        if let Some(cause) = &cause {
            warn!(%cause, "configuration probe: not configured");
        } else {
            debug!(?state, "configuration probe finished");
        }
        self.store(state, cause).await;
        state
    }

    /// Last cached state; never touches the network.
    pub async fn state(&self) -> ConfigurationState {
        self.status.read().await.state
    }

    /// Why the last probe or transition ended `Unconfigured`, if known.
    pub async fn last_cause(&self) -> Option<String> {
        self.status.read().await.cause.clone()
    }

    /// Direct pattern: store `key` and mark configured. A blank key leaves the
    /// machine unconfigured. The status-endpoint target manages its credential
    /// remotely, so the call only logs and returns the cached state.
    pub async fn set_api_key(&self, key: impl Into<String>) -> ConfigurationState {
        if let ProbeTarget::StatusEndpoint { .. } = &*self.target {
            warn!("API key is managed by the backend; set_api_key ignored");
            return self.state().await;
        }
        if self.credentials.set(key).await {
            self.store(ConfigurationState::Configured, None).await;
            ConfigurationState::Configured
        } else {
            self.store(ConfigurationState::Unconfigured, Some("blank API key".into())).await;
            ConfigurationState::Unconfigured
        }
    }

    /// Forget any local key and fall back to `Unconfigured`.
    pub async fn reset(&self) {
        self.credentials.clear().await;
        self.store(ConfigurationState::Unconfigured, Some("reset".into())).await;
    }

    /// Record a `NotConfigured` failure observed outside the probe.
    pub async fn mark_unconfigured(&self, cause: impl Into<String>) {
        self.store(ConfigurationState::Unconfigured, Some(cause.into())).await;
    }

    async fn store(&self, state: ConfigurationState, cause: Option<String>) {
        let mut status = self.status.write().await;
        if status.state != state {
            info!(from = ?status.state, to = ?state, "configuration state changed");
        }
        status.state = state;
        status.cause = cause;
    }
}

async fn query_status(client: &Client, url: &str) -> (ConfigurationState, Option<String>) {
    let response = match client.get(url).send().await {
        Ok(r) => r,
        Err(e) => return (ConfigurationState::Unconfigured, Some(format!("probe request failed: {e}"))),
    };
    let status = response.status();
    if !status.is_success() {
        return (ConfigurationState::Unconfigured, Some(format!("probe returned HTTP {status}")));
    }
    match response.json::<StatusBody>().await {
        Ok(body) if body.is_configured => (ConfigurationState::Configured, None),
        Ok(_) => (ConfigurationState::Unconfigured, Some("backend reports no credential".into())),
        Err(e) => (ConfigurationState::Unconfigured, Some(format!("malformed probe body: {e}"))),
    }
}
