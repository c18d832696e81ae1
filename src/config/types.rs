use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Upper bound on concurrent lookups within a phase.
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Capacity of the progress event queue.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Base unit of the rate-limit backoff schedule (`2 << n` units).
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// How many times a rate-limited call is retried before giving up.
    #[serde(default = "default_max_escalations")]
    pub max_escalations: u32,

    /// Per-request timeout for HTTP providers.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_worker_limit() -> usize {
    12
}
fn default_event_buffer() -> usize {
    64
}
fn default_backoff_unit_ms() -> u64 {
    1000
}
fn default_max_escalations() -> u32 {
    5
}
fn default_request_timeout() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_limit: default_worker_limit(),
            event_buffer: default_event_buffer(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_escalations: default_max_escalations(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub omdb: OmdbConfig,

    #[serde(default)]
    pub ffprobe: FfprobeConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    /// TMDB v3 API key. The provider is inactive without one.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,

    /// Override the API root (used by tests and proxies).
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            language: default_language(),
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OmdbConfig {
    /// OMDb API key. The provider is inactive without one.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FfprobeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Explicit ffprobe binary; discovered on `PATH` when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for FfprobeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary: None,
        }
    }
}

/// Adapter-facing view of a provider section, passed to
/// [`MetadataProvider::configure`](crate::metadata::MetadataProvider::configure).
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub base_url: Option<String>,
    pub binary: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl TmdbConfig {
    pub fn options(&self, engine: &EngineConfig) -> ProviderOptions {
        ProviderOptions {
            enabled: true,
            api_key: self.api_key.clone(),
            language: Some(self.language.clone()),
            base_url: self.base_url.clone(),
            binary: None,
            timeout: Some(engine.request_timeout()),
        }
    }
}

impl OmdbConfig {
    pub fn options(&self, engine: &EngineConfig) -> ProviderOptions {
        ProviderOptions {
            enabled: true,
            api_key: self.api_key.clone(),
            language: None,
            base_url: self.base_url.clone(),
            binary: None,
            timeout: Some(engine.request_timeout()),
        }
    }
}

impl FfprobeConfig {
    pub fn options(&self, engine: &EngineConfig) -> ProviderOptions {
        ProviderOptions {
            enabled: self.enabled,
            api_key: None,
            language: None,
            base_url: None,
            binary: self.binary.clone(),
            timeout: Some(engine.request_timeout()),
        }
    }
}
