mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./reelname.toml",
        "~/.config/reelname/config.toml",
        "/etc/reelname/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let engine = &config.engine;

    if engine.worker_limit == 0 {
        anyhow::bail!("engine.worker_limit cannot be 0");
    }

    // One slot is reserved for the terminal progress event.
    if engine.event_buffer < 2 {
        anyhow::bail!("engine.event_buffer must be at least 2");
    }

    if engine.max_escalations > 5 {
        anyhow::bail!(
            "engine.max_escalations is {} but the backoff schedule allows at most 5",
            engine.max_escalations
        );
    }

    let providers = &config.providers;
    if providers
        .tmdb
        .api_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        tracing::warn!("providers.tmdb.api_key is empty; TMDB lookups are disabled");
    }
    if providers
        .omdb
        .api_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        tracing::warn!("providers.omdb.api_key is empty; OMDb lookups are disabled");
    }
    if let Some(binary) = &providers.ffprobe.binary {
        if providers.ffprobe.enabled && !binary.exists() {
            tracing::warn!("ffprobe binary does not exist: {:?}", binary);
        }
    }

    Ok(())
}
