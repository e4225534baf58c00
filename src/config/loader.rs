//! Configuration loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {var}={value:?} is not a valid value")]
    Env { var: &'static str, value: String },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML configuration file. Validation happens in [`resolve`].
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Overlay `GATEWAY_*` variables on top of `config`.
///
/// `lookup` is injected so callers can pass `std::env::var` or a fixed map.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("GATEWAY_UPSTREAM_URL") {
        config.upstream.base_url = v;
    }
    if let Some(v) = lookup("GATEWAY_HEALTH_PATH") {
        config.upstream.health_path = v;
    }
    if let Some(v) = lookup("GATEWAY_HOST") {
        config.listener.host = v;
    }
    if let Some(v) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = v;
    }

    override_parsed(&lookup, "GATEWAY_PORT", &mut config.listener.port)?;
    override_parsed(&lookup, "GATEWAY_WORKERS", &mut config.listener.workers)?;
    override_parsed(&lookup, "GATEWAY_MAX_CONNECTIONS", &mut config.pool.max_connections)?;
    override_parsed(&lookup, "GATEWAY_MAX_IDLE_CONNECTIONS", &mut config.pool.max_idle_connections)?;
    override_parsed(&lookup, "GATEWAY_CONNECT_TIMEOUT_MS", &mut config.timeouts.connect_ms)?;
    override_parsed(&lookup, "GATEWAY_TOTAL_TIMEOUT_MS", &mut config.timeouts.total_ms)?;

    Ok(())
}

fn override_parsed<F, T>(lookup: &F, var: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(var) {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Env { var, value })?;
    }
    Ok(())
}

/// Build the effective configuration: defaults, then the optional file, then
/// environment overrides, then validation.
pub fn resolve<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
