//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream base URL and paths
//! - Validate value ranges (pool sizes, timeouts, body limit)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.base_url {url:?} is invalid: {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("{field} must start with '/', got {value:?}")]
    Path { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("pool.max_idle_connections ({idle}) exceeds pool.max_connections ({max})")]
    IdleAboveMax { idle: usize, max: usize },

    #[error("timeouts.total_ms ({total}) is shorter than timeouts.connect_ms ({connect})")]
    TotalBelowConnect { total: u64, connect: u64 },
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(reason) = check_base_url(&config.upstream.base_url) {
        errors.push(ValidationError::BaseUrl {
            url: config.upstream.base_url.clone(),
            reason,
        });
    }

    let paths = [
        ("upstream.health_path", &config.upstream.health_path),
        ("upstream.chat_completions_path", &config.upstream.chat_completions_path),
        ("upstream.completions_path", &config.upstream.completions_path),
    ];
    for (field, value) in paths {
        if !value.starts_with('/') {
            errors.push(ValidationError::Path {
                field,
                value: value.clone(),
            });
        }
    }

    if config.pool.max_connections == 0 {
        errors.push(ValidationError::Zero { field: "pool.max_connections" });
    } else if config.pool.max_idle_connections > config.pool.max_connections {
        errors.push(ValidationError::IdleAboveMax {
            idle: config.pool.max_idle_connections,
            max: config.pool.max_connections,
        });
    }

    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.connect_ms" });
    }
    if config.timeouts.total_ms < config.timeouts.connect_ms {
        errors.push(ValidationError::TotalBelowConnect {
            total: config.timeouts.total_ms,
            connect: config.timeouts.connect_ms,
        });
    }

    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero { field: "listener.max_body_bytes" });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_base_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}, only http is supported", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err("must not carry a query or fragment".to_string());
    }
    Ok(())
}
