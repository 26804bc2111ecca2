// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for Contex.
//!
//! This crate provides [`ContexConfig`] — the top-level runtime settings for
//! the `contex-daemon` binary — together with helpers for loading from TOML
//! files, applying `CONTEX_*` environment variable overrides, merging
//! overlays, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A webhook retry backoff schedule is unusually long.
    LargeRetryBackoff {
        /// The largest configured backoff step, in seconds.
        secs: u64,
    },
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::LargeRetryBackoff { secs } => {
                write!(f, "webhook retry backoff has a large step ({secs}s)")
            }
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Top-level runtime configuration for `contex-daemon`.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ContexConfig {
    /// Address the HTTP server binds to (e.g. `"127.0.0.1:8099"`).
    pub bind: String,
    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    pub log_level: String,
    /// Default cosine-similarity threshold (τ) applied to subscriptions that
    /// do not specify their own override.
    pub similarity_threshold: f32,
    /// Bounded ring capacity (K) for each project's event log.
    pub event_ring_capacity: usize,
    /// Bounded depth of each agent's delivery queue before it is marked
    /// lagging.
    pub agent_queue_capacity: usize,
    /// Embedding dimensionality expected from the configured embedding
    /// client.
    pub embedding_dimensions: usize,
    /// Timeout, in seconds, for a single embedding call.
    pub embedding_timeout_secs: u64,
    /// Timeout, in seconds, for a single webhook delivery attempt.
    pub webhook_timeout_secs: u64,
    /// Backoff schedule, in seconds, for webhook retries (attempt 2, 3, ...).
    pub webhook_retry_backoff_secs: Vec<u64>,
    /// Timeout, in seconds, for a single broker publish.
    pub broker_timeout_secs: u64,
    /// Base URL of the remote embedding provider, if using the HTTP client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_endpoint: Option<String>,
}

impl Default for ContexConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8099".into(),
            log_level: "info".into(),
            similarity_threshold: contex_core::DEFAULT_SIMILARITY_THRESHOLD,
            event_ring_capacity: contex_core::config::DEFAULT_EVENT_RING_CAPACITY,
            agent_queue_capacity: contex_core::config::DEFAULT_AGENT_QUEUE_CAPACITY,
            embedding_dimensions: 384,
            embedding_timeout_secs: 30,
            webhook_timeout_secs: 10,
            webhook_retry_backoff_secs: vec![1, 4, 16],
            broker_timeout_secs: 2,
            embedding_endpoint: None,
        }
    }
}

impl ContexConfig {
    /// The webhook timeout as a [`Duration`].
    #[must_use]
    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }

    /// The embedding timeout as a [`Duration`].
    #[must_use]
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }

    /// The broker timeout as a [`Duration`].
    #[must_use]
    pub fn broker_timeout(&self) -> Duration {
        Duration::from_secs(self.broker_timeout_secs)
    }

    /// The webhook retry backoff schedule as [`Duration`]s.
    #[must_use]
    pub fn webhook_retry_backoff(&self) -> Vec<Duration> {
        self.webhook_retry_backoff_secs
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum allowed timeout in seconds (24 hours) for any single knob.
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Threshold above which a retry backoff step generates a warning.
const LARGE_BACKOFF_THRESHOLD_SECS: u64 = 300;

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ContexConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ContexConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` is given but missing, or
/// [`ConfigError::ParseError`] if the file is not valid TOML for this shape.
pub fn load_config(path: Option<&Path>) -> Result<ContexConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ContexConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ContexConfig`]. Missing fields fall back to
/// [`ContexConfig::default()`] values (the type is `#[serde(default)]`).
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if `content` is not valid TOML, or its
/// fields do not match the expected shape/types.
pub fn parse_toml(content: &str) -> Result<ContexConfig, ConfigError> {
    toml::from_str::<ContexConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `CONTEX_BIND`
/// - `CONTEX_LOG_LEVEL`
/// - `CONTEX_SIMILARITY_THRESHOLD`
/// - `CONTEX_EVENT_RING_CAPACITY`
/// - `CONTEX_AGENT_QUEUE_CAPACITY`
/// - `CONTEX_EMBEDDING_ENDPOINT`
pub fn apply_env_overrides(config: &mut ContexConfig) {
    if let Ok(val) = std::env::var("CONTEX_BIND") {
        config.bind = val;
    }
    if let Ok(val) = std::env::var("CONTEX_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Ok(val) = std::env::var("CONTEX_SIMILARITY_THRESHOLD")
        && let Ok(parsed) = val.parse::<f32>()
    {
        config.similarity_threshold = parsed;
    }
    if let Ok(val) = std::env::var("CONTEX_EVENT_RING_CAPACITY")
        && let Ok(parsed) = val.parse::<usize>()
    {
        config.event_ring_capacity = parsed;
    }
    if let Ok(val) = std::env::var("CONTEX_AGENT_QUEUE_CAPACITY")
        && let Ok(parsed) = val.parse::<usize>()
    {
        config.agent_queue_capacity = parsed;
    }
    if let Ok(val) = std::env::var("CONTEX_EMBEDDING_ENDPOINT") {
        config.embedding_endpoint = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid log level, out-of-range threshold, zero capacities,
/// out-of-range timeouts) are returned as a [`ConfigError::ValidationError`];
/// soft issues come back as warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] listing every hard-error problem
/// found in `config`.
pub fn validate_config(config: &ContexConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("invalid log_level '{}'", config.log_level));
    }

    if let Err(reason) = contex_core::config::validate_threshold(config.similarity_threshold) {
        errors.push(reason);
    }

    if config.event_ring_capacity == 0 {
        errors.push("event_ring_capacity must be greater than 0".into());
    }
    if config.agent_queue_capacity == 0 {
        errors.push("agent_queue_capacity must be greater than 0".into());
    }
    if config.embedding_dimensions == 0 {
        errors.push("embedding_dimensions must be greater than 0".into());
    }

    for (name, secs) in [
        ("embedding_timeout_secs", config.embedding_timeout_secs),
        ("webhook_timeout_secs", config.webhook_timeout_secs),
        ("broker_timeout_secs", config.broker_timeout_secs),
    ] {
        if secs == 0 || secs > MAX_TIMEOUT_SECS {
            errors.push(format!("{name} {secs}s out of range (1..{MAX_TIMEOUT_SECS})"));
        }
    }

    if config.webhook_retry_backoff_secs.is_empty() {
        errors.push("webhook_retry_backoff_secs must not be empty".into());
    }
    if let Some(&max_backoff) = config.webhook_retry_backoff_secs.iter().max() {
        if max_backoff > LARGE_BACKOFF_THRESHOLD_SECS {
            warnings.push(ConfigWarning::LargeRetryBackoff { secs: max_backoff });
        }
    }

    if config.embedding_endpoint.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "embedding_endpoint".into(),
            hint: "falling back to the in-process deterministic embedding client".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. `overlay` takes precedence over `base` for
/// every field (this config has no field-level "unset" sentinel other than
/// `embedding_endpoint`, so this is effectively "prefer overlay, falling
/// back to base's endpoint when overlay has none").
#[must_use]
pub fn merge_configs(base: ContexConfig, overlay: ContexConfig) -> ContexConfig {
    ContexConfig {
        embedding_endpoint: overlay.embedding_endpoint.or(base.embedding_endpoint),
        ..overlay
    }
}
