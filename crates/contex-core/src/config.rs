// SPDX-License-Identifier: MIT OR Apache-2.0
//! Domain-level defaults and bounds shared by every crate that reasons about
//! similarity thresholds, event-ring capacity, and per-agent queue depth.
//!
//! Service-wide configuration loading/merging lives in `contex-config`; this
//! module only carries the constants and small validation helpers that the
//! domain types themselves depend on (so `contex-core` stays dependency-free
//! of the config-loading machinery).

use crate::DEFAULT_SIMILARITY_THRESHOLD;

/// Lower bound for a configurable similarity threshold.
pub const MIN_SIMILARITY_THRESHOLD: f32 = -1.0;
/// Upper bound for a configurable similarity threshold.
pub const MAX_SIMILARITY_THRESHOLD: f32 = 1.0;

/// Default bounded ring size (K) for a project's event log.
pub const DEFAULT_EVENT_RING_CAPACITY: usize = 1024;
/// Default bounded depth of a single agent's delivery queue.
pub const DEFAULT_AGENT_QUEUE_CAPACITY: usize = 256;

/// Provides sensible defaults for optional domain-level settings.
#[derive(Debug, Default)]
pub struct ConfigDefaults;

impl ConfigDefaults {
    /// Default similarity threshold (τ).
    #[must_use]
    pub fn default_threshold() -> f32 {
        DEFAULT_SIMILARITY_THRESHOLD
    }

    /// Default event ring capacity (K).
    #[must_use]
    pub fn default_ring_capacity() -> usize {
        DEFAULT_EVENT_RING_CAPACITY
    }

    /// Default per-agent delivery queue capacity.
    #[must_use]
    pub fn default_queue_capacity() -> usize {
        DEFAULT_AGENT_QUEUE_CAPACITY
    }
}

/// Clamp and validate a caller-supplied similarity threshold override.
///
/// Returns `Err` with a human-readable reason when `value` falls outside
/// `[-1.0, 1.0]` or is not finite; otherwise returns `value` unchanged.
pub fn validate_threshold(value: f32) -> Result<f32, String> {
    if !value.is_finite() {
        return Err("similarity threshold must be a finite number".into());
    }
    if value < MIN_SIMILARITY_THRESHOLD || value > MAX_SIMILARITY_THRESHOLD {
        return Err(format!(
            "similarity threshold {value} out of range [{MIN_SIMILARITY_THRESHOLD}, {MAX_SIMILARITY_THRESHOLD}]"
        ));
    }
    Ok(value)
}
