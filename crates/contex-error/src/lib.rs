//! Unified error taxonomy with stable error codes for Contex.
//!
//! Every Contex error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`ContexError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Request payload failed validation.
    Validation,
    /// A referenced project, agent, or data item does not exist.
    NotFound,
    /// Format detection or parsing of a published data item failed.
    FormatDetection,
    /// Embedding generation failed or timed out.
    Embedding,
    /// Delivery to an agent's broker channel or webhook failed.
    Delivery,
    /// Configuration is invalid.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::FormatDetection => "format_detection",
            Self::Embedding => "embedding",
            Self::Delivery => "delivery",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Validation --
    /// A required field was missing from the request payload.
    ValidationMissingField,
    /// A field had a value outside its allowed range or shape.
    ValidationInvalidValue,
    /// A value exceeded a configured size limit (e.g. data item payload).
    ValidationExceedsLimit,

    // -- NotFound --
    /// The named project does not exist.
    ProjectNotFound,
    /// The named agent is not registered in the project.
    AgentNotFound,
    /// The named data key has no stored item.
    DataItemNotFound,

    // -- FormatDetection --
    /// No parser recognised the published payload's format.
    FormatUnrecognized,
    /// The detected format's parser failed while reading the payload.
    FormatParseFailed,

    // -- Embedding --
    /// The embedding client did not respond within the configured timeout.
    EmbeddingTimeout,
    /// The embedding client returned an error.
    EmbeddingClientError,
    /// The embedding client returned a vector of unexpected dimensionality.
    EmbeddingDimensionMismatch,

    // -- Delivery --
    /// Webhook delivery failed with a terminal (4xx) response.
    DeliveryTerminal,
    /// Webhook delivery exhausted its retry budget on transient failures.
    DeliveryRetriesExhausted,
    /// An agent's delivery queue lagged and had its cursor reset.
    DeliveryLag,
    /// A catch-up request could not be satisfied from the full event ring.
    CatchupTruncated,

    // -- Config --
    /// Configuration file or value is invalid.
    ConfigInvalid,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationMissingField
            | Self::ValidationInvalidValue
            | Self::ValidationExceedsLimit => ErrorCategory::Validation,

            Self::ProjectNotFound | Self::AgentNotFound | Self::DataItemNotFound => {
                ErrorCategory::NotFound
            }

            Self::FormatUnrecognized | Self::FormatParseFailed => ErrorCategory::FormatDetection,

            Self::EmbeddingTimeout
            | Self::EmbeddingClientError
            | Self::EmbeddingDimensionMismatch => ErrorCategory::Embedding,

            Self::DeliveryTerminal
            | Self::DeliveryRetriesExhausted
            | Self::DeliveryLag
            | Self::CatchupTruncated => ErrorCategory::Delivery,

            Self::ConfigInvalid => ErrorCategory::Config,

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"PROJECT_NOT_FOUND"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationMissingField => "VALIDATION_MISSING_FIELD",
            Self::ValidationInvalidValue => "VALIDATION_INVALID_VALUE",
            Self::ValidationExceedsLimit => "VALIDATION_EXCEEDS_LIMIT",
            Self::ProjectNotFound => "PROJECT_NOT_FOUND",
            Self::AgentNotFound => "AGENT_NOT_FOUND",
            Self::DataItemNotFound => "DATA_ITEM_NOT_FOUND",
            Self::FormatUnrecognized => "FORMAT_UNRECOGNIZED",
            Self::FormatParseFailed => "FORMAT_PARSE_FAILED",
            Self::EmbeddingTimeout => "EMBEDDING_TIMEOUT",
            Self::EmbeddingClientError => "EMBEDDING_CLIENT_ERROR",
            Self::EmbeddingDimensionMismatch => "EMBEDDING_DIMENSION_MISMATCH",
            Self::DeliveryTerminal => "DELIVERY_TERMINAL",
            Self::DeliveryRetriesExhausted => "DELIVERY_RETRIES_EXHAUSTED",
            Self::DeliveryLag => "DELIVERY_LAG",
            Self::CatchupTruncated => "CATCHUP_TRUNCATED",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::Internal => "INTERNAL",
        }
    }

    /// The HTTP status code this error should be reported as, per the
    /// daemon's external API.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationMissingField
            | Self::ValidationInvalidValue
            | Self::ValidationExceedsLimit => 400,
            Self::ProjectNotFound | Self::AgentNotFound | Self::DataItemNotFound => 404,
            Self::FormatUnrecognized | Self::FormatParseFailed => 422,
            Self::EmbeddingTimeout
            | Self::EmbeddingClientError
            | Self::EmbeddingDimensionMismatch => 502,
            Self::DeliveryTerminal
            | Self::DeliveryRetriesExhausted
            | Self::DeliveryLag
            | Self::CatchupTruncated => 502,
            Self::ConfigInvalid | Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ContexError
// ---------------------------------------------------------------------------

/// Unified Contex error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use contex_error::{ContexError, ErrorCode};
///
/// let err = ContexError::new(ErrorCode::EmbeddingTimeout, "timed out after 30 s")
///     .with_context("project_id", "proj-1")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct ContexError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ContexError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.http_status()`.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Debug for ContexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ContexError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ContexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ContexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ContexError`] (without the opaque source),
/// suitable for the daemon's JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContexErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ContexError> for ContexErrorDto {
    fn from(err: &ContexError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ContexErrorDto> for ContexError {
    fn from(dto: ContexErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
