// SPDX-License-Identifier: MIT OR Apache-2.0
//! Request validation for publish/register calls.
//!
//! Errors accumulate rather than short-circuit, matching §7 of the spec: a
//! caller should see every problem with a malformed request in one response.

use contex_error::{ContexError, ErrorCode};

/// Maximum length (bytes) allowed for a `data_key`.
pub const MAX_DATA_KEY_LENGTH: usize = 512;
/// Maximum number of `needs` an agent may register in one call.
pub const MAX_NEEDS_PER_AGENT: usize = 64;
/// Maximum length (chars) for a single `need` string.
pub const MAX_NEED_LENGTH: usize = 2_000;

/// Validate the fields of a publish request, accumulating every error found.
///
/// # Errors
///
/// Returns a non-empty `Vec<ContexError>` (each tagged
/// [`ErrorCode::ValidationMissingField`] or
/// [`ErrorCode::ValidationInvalidValue`]) when any field is invalid.
pub fn validate_publish(project_id: &str, data_key: &str) -> Result<(), Vec<ContexError>> {
    let mut errors = Vec::new();

    if project_id.trim().is_empty() {
        errors.push(
            ContexError::new(ErrorCode::ValidationMissingField, "project_id must not be empty")
                .with_context("field", "project_id"),
        );
    }

    if data_key.trim().is_empty() {
        errors.push(
            ContexError::new(ErrorCode::ValidationMissingField, "data_key must not be empty")
                .with_context("field", "data_key"),
        );
    } else if data_key.len() > MAX_DATA_KEY_LENGTH {
        errors.push(
            ContexError::new(
                ErrorCode::ValidationExceedsLimit,
                format!("data_key exceeds maximum length of {MAX_DATA_KEY_LENGTH} bytes"),
            )
            .with_context("field", "data_key"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the fields of a register request, accumulating every error found.
///
/// # Errors
///
/// Returns a non-empty `Vec<ContexError>` when `agent_id`, `project_id`, or
/// `needs` fail validation (empty id, no needs, too many needs, an
/// overlength or blank need, or an unrecognised notification method).
pub fn validate_register(
    agent_id: &str,
    project_id: &str,
    needs: &[String],
    notification_method: &str,
) -> Result<(), Vec<ContexError>> {
    let mut errors = Vec::new();

    if agent_id.trim().is_empty() {
        errors.push(
            ContexError::new(ErrorCode::ValidationMissingField, "agent_id must not be empty")
                .with_context("field", "agent_id"),
        );
    }

    if project_id.trim().is_empty() {
        errors.push(
            ContexError::new(ErrorCode::ValidationMissingField, "project_id must not be empty")
                .with_context("field", "project_id"),
        );
    }

    if needs.is_empty() {
        errors.push(
            ContexError::new(
                ErrorCode::ValidationMissingField,
                "data_needs must contain at least one need",
            )
            .with_context("field", "data_needs"),
        );
    } else if needs.len() > MAX_NEEDS_PER_AGENT {
        errors.push(
            ContexError::new(
                ErrorCode::ValidationExceedsLimit,
                format!("data_needs exceeds maximum of {MAX_NEEDS_PER_AGENT} entries"),
            )
            .with_context("field", "data_needs"),
        );
    }

    for (i, need) in needs.iter().enumerate() {
        if need.trim().is_empty() {
            errors.push(
                ContexError::new(
                    ErrorCode::ValidationInvalidValue,
                    format!("data_needs[{i}] must not be blank"),
                )
                .with_context("field", "data_needs")
                .with_context("index", i),
            );
        } else if need.len() > MAX_NEED_LENGTH {
            errors.push(
                ContexError::new(
                    ErrorCode::ValidationExceedsLimit,
                    format!("data_needs[{i}] exceeds maximum length of {MAX_NEED_LENGTH} chars"),
                )
                .with_context("field", "data_needs")
                .with_context("index", i),
            );
        }
    }

    if !matches!(notification_method, "redis" | "webhook") {
        errors.push(
            ContexError::new(
                ErrorCode::ValidationInvalidValue,
                format!("unknown notification_method: {notification_method}"),
            )
            .with_context("field", "notification_method"),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
