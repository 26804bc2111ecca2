// SPDX-License-Identifier: MIT OR Apache-2.0
//! Webhook sink: HMAC-signed `POST`, retried on transient failure.
//!
//! Retry shape mirrors the exponential backoff used elsewhere in this
//! workspace for outbound I/O: fixed delays rather than a formula, since
//! the spec pins exact values (1s, 4s, 16s) rather than a base/exponent pair.

use contex_error::{ContexError, ErrorCode};
use hex::encode as hex_encode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Per-attempt timeout for a webhook `POST`.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Backoff delays between retry attempts, in order. Three retries after
/// the initial attempt, for four attempts total.
pub const RETRY_DELAYS: [Duration; 3] =
    [Duration::from_secs(1), Duration::from_secs(4), Duration::from_secs(16)];

/// Compute the `X-Contex-Signature` header value for `body`, signed with
/// `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={}", hex_encode(mac.finalize().into_bytes()))
}

/// Whether `status` should be retried. 4xx is terminal; network errors and
/// 5xx are retryable.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    status >= 500
}

/// A signed webhook client. Constructed once and shared across agent
/// workers; `reqwest::Client` is internally connection-pooled and cheap to
/// clone.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl Default for WebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookClient {
    /// Build a client with the spec-mandated per-attempt timeout.
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .expect("reqwest client builder with static config cannot fail");
        Self { http }
    }

    /// Attempt a single signed `POST` of `body` to `url`. Returns the
    /// response status on a completed HTTP round-trip; a transport-level
    /// failure (DNS, connect, timeout) is surfaced as `Err`.
    async fn attempt(&self, url: &str, secret: &str, body: &[u8]) -> Result<u16, ContexError> {
        let signature = sign(secret, body);
        let response = self
            .http
            .post(url)
            .header("X-Contex-Signature", signature)
            .header("Content-Type", "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                ContexError::new(ErrorCode::DeliveryRetriesExhausted, format!("webhook request failed: {e}"))
                    .with_source(e)
            })?;
        Ok(response.status().as_u16())
    }

    /// Deliver `body` to `url`, signed with `secret`, retrying on network
    /// errors or HTTP `>= 500` per [`RETRY_DELAYS`]. A `4xx` response is
    /// terminal and returned immediately without retry.
    ///
    /// Returns `Ok(status)` for any response actually received (including
    /// a terminal 4xx — the caller inspects the status to decide whether
    /// this was a success); `Err` only once the retry budget for
    /// transport failures or 5xx responses is exhausted.
    pub async fn deliver(&self, url: &str, secret: &str, body: &[u8]) -> Result<u16, ContexError> {
        let mut last_err = None;
        for (attempt, delay) in std::iter::once(None).chain(RETRY_DELAYS.into_iter().map(Some)).enumerate() {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match self.attempt(url, secret, body).await {
                Ok(status) if status < 400 => return Ok(status),
                Ok(status) if !is_retryable_status(status) => return Ok(status),
                Ok(status) => {
                    tracing::warn!(target: "contex.delivery.webhook", attempt, status, "transient webhook failure, retrying");
                    last_err = Some(
                        ContexError::new(ErrorCode::DeliveryRetriesExhausted, format!("webhook returned {status}"))
                            .with_context("attempt", attempt)
                            .with_context("status", status),
                    );
                }
                Err(e) => {
                    tracing::warn!(target: "contex.delivery.webhook", attempt, error = %e, "webhook transport error, retrying");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ContexError::new(ErrorCode::DeliveryRetriesExhausted, "webhook retries exhausted")
        }))
    }
}
