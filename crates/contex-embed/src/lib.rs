// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-embed
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The embedding client contract (C3): mapping a text string to a
//! fixed-dimensional, L2-normalizable vector.
//!
//! Contex treats embedding as opaque — this crate only promises a stable
//! dimension per client instance and determinism per model version. Two
//! implementations are provided: [`DeterministicEmbeddingClient`] (an
//! in-process, hash-based stand-in used by tests and local development) and
//! [`HttpEmbeddingClient`] (a thin `reqwest` wrapper around a remote
//! provider).

use async_trait::async_trait;
use contex_error::{ContexError, ErrorCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default embedding timeout (spec §5): 30 seconds.
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of internal retry attempts before an embedding failure is
/// surfaced to the caller (spec §7).
pub const EMBEDDING_RETRY_ATTEMPTS: u32 = 3;

/// Maps text to a fixed-dimensional embedding vector.
///
/// Implementations must be `Send + Sync` so a single client can be shared
/// across the per-project publish/register tasks.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// The dimensionality of vectors this client produces.
    fn dimension(&self) -> usize;

    /// Embed a single text string.
    ///
    /// # Errors
    ///
    /// Returns a [`ContexError`] tagged [`ErrorCode::EmbeddingTimeout`] or
    /// [`ErrorCode::EmbeddingClientError`] on failure, or
    /// [`ErrorCode::EmbeddingDimensionMismatch`] if the provider's response
    /// does not match [`Self::dimension`].
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ContexError>;

    /// Embed a batch of text strings.
    ///
    /// The default implementation calls [`Self::embed`] sequentially;
    /// implementations backed by a batch-capable provider should override
    /// this for efficiency.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ContexError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// ---------------------------------------------------------------------------
// DeterministicEmbeddingClient
// ---------------------------------------------------------------------------

/// An in-process, hash-based embedding client.
///
/// Deterministic per `(text, dimension)`: the same text always produces the
/// same vector, and semantically related strings (those sharing tokens) will
/// have nonzero cosine similarity because each token contributes to the same
/// coordinate regardless of position. This is a stand-in for a real semantic
/// embedding model — good enough for tests and local development, not a
/// substitute for the production provider.
#[derive(Debug, Clone)]
pub struct DeterministicEmbeddingClient {
    dimension: usize,
}

impl DeterministicEmbeddingClient {
    /// Create a client producing vectors of the given dimension.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn hash_token(token: &str, dim: usize) -> (usize, f32) {
        // FNV-1a, cheap and stable across platforms/process runs.
        let mut hash: u64 = 0xcbf29ce484222325;
        for b in token.bytes() {
            hash ^= u64::from(b);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        let idx = (hash as usize) % dim;
        let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension.max(1)];
        let lower = text.to_lowercase();
        for token in lower.split_whitespace() {
            let (idx, sign) = Self::hash_token(token, v.len());
            v[idx] += sign;
            // A char-trigram contribution on top of whole-token hashing so
            // near-duplicate words (e.g. "style"/"styles") share mass.
            let chars: Vec<char> = token.chars().collect();
            if chars.len() >= 3 {
                for w in chars.windows(3) {
                    let tri: String = w.iter().collect();
                    let (idx, sign) = Self::hash_token(&tri, v.len());
                    v[idx] += sign * 0.5;
                }
            }
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingClient for DeterministicEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ContexError> {
        Ok(self.embed_sync(text))
    }
}

// ---------------------------------------------------------------------------
// HttpEmbeddingClient
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Debug, Serialize)]
struct EmbedBatchRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedBatchResponse {
    embeddings: Vec<Vec<f32>>,
}

/// An `EmbeddingClient` backed by an HTTP POST to a remote embedding
/// provider. Retries up to [`EMBEDDING_RETRY_ATTEMPTS`] times on network
/// errors or `HTTP >= 500` before surfacing a
/// [`ErrorCode::EmbeddingClientError`].
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    endpoint: String,
    dimension: usize,
    timeout: Duration,
}

impl HttpEmbeddingClient {
    /// Build a new HTTP embedding client against `endpoint`, expecting
    /// `dimension`-sized vectors back, honoring `timeout` per request.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, dimension: usize, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            dimension,
            timeout,
        }
    }

    async fn post_with_retry<T, R>(&self, body: &T) -> Result<R, ContexError>
    where
        T: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self
                .client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .json(body)
                .send()
                .await;

            match outcome {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<R>().await.map_err(|e| {
                        ContexError::new(
                            ErrorCode::EmbeddingClientError,
                            "embedding provider returned malformed response",
                        )
                        .with_source(e)
                    });
                }
                Ok(resp) if resp.status().as_u16() >= 500 && attempt < EMBEDDING_RETRY_ATTEMPTS => {
                    continue;
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    return Err(ContexError::new(
                        ErrorCode::EmbeddingClientError,
                        format!("embedding provider returned HTTP {status}"),
                    )
                    .with_context("status", status));
                }
                Err(e) if e.is_timeout() => {
                    if attempt < EMBEDDING_RETRY_ATTEMPTS {
                        continue;
                    }
                    return Err(ContexError::new(
                        ErrorCode::EmbeddingTimeout,
                        format!("embedding call timed out after {attempt} attempts"),
                    )
                    .with_source(e));
                }
                Err(e) if attempt < EMBEDDING_RETRY_ATTEMPTS => continue,
                Err(e) => {
                    return Err(ContexError::new(
                        ErrorCode::EmbeddingClientError,
                        "embedding provider request failed",
                    )
                    .with_source(e));
                }
            }
        }
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ContexError> {
        let resp: EmbedResponse = self.post_with_retry(&EmbedRequest { input: text }).await?;
        if resp.embedding.len() != self.dimension {
            return Err(ContexError::new(
                ErrorCode::EmbeddingDimensionMismatch,
                format!(
                    "expected {}-dimensional vector, got {}",
                    self.dimension,
                    resp.embedding.len()
                ),
            ));
        }
        Ok(resp.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ContexError> {
        let resp: EmbedBatchResponse =
            self.post_with_retry(&EmbedBatchRequest { input: texts }).await?;
        if resp.embeddings.len() != texts.len() {
            return Err(ContexError::new(
                ErrorCode::EmbeddingClientError,
                format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    resp.embeddings.len()
                ),
            ));
        }
        for v in &resp.embeddings {
            if v.len() != self.dimension {
                return Err(ContexError::new(
                    ErrorCode::EmbeddingDimensionMismatch,
                    format!("expected {}-dimensional vector, got {}", self.dimension, v.len()),
                ));
            }
        }
        Ok(resp.embeddings)
    }
}
