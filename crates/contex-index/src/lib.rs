// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-index
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The per-project vector index (C4): `data_key -> (vector, payload, seq)`,
//! with exact top-k cosine search by brute-force scan.
//!
//! Brute force is the right call at the project sizes this spec targets
//! (≤ 10⁴ items, §4.4) — it is exact, requires no index maintenance, and a
//! single scan is cheap relative to the embedding call that produced the
//! query vector in the first place.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A single indexed entry: a vector, its opaque payload, and the sequence
/// number it was upserted under.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// The item's embedding vector.
    pub vector: Vec<f32>,
    /// Opaque payload returned alongside search/iteration results.
    pub payload: Value,
    /// Sequence number assigned at upsert time.
    pub seq: u64,
}

/// Cosine similarity between two vectors. Returns `0.0` if either vector has
/// zero magnitude (undefined cosine, treated as "no similarity" rather than
/// propagating `NaN`).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..n {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f32::EPSILON { 0.0 } else { dot / denom }
}

#[derive(Default)]
struct Shard {
    entries: BTreeMap<String, IndexEntry>,
}

/// A multi-project, in-memory vector index.
///
/// Each project is held behind its own lock so that publishes to different
/// projects never contend with one another (§5).
#[derive(Default)]
pub struct VectorIndex {
    projects: RwLock<BTreeMap<String, RwLock<Shard>>>,
}

impl VectorIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_shard<R>(&self, project: &str, f: impl FnOnce(&Shard) -> R) -> Option<R> {
        let projects = self.projects.read().unwrap();
        let shard = projects.get(project)?.read().unwrap();
        Some(f(&shard))
    }

    fn with_shard_mut<R>(&self, project: &str, f: impl FnOnce(&mut Shard) -> R) -> R {
        {
            let projects = self.projects.read().unwrap();
            if let Some(shard) = projects.get(project) {
                return f(&mut shard.write().unwrap());
            }
        }
        let mut projects = self.projects.write().unwrap();
        let shard = projects.entry(project.to_string()).or_default();
        f(&mut shard.write().unwrap())
    }

    /// Insert or replace the entry for `data_key` in `project`.
    pub fn upsert(&self, project: &str, data_key: &str, vector: Vec<f32>, payload: Value, seq: u64) {
        self.with_shard_mut(project, |shard| {
            shard.entries.insert(
                data_key.to_string(),
                IndexEntry { vector, payload, seq },
            );
        });
    }

    /// Fetch a single entry by key, if present.
    #[must_use]
    pub fn get(&self, project: &str, data_key: &str) -> Option<IndexEntry> {
        self.with_shard(project, |shard| shard.entries.get(data_key).cloned())
            .flatten()
    }

    /// Top-k cosine search against `query_vec`, sorted by descending
    /// similarity with ties broken by lexicographic `data_key` (spec §4.4).
    #[must_use]
    pub fn search(&self, project: &str, query_vec: &[f32], k: usize) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .with_shard(project, |shard| {
                shard
                    .entries
                    .iter()
                    .map(|(key, entry)| (key.clone(), cosine_similarity(query_vec, &entry.vector)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// All entries currently stored for `project`, as `(data_key, entry)`
    /// pairs in key order.
    #[must_use]
    pub fn all(&self, project: &str) -> Vec<(String, IndexEntry)> {
        self.with_shard(project, |shard| {
            shard
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Number of entries stored for `project`.
    #[must_use]
    pub fn len(&self, project: &str) -> usize {
        self.with_shard(project, |shard| shard.entries.len())
            .unwrap_or(0)
    }

    /// Whether `project` has no entries (including if it does not exist).
    #[must_use]
    pub fn is_empty(&self, project: &str) -> bool {
        self.len(project) == 0
    }

    /// Drop every entry for `project` (explicit project reset, §3).
    pub fn reset(&self, project: &str) {
        let mut projects = self.projects.write().unwrap();
        projects.remove(project);
    }
}
