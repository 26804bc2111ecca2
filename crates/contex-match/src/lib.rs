// SPDX-License-Identifier: MIT OR Apache-2.0
//! contex-match
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The subscription matcher (C5): for every `(project, agent, need)`
//! triple, maintains the set of data keys currently matching that need
//! above the similarity threshold τ, and recomputes this set incrementally
//! on every publish (spec §4.5).

use contex_index::cosine_similarity;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A single data key matching a need, with the similarity score and the
/// sequence number at which the match was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NeedMatch {
    /// The matching data key.
    pub data_key: String,
    /// Cosine similarity of the need's embedding to the item's vector.
    pub similarity: f32,
    /// Sequence number of the publish that produced this similarity value.
    pub seq: u64,
}

#[derive(Debug, Clone)]
struct MatchEntry {
    similarity: f32,
    seq: u64,
}

struct NeedState {
    need: String,
    vector: Vec<f32>,
    threshold: f32,
    matches: BTreeMap<String, MatchEntry>,
}

#[derive(Default)]
struct AgentState {
    needs: Vec<NeedState>,
}

#[derive(Default)]
struct ProjectState {
    agents: BTreeMap<String, AgentState>,
}

/// Snapshot of an agent's matches at register time, grouped by need text in
/// the order the needs were declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterSnapshot {
    /// `need -> matching data keys`, in declaration order.
    pub by_need: Vec<(String, Vec<NeedMatch>)>,
}

impl RegisterSnapshot {
    /// `need -> count of matching data keys`, for the `matched_needs`
    /// summary returned by the register HTTP endpoint.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<String, usize> {
        self.by_need
            .iter()
            .map(|(need, matches)| (need.clone(), matches.len()))
            .collect()
    }
}

/// The outcome of running one publish through an agent's needs: which
/// needs (if any) matched the published item, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishNotification {
    /// The agent that should be notified.
    pub agent_id: String,
    /// The needs (in declaration order) that matched this publish.
    pub matched_needs: Vec<String>,
    /// Similarity score for the first matching need (used for the
    /// notification payload's headline score).
    pub similarity: f32,
}

/// The multi-project subscription matcher.
#[derive(Default)]
pub struct SubscriptionMatcher {
    projects: RwLock<BTreeMap<String, RwLock<ProjectState>>>,
}

impl SubscriptionMatcher {
    /// Create an empty matcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_project_mut<R>(&self, project: &str, f: impl FnOnce(&mut ProjectState) -> R) -> R {
        {
            let projects = self.projects.read().unwrap();
            if let Some(state) = projects.get(project) {
                return f(&mut state.write().unwrap());
            }
        }
        let mut projects = self.projects.write().unwrap();
        let state = projects.entry(project.to_string()).or_default();
        f(&mut state.write().unwrap())
    }

    /// Register (or replace) `agent_id`'s needs for `project`.
    ///
    /// Each `(need, vector)` pair is matched against every item in
    /// `existing_items`; the returned [`RegisterSnapshot`] groups currently
    /// matching keys by need, in declaration order. A prior registration
    /// for the same `agent_id` is fully replaced (register idempotence,
    /// spec §8): re-registering with identical needs recomputes rather than
    /// merges, so the caller gets a fresh snapshot every time.
    pub fn register(
        &self,
        project: &str,
        agent_id: &str,
        needs: &[(String, Vec<f32>)],
        threshold: f32,
        existing_items: &[(String, Vec<f32>)],
    ) -> RegisterSnapshot {
        self.with_project_mut(project, |state| {
            let mut need_states: Vec<NeedState> = Vec::with_capacity(needs.len());
            let mut snapshot = RegisterSnapshot::default();

            for (need, vector) in needs {
                let mut matches = BTreeMap::new();
                let mut need_matches = Vec::new();
                for (key, item_vec) in existing_items {
                    let sim = cosine_similarity(vector, item_vec);
                    if sim >= threshold {
                        matches.insert(key.clone(), MatchEntry { similarity: sim, seq: 0 });
                        need_matches.push(NeedMatch {
                            data_key: key.clone(),
                            similarity: sim,
                            seq: 0,
                        });
                    }
                }
                need_matches.sort_by(|a, b| a.data_key.cmp(&b.data_key));
                snapshot.by_need.push((need.clone(), need_matches));
                need_states.push(NeedState {
                    need: need.clone(),
                    vector: vector.clone(),
                    threshold,
                    matches,
                });
            }

            state
                .agents
                .insert(agent_id.to_string(), AgentState { needs: need_states });
            snapshot
        })
    }

    /// Remove `agent_id`'s subscriptions from `project`.
    pub fn unregister(&self, project: &str, agent_id: &str) {
        self.with_project_mut(project, |state| {
            state.agents.remove(agent_id);
        });
    }

    /// Recompute matches for every registered agent in `project` against a
    /// freshly published `(data_key, vector)` at sequence `seq`.
    ///
    /// Returns at most one [`PublishNotification`] per agent (spec §4.5
    /// ordering rule), even when the item matches multiple of that agent's
    /// needs. An agent whose similarity drops below its need's threshold on
    /// this publish has its stale entry removed silently — no notification
    /// is emitted for a below-threshold result.
    pub fn on_publish(
        &self,
        project: &str,
        data_key: &str,
        vector: &[f32],
        seq: u64,
    ) -> Vec<PublishNotification> {
        self.with_project_mut(project, |state| {
            let mut notifications = Vec::new();
            for (agent_id, agent) in state.agents.iter_mut() {
                let mut matched_needs = Vec::new();
                let mut best_similarity = f32::MIN;
                for need in agent.needs.iter_mut() {
                    let sim = cosine_similarity(&need.vector, vector);
                    if sim >= need.threshold {
                        need.matches.insert(data_key.to_string(), MatchEntry { similarity: sim, seq });
                        matched_needs.push(need.need.clone());
                        if sim > best_similarity {
                            best_similarity = sim;
                        }
                    } else if need.matches.remove(data_key).is_some() {
                        // Dropped below threshold: removed silently (spec §4.5, §9c).
                    }
                }
                if !matched_needs.is_empty() {
                    notifications.push(PublishNotification {
                        agent_id: agent_id.clone(),
                        matched_needs,
                        similarity: best_similarity,
                    });
                }
            }
            notifications
        })
    }

    /// Current matches for `agent_id` in `project`, grouped by need in
    /// declaration order. Returns `None` if the agent is not registered.
    #[must_use]
    pub fn snapshot(&self, project: &str, agent_id: &str) -> Option<RegisterSnapshot> {
        self.with_project_mut(project, |state| {
            let agent = state.agents.get(agent_id)?;
            let mut snapshot = RegisterSnapshot::default();
            for need in &agent.needs {
                let mut matches: Vec<NeedMatch> = need
                    .matches
                    .iter()
                    .map(|(key, entry)| NeedMatch {
                        data_key: key.clone(),
                        similarity: entry.similarity,
                        seq: entry.seq,
                    })
                    .collect();
                matches.sort_by(|a, b| a.data_key.cmp(&b.data_key));
                snapshot.by_need.push((need.need.clone(), matches));
            }
            Some(snapshot)
        })
    }

    /// Number of agents registered in `project`.
    #[must_use]
    pub fn agent_count(&self, project: &str) -> usize {
        let projects = self.projects.read().unwrap();
        projects.get(project).map_or(0, |s| s.read().unwrap().agents.len())
    }

    /// Drop every agent's subscriptions for `project` (explicit project
    /// reset).
    pub fn reset(&self, project: &str) {
        let mut projects = self.projects.write().unwrap();
        projects.remove(project);
    }
}
