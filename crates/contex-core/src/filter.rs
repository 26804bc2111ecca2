// SPDX-License-Identifier: MIT OR Apache-2.0
//! Event filtering for [`Event`] streams.
//!
//! Supports include-list and exclude-list modes, matching against the serde
//! tag of [`EventKind`] variants (e.g. `"data_published"`, `"matched"`).
//! Matching is case-insensitive.

use crate::{Event, EventKind};

/// Configurable filter for [`Event`]s by their [`EventKind`] tag.
#[derive(Debug, Clone)]
pub struct EventFilter {
    mode: FilterMode,
    /// Stored in lowercase for case-insensitive comparison.
    kinds: Vec<String>,
}

#[derive(Debug, Clone)]
enum FilterMode {
    Include,
    Exclude,
}

impl EventFilter {
    /// Create a filter that only passes events whose kind tag is in `kinds`.
    ///
    /// An empty list means nothing passes.
    ///
    /// # Examples
    ///
    /// ```
    /// use contex_core::filter::EventFilter;
    /// use contex_core::{Event, EventKind};
    /// use chrono::Utc;
    ///
    /// let filter = EventFilter::include_kinds(&["matched"]);
    ///
    /// let matched = Event {
    ///     project_id: "p".into(),
    ///     seq: 1,
    ///     ts: Utc::now(),
    ///     kind: EventKind::Matched { agent_id: "a".into(), key: "k".into(), score: 0.9 },
    /// };
    /// assert!(filter.matches(&matched));
    ///
    /// let published = Event {
    ///     project_id: "p".into(),
    ///     seq: 2,
    ///     ts: Utc::now(),
    ///     kind: EventKind::DataPublished { key: "k".into() },
    /// };
    /// assert!(!filter.matches(&published));
    /// ```
    #[must_use]
    pub fn include_kinds(kinds: &[&str]) -> Self {
        Self {
            mode: FilterMode::Include,
            kinds: kinds.iter().map(|k| k.to_ascii_lowercase()).collect(),
        }
    }

    /// Create a filter that passes everything *except* events whose kind tag
    /// is in `kinds`.
    ///
    /// An empty list means everything passes.
    #[must_use]
    pub fn exclude_kinds(kinds: &[&str]) -> Self {
        Self {
            mode: FilterMode::Exclude,
            kinds: kinds.iter().map(|k| k.to_ascii_lowercase()).collect(),
        }
    }

    /// Returns `true` if `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        let name = event.kind.tag();
        let in_set = self.kinds.iter().any(|k| k == name);
        match self.mode {
            FilterMode::Include => in_set,
            FilterMode::Exclude => !in_set,
        }
    }

    /// Filter a slice of events, preserving order.
    #[must_use]
    pub fn apply<'a>(&self, events: &'a [Event]) -> Vec<&'a Event> {
        events.iter().filter(|e| self.matches(e)).collect()
    }
}
