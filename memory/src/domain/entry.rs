// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Memory Entry Aggregate
//!
//! Defines the core types of the discovery memory:
//!
//! - [`MemoryEntry`] — aggregate root for one stored discovery.
//! - [`MemoryEntryId`] — unique identifier (UUID newtype).
//! - [`MemoryKind`] — the closed set of entry categories.
//!
//! # Invariants
//!
//! - An entry is immutable once written except `importance`,
//!   `last_accessed_at`, and `links`, which change only through the
//!   store's single-writer path.
//! - `importance` stays in `[0, 1]`; reinforcement deltas are clamped.
//! - Protected entries (validated exploits) never evict.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Unique identifier for a [`MemoryEntry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryEntryId(pub Uuid);

impl MemoryEntryId {
    /// Generate a new random `MemoryEntryId`.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryEntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifier for a cluster formed during memory consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub Uuid);

impl ClusterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClusterId {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed set of memory categories.
///
/// `Semantic` entries are abstractions produced by the clustering pass;
/// the remaining kinds are written directly by the analysis stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// A concrete observation from one analysis run.
    Episodic,
    /// An abstraction over a cluster of related entries.
    Semantic,
    /// A pattern match or learned pattern.
    Pattern,
    /// An attack plan, successful or not.
    Plan,
}

/// One stored discovery with its embedding and importance weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: MemoryEntryId,
    pub kind: MemoryKind,
    /// Fixed-dimension embedding, L2-normalized at the store boundary.
    pub vector: Vec<f32>,
    /// Opaque discovery data owned by the writing stage.
    pub payload: serde_json::Value,
    /// Recall bias in `[0, 1]`; decays each maintenance cycle.
    pub importance: f64,
    /// Protected entries survive decay eviction (validated exploits).
    pub protected: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    /// Explicit association edges to related entries.
    pub links: HashSet<MemoryEntryId>,
}

impl MemoryEntry {
    pub fn new(kind: MemoryKind, vector: Vec<f32>, payload: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: MemoryEntryId::new(),
            kind,
            vector,
            payload,
            importance: 0.5,
            protected: false,
            created_at: now,
            last_accessed_at: now,
            links: HashSet::new(),
        }
    }

    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Apply one decay cycle. Returns true if the entry fell below the
    /// eviction floor and is not protected.
    pub fn decay(&mut self, factor: f64, eviction_floor: f64) -> bool {
        self.importance *= factor;
        !self.protected && self.importance < eviction_floor
    }

    /// Bounded reinforcement; the sole feedback mechanism.
    pub fn reinforce(&mut self, delta: f64) {
        self.importance = (self.importance + delta).clamp(0.0, 1.0);
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_multiplies_importance() {
        let mut entry =
            MemoryEntry::new(MemoryKind::Episodic, vec![1.0], serde_json::json!({}))
                .with_importance(0.8);
        assert!(!entry.decay(0.98, 0.05));
        assert!((entry.importance - 0.784).abs() < 1e-9);
    }

    #[test]
    fn protected_entry_never_signals_eviction() {
        let mut entry =
            MemoryEntry::new(MemoryKind::Pattern, vec![1.0], serde_json::json!({}))
                .with_importance(0.01)
                .protected();
        assert!(!entry.decay(0.5, 0.05));
    }

    #[test]
    fn reinforce_clamps_to_unit_interval() {
        let mut entry =
            MemoryEntry::new(MemoryKind::Plan, vec![1.0], serde_json::json!({}))
                .with_importance(0.9);
        entry.reinforce(0.5);
        assert_eq!(entry.importance, 1.0);
        entry.reinforce(-2.0);
        assert_eq!(entry.importance, 0.0);
    }
}
