// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the discovery memory bounded context.
//! Published to the EventBus for observability and lineage auditing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entry::{ClusterId, MemoryEntryId, MemoryKind};

/// Memory domain events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryEvent {
    /// A new entry was written through the single-writer path.
    EntryStored {
        entry_id: MemoryEntryId,
        kind: MemoryKind,
        importance: f64,
        timestamp: DateTime<Utc>,
    },

    /// An entry's importance was reinforced after contributing to a
    /// successful decision.
    EntryReinforced {
        entry_id: MemoryEntryId,
        old_importance: f64,
        new_importance: f64,
        timestamp: DateTime<Utc>,
    },

    /// An entry decayed below the eviction floor and was removed.
    EntryEvicted {
        entry_id: MemoryEntryId,
        final_importance: f64,
        timestamp: DateTime<Utc>,
    },

    /// The clustering pass formed or extended a cluster and stored its
    /// semantic abstraction entry.
    ClusterFormed {
        cluster_id: ClusterId,
        abstraction_id: MemoryEntryId,
        member_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The vector index was rebuilt from the append-only log after an
    /// inconsistency was detected.
    IndexRebuilt {
        entries_recovered: usize,
        timestamp: DateTime<Utc>,
    },
}

impl MemoryEvent {
    /// Event type discriminant for logging and metrics.
    pub fn event_type(&self) -> &'static str {
        match self {
            MemoryEvent::EntryStored { .. } => "entry_stored",
            MemoryEvent::EntryReinforced { .. } => "entry_reinforced",
            MemoryEvent::EntryEvicted { .. } => "entry_evicted",
            MemoryEvent::ClusterFormed { .. } => "cluster_formed",
            MemoryEvent::IndexRebuilt { .. } => "index_rebuilt",
        }
    }
}
