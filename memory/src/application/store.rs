// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Memory Store — Discovery Storage & Recall
//!
//! Application service implementing the Argus learning loop: every
//! discovery, plan, and validated outcome is stored as a [`MemoryEntry`]
//! and recalled by similarity at the start of future analysis stages.
//!
//! ## Concurrency discipline
//!
//! Single writer, multiple readers. All mutation goes through the write
//! half of one `RwLock`, so a concurrent `recall` observes either the
//! pre- or post-write state of any entry, never a half-written one.
//! Maintenance (decay, clustering) runs on its own cadence and takes the
//! same writer path, so it never interleaves with an in-flight write.
//!
//! ## Reinforcement
//!
//! `reinforce` is the sole feedback mechanism: a bounded importance
//! delta applied when an entry contributed to a later successful
//! decision, clamped to `[0, 1]`. Decay pulls everything else back down
//! each maintenance cycle and evicts below the floor, except protected
//! entries (validated exploits).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{
    ClusterId, MemoryEntry, MemoryEntryId, MemoryError, MemoryEvent, MemoryKind,
};
use crate::infrastructure::index::VectorIndex;

/// Event bus trait for publishing memory domain events.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: MemoryEvent) -> anyhow::Result<()>;
}

/// Event bus that drops everything; default wiring for embedded use.
pub struct NullEventBus;

#[async_trait]
impl EventBus for NullEventBus {
    async fn publish(&self, _event: MemoryEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Tuning knobs for decay, eviction, and clustering.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Embedding dimension accepted by the store.
    pub dim: usize,
    /// Multiplier applied to every unprotected entry's importance per
    /// maintenance cycle.
    pub decay_factor: f64,
    /// Entries decaying below this importance are evicted.
    pub eviction_floor: f64,
    /// Minimum centroid similarity for an entry to join a cluster.
    pub cluster_threshold: f64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            dim: crate::infrastructure::EMBEDDING_DIM,
            decay_factor: 0.98,
            eviction_floor: 0.05,
            cluster_threshold: 0.80,
        }
    }
}

/// Memory store contract shared by every analysis stage.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Write one entry through the single-writer path.
    async fn put(&self, entry: MemoryEntry) -> Result<MemoryEntryId, MemoryError>;

    /// Similarity search: at most `k` entries ordered by non-increasing
    /// similarity, ties broken by most-recent access. Recall counts as
    /// an access and refreshes `last_accessed_at`.
    async fn recall(
        &self,
        query: &[f32],
        k: usize,
        kind_filter: Option<MemoryKind>,
    ) -> Result<Vec<(MemoryEntry, f64)>, MemoryError>;

    /// Bounded importance feedback, clamped to `[0, 1]`.
    async fn reinforce(&self, id: MemoryEntryId, delta: f64) -> Result<(), MemoryError>;

    /// One decay cycle. Returns the number of evicted entries.
    async fn decay_tick(&self) -> Result<usize, MemoryError>;

    /// Incremental threshold-merge clustering; each formed cluster is
    /// stored as a `Semantic` abstraction entry. Returns the full
    /// cluster → members mapping.
    async fn cluster(&self) -> Result<HashMap<ClusterId, HashSet<MemoryEntryId>>, MemoryError>;

    /// Record a bidirectional association edge between two entries.
    async fn link(&self, a: MemoryEntryId, b: MemoryEntryId) -> Result<(), MemoryError>;

    /// Fetch a single entry by id.
    async fn get(&self, id: MemoryEntryId) -> Result<Option<MemoryEntry>, MemoryError>;
}

struct ClusterState {
    centroid: Vec<f32>,
    members: HashSet<MemoryEntryId>,
    abstraction_id: Option<MemoryEntryId>,
    /// Creation order, used to break similarity ties deterministically.
    seq: usize,
}

impl ClusterState {
    /// Incremental centroid update on membership growth.
    fn add_member(&mut self, id: MemoryEntryId, vector: &[f32]) {
        self.members.insert(id);
        let n = self.members.len() as f32;
        for (c, v) in self.centroid.iter_mut().zip(vector) {
            *c = ((n - 1.0) * *c + v) / n;
        }
    }
}

struct StoreState {
    index: VectorIndex,
    clusters: HashMap<ClusterId, ClusterState>,
    /// Entries already assigned to some cluster.
    clustered: HashSet<MemoryEntryId>,
    next_cluster_seq: usize,
}

/// In-process implementation of [`MemoryStore`].
pub struct InMemoryMemoryStore {
    state: RwLock<StoreState>,
    event_bus: Arc<dyn EventBus>,
    config: MemoryStoreConfig,
}

impl InMemoryMemoryStore {
    pub fn new(config: MemoryStoreConfig, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            state: RwLock::new(StoreState {
                index: VectorIndex::new(config.dim),
                clusters: HashMap::new(),
                clustered: HashSet::new(),
                next_cluster_seq: 0,
            }),
            event_bus,
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(MemoryStoreConfig::default(), Arc::new(NullEventBus))
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.index.len()
    }

    /// Verify index consistency, rebuilding from the append-only log if
    /// needed. A log that cannot rebuild is surfaced as fatal.
    async fn verify_or_rebuild(&self, state: &mut StoreState) -> Result<(), MemoryError> {
        if let Err(err) = state.index.verify() {
            warn!(error = %err, "memory index inconsistent, rebuilding from log");
            let recovered = state.index.rebuild_from_log()?;
            self.event_bus
                .publish(MemoryEvent::IndexRebuilt {
                    entries_recovered: recovered,
                    timestamp: Utc::now(),
                })
                .await
                .ok();
            info!(recovered, "memory index rebuilt from log");
        }
        Ok(())
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn put(&self, entry: MemoryEntry) -> Result<MemoryEntryId, MemoryError> {
        let kind = entry.kind;
        let importance = entry.importance;
        let mut state = self.state.write().await;
        let id = state.index.insert(entry)?;
        drop(state);

        self.event_bus
            .publish(MemoryEvent::EntryStored {
                entry_id: id,
                kind,
                importance,
                timestamp: Utc::now(),
            })
            .await
            .ok();
        Ok(id)
    }

    async fn recall(
        &self,
        query: &[f32],
        k: usize,
        kind_filter: Option<MemoryKind>,
    ) -> Result<Vec<(MemoryEntry, f64)>, MemoryError> {
        // Read phase against a consistent snapshot. The kind filter is
        // applied inside the index scan, so a filtered recall returns k
        // hits whenever the store holds that many of the kind.
        let hits = {
            let state = self.state.read().await;
            let scored = state.index.search(query, k, kind_filter)?;
            scored
                .into_iter()
                .filter_map(|(id, similarity)| {
                    let entry = state.index.get(id)?;
                    Some((entry.clone(), similarity))
                })
                .collect::<Vec<_>>()
        };

        // Access touch goes through the writer path.
        if !hits.is_empty() {
            let mut state = self.state.write().await;
            for (entry, _) in &hits {
                if let Some(live) = state.index.get_mut(entry.id) {
                    live.touch();
                }
            }
        }
        Ok(hits)
    }

    async fn reinforce(&self, id: MemoryEntryId, delta: f64) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        let entry = state.index.get_mut(id).ok_or(MemoryError::NotFound(id))?;
        let old_importance = entry.importance;
        entry.reinforce(delta);
        let new_importance = entry.importance;
        state.index.log_current_state(id);
        drop(state);

        self.event_bus
            .publish(MemoryEvent::EntryReinforced {
                entry_id: id,
                old_importance,
                new_importance,
                timestamp: Utc::now(),
            })
            .await
            .ok();
        Ok(())
    }

    async fn decay_tick(&self) -> Result<usize, MemoryError> {
        let mut state = self.state.write().await;
        self.verify_or_rebuild(&mut state).await?;

        let mut evicted = Vec::new();
        let ids: Vec<MemoryEntryId> = state.index.iter().map(|e| e.id).collect();
        for id in ids {
            if let Some(entry) = state.index.get_mut(id) {
                if entry.decay(self.config.decay_factor, self.config.eviction_floor) {
                    evicted.push((id, entry.importance));
                }
            }
        }
        for (id, _) in &evicted {
            state.index.remove(*id);
            state.clustered.remove(id);
            for cluster in state.clusters.values_mut() {
                cluster.members.remove(id);
            }
        }
        drop(state);

        for (id, final_importance) in &evicted {
            self.event_bus
                .publish(MemoryEvent::EntryEvicted {
                    entry_id: *id,
                    final_importance: *final_importance,
                    timestamp: Utc::now(),
                })
                .await
                .ok();
        }
        debug!(evicted = evicted.len(), "decay tick complete");
        Ok(evicted.len())
    }

    async fn cluster(&self) -> Result<HashMap<ClusterId, HashSet<MemoryEntryId>>, MemoryError> {
        let mut state = self.state.write().await;

        // Unassigned entries in creation order, so repeated passes over
        // the same store produce the same clusters. Semantic abstraction
        // entries never cluster themselves.
        let mut unassigned: Vec<(MemoryEntryId, Vec<f32>, chrono::DateTime<Utc>)> = state
            .index
            .iter()
            .filter(|e| e.kind != MemoryKind::Semantic && !state.clustered.contains(&e.id))
            .map(|e| (e.id, e.vector.clone(), e.created_at))
            .collect();
        unassigned.sort_by_key(|(id, _, created_at)| (*created_at, id.0));

        let mut touched: Vec<ClusterId> = Vec::new();
        for (id, vector, _) in unassigned {
            // Equally-near centroids resolve to the oldest cluster, not
            // whatever the map's iteration order happens to yield.
            let best = state
                .clusters
                .iter()
                .map(|(cid, cluster)| (*cid, cluster.seq, cosine(&vector, &cluster.centroid)))
                .max_by(|a, b| {
                    a.2.partial_cmp(&b.2)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.1.cmp(&a.1))
                });

            match best {
                Some((cid, _, similarity)) if similarity >= self.config.cluster_threshold => {
                    if let Some(cluster) = state.clusters.get_mut(&cid) {
                        cluster.add_member(id, &vector);
                    }
                    touched.push(cid);
                }
                _ => {
                    let cid = ClusterId::new();
                    let mut members = HashSet::new();
                    members.insert(id);
                    let seq = state.next_cluster_seq;
                    state.next_cluster_seq += 1;
                    state.clusters.insert(
                        cid,
                        ClusterState {
                            centroid: vector,
                            members,
                            abstraction_id: None,
                            seq,
                        },
                    );
                    touched.push(cid);
                }
            }
            state.clustered.insert(id);
        }

        // Clusters of two or more become semantic abstraction entries.
        let mut formed = Vec::new();
        for cid in touched {
            let (centroid, members, has_abstraction) = match state.clusters.get(&cid) {
                Some(c) if c.members.len() >= 2 => {
                    (c.centroid.clone(), c.members.clone(), c.abstraction_id)
                }
                _ => continue,
            };
            let payload = serde_json::json!({
                "cluster_id": cid.0,
                "member_count": members.len(),
            });
            match has_abstraction {
                Some(abstraction_id) => {
                    if let Some(entry) = state.index.get_mut(abstraction_id) {
                        entry.links = members.clone();
                        entry.payload = payload;
                    }
                }
                None => {
                    let mut entry =
                        MemoryEntry::new(MemoryKind::Semantic, centroid, payload)
                            .with_importance(0.7);
                    entry.links = members.clone();
                    let abstraction_id = state.index.insert(entry)?;
                    if let Some(cluster) = state.clusters.get_mut(&cid) {
                        cluster.abstraction_id = Some(abstraction_id);
                    }
                    formed.push((cid, abstraction_id, members.len()));
                }
            }
        }

        let mapping: HashMap<ClusterId, HashSet<MemoryEntryId>> = state
            .clusters
            .iter()
            .map(|(cid, cluster)| (*cid, cluster.members.clone()))
            .collect();
        drop(state);

        for (cluster_id, abstraction_id, member_count) in formed {
            self.event_bus
                .publish(MemoryEvent::ClusterFormed {
                    cluster_id,
                    abstraction_id,
                    member_count,
                    timestamp: Utc::now(),
                })
                .await
                .ok();
        }
        Ok(mapping)
    }

    async fn link(&self, a: MemoryEntryId, b: MemoryEntryId) -> Result<(), MemoryError> {
        let mut state = self.state.write().await;
        if state.index.get(a).is_none() {
            return Err(MemoryError::NotFound(a));
        }
        if state.index.get(b).is_none() {
            return Err(MemoryError::NotFound(b));
        }
        if let Some(entry) = state.index.get_mut(a) {
            entry.links.insert(b);
        }
        if let Some(entry) = state.index.get_mut(b) {
            entry.links.insert(a);
        }
        Ok(())
    }

    async fn get(&self, id: MemoryEntryId) -> Result<Option<MemoryEntry>, MemoryError> {
        Ok(self.state.read().await.index.get(id).cloned())
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let na: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let nb: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if na > 0.0 && nb > 0.0 {
        dot / (na * nb)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingEventBus {
        events: Mutex<Vec<MemoryEvent>>,
    }

    impl RecordingEventBus {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn event_types(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type())
                .collect()
        }
    }

    #[async_trait]
    impl EventBus for RecordingEventBus {
        async fn publish(&self, event: MemoryEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn store_with_dim(dim: usize) -> InMemoryMemoryStore {
        InMemoryMemoryStore::new(
            MemoryStoreConfig {
                dim,
                ..MemoryStoreConfig::default()
            },
            Arc::new(NullEventBus),
        )
    }

    fn entry(dim_vector: Vec<f32>, kind: MemoryKind) -> MemoryEntry {
        MemoryEntry::new(kind, dim_vector, serde_json::json!({"note": "test"}))
    }

    #[tokio::test]
    async fn recall_returns_at_most_k_in_similarity_order() {
        let store = store_with_dim(3);
        store.put(entry(vec![1.0, 0.0, 0.0], MemoryKind::Episodic)).await.unwrap();
        store.put(entry(vec![0.8, 0.6, 0.0], MemoryKind::Episodic)).await.unwrap();
        store.put(entry(vec![0.0, 1.0, 0.0], MemoryKind::Episodic)).await.unwrap();
        store.put(entry(vec![0.0, 0.0, 1.0], MemoryKind::Episodic)).await.unwrap();

        let hits = store.recall(&[1.0, 0.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].1 >= hits[1].1);
    }

    #[tokio::test]
    async fn recall_honors_kind_filter() {
        let store = store_with_dim(2);
        store.put(entry(vec![1.0, 0.0], MemoryKind::Pattern)).await.unwrap();
        store.put(entry(vec![1.0, 0.1], MemoryKind::Plan)).await.unwrap();

        let hits = store
            .recall(&[1.0, 0.0], 5, Some(MemoryKind::Plan))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0.kind, MemoryKind::Plan);
    }

    #[tokio::test]
    async fn kind_filtered_recall_is_not_starved_by_closer_entries() {
        // Many episodic entries sit closer to the query than any plan.
        // A filtered recall must still return every stored plan up to k,
        // not just whatever survives a truncated unfiltered scan.
        let store = store_with_dim(3);
        for i in 0..9 {
            store
                .put(entry(
                    vec![1.0, 0.001 * i as f32, 0.0],
                    MemoryKind::Episodic,
                ))
                .await
                .unwrap();
        }
        store.put(entry(vec![0.2, 0.9, 0.0], MemoryKind::Plan)).await.unwrap();
        store.put(entry(vec![0.1, 0.0, 0.9], MemoryKind::Plan)).await.unwrap();

        let hits = store
            .recall(&[1.0, 0.0, 0.0], 2, Some(MemoryKind::Plan))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|(e, _)| e.kind == MemoryKind::Plan));
    }

    #[tokio::test]
    async fn decay_follows_geometric_formula_and_respects_protection() {
        let store = InMemoryMemoryStore::new(
            MemoryStoreConfig {
                dim: 2,
                decay_factor: 0.5,
                eviction_floor: 0.2,
                ..MemoryStoreConfig::default()
            },
            Arc::new(NullEventBus),
        );
        let plain = store
            .put(entry(vec![1.0, 0.0], MemoryKind::Episodic).with_importance(0.8))
            .await
            .unwrap();
        let shielded = store
            .put(
                entry(vec![0.0, 1.0], MemoryKind::Plan)
                    .with_importance(0.8)
                    .protected(),
            )
            .await
            .unwrap();

        // 0.8 -> 0.4 -> 0.2 -> 0.1 (< floor, evicted on third tick)
        assert_eq!(store.decay_tick().await.unwrap(), 0);
        let after_one = store.get(plain).await.unwrap().unwrap();
        assert!((after_one.importance - 0.4).abs() < 1e-9);

        assert_eq!(store.decay_tick().await.unwrap(), 0);
        assert_eq!(store.decay_tick().await.unwrap(), 1);

        assert!(store.get(plain).await.unwrap().is_none());
        assert!(store.get(shielded).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reinforce_is_clamped_and_published() {
        let bus = Arc::new(RecordingEventBus::new());
        let store = InMemoryMemoryStore::new(
            MemoryStoreConfig {
                dim: 2,
                ..MemoryStoreConfig::default()
            },
            bus.clone(),
        );
        let id = store
            .put(entry(vec![1.0, 0.0], MemoryKind::Pattern).with_importance(0.9))
            .await
            .unwrap();
        store.reinforce(id, 0.5).await.unwrap();

        assert_eq!(store.get(id).await.unwrap().unwrap().importance, 1.0);
        assert_eq!(bus.event_types(), vec!["entry_stored", "entry_reinforced"]);
    }

    #[tokio::test]
    async fn reinforce_unknown_entry_fails() {
        let store = store_with_dim(2);
        let err = store.reinforce(MemoryEntryId::new(), 0.1).await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }

    #[tokio::test]
    async fn clustering_merges_similar_entries_into_semantic_abstraction() {
        let bus = Arc::new(RecordingEventBus::new());
        let store = InMemoryMemoryStore::new(
            MemoryStoreConfig {
                dim: 3,
                cluster_threshold: 0.8,
                ..MemoryStoreConfig::default()
            },
            bus.clone(),
        );
        store.put(entry(vec![1.0, 0.0, 0.0], MemoryKind::Episodic)).await.unwrap();
        store.put(entry(vec![0.98, 0.05, 0.0], MemoryKind::Episodic)).await.unwrap();
        store.put(entry(vec![0.0, 0.0, 1.0], MemoryKind::Episodic)).await.unwrap();

        let clusters = store.cluster().await.unwrap();
        let sizes: Vec<usize> = {
            let mut s: Vec<usize> = clusters.values().map(|m| m.len()).collect();
            s.sort();
            s
        };
        assert_eq!(sizes, vec![1, 2]);
        assert!(bus.event_types().contains(&"cluster_formed"));

        // The abstraction is recallable as a Semantic entry.
        let semantic = store
            .recall(&[1.0, 0.0, 0.0], 5, Some(MemoryKind::Semantic))
            .await
            .unwrap();
        assert_eq!(semantic.len(), 1);
        assert_eq!(semantic[0].0.links.len(), 2);
    }

    #[tokio::test]
    async fn equidistant_entry_joins_the_oldest_cluster() {
        // [1,1,0,0] is exactly as close to the [1,0,0,0] cluster as to
        // the [0,1,0,0] one (cosine ~0.707 each). The assignment must
        // not depend on map iteration order, so every store built the
        // same way puts it in the first-created cluster.
        for _ in 0..4 {
            let store = InMemoryMemoryStore::new(
                MemoryStoreConfig {
                    dim: 4,
                    cluster_threshold: 0.7,
                    ..MemoryStoreConfig::default()
                },
                Arc::new(NullEventBus),
            );
            let first = store
                .put(entry(vec![1.0, 0.0, 0.0, 0.0], MemoryKind::Episodic))
                .await
                .unwrap();
            store
                .put(entry(vec![0.0, 1.0, 0.0, 0.0], MemoryKind::Episodic))
                .await
                .unwrap();
            let tied = store
                .put(entry(vec![1.0, 1.0, 0.0, 0.0], MemoryKind::Episodic))
                .await
                .unwrap();

            let clusters = store.cluster().await.unwrap();
            let home = clusters
                .values()
                .find(|members| members.contains(&first))
                .expect("first entry clustered");
            assert!(home.contains(&tied));
        }
    }

    #[tokio::test]
    async fn link_is_bidirectional() {
        let store = store_with_dim(2);
        let a = store.put(entry(vec![1.0, 0.0], MemoryKind::Plan)).await.unwrap();
        let b = store.put(entry(vec![0.0, 1.0], MemoryKind::Pattern)).await.unwrap();
        store.link(a, b).await.unwrap();

        assert!(store.get(a).await.unwrap().unwrap().links.contains(&b));
        assert!(store.get(b).await.unwrap().unwrap().links.contains(&a));
    }

    #[tokio::test]
    async fn concurrent_writes_never_expose_partial_entries() {
        let store = Arc::new(store_with_dim(4));

        let writer_a = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let payload = serde_json::json!({"writer": "a", "seq": i});
                    let e = MemoryEntry::new(
                        MemoryKind::Episodic,
                        vec![1.0, 0.0, 0.0, i as f32 / 100.0],
                        payload,
                    );
                    store.put(e).await.unwrap();
                }
            })
        };
        let writer_b = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    let payload = serde_json::json!({"writer": "b", "seq": i});
                    let e = MemoryEntry::new(
                        MemoryKind::Episodic,
                        vec![0.0, 1.0, 0.0, i as f32 / 100.0],
                        payload,
                    );
                    store.put(e).await.unwrap();
                }
            })
        };
        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let hits = store.recall(&[0.5, 0.5, 0.0, 0.0], 10, None).await.unwrap();
                    for (entry, _) in hits {
                        // Every observed entry is fully formed.
                        assert_eq!(entry.vector.len(), 4);
                        assert!(entry.payload.get("writer").is_some());
                        assert!(entry.payload.get("seq").is_some());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer_a.await.unwrap();
        writer_b.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.len().await, 100);
    }
}
