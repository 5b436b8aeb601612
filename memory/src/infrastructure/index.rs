// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Vector Index
//!
//! Brute-force inner-product index over L2-normalized embeddings, backed
//! by an append-only entry log. The log is the source of truth: if the
//! id map and the log disagree, the index is rebuilt from the log rather
//! than ever serving a partially indexed view.

use std::collections::{HashMap, HashSet};

use crate::domain::{MemoryEntry, MemoryEntryId, MemoryError, MemoryKind};

/// In-process vector index with append-only log recovery.
///
/// Not thread-safe on its own; the owning store serializes writes.
pub struct VectorIndex {
    dim: usize,
    /// Append-only record of every entry ever written, including evicted
    /// ones (marked by a tombstone in `live`). Rebuild source of truth.
    log: Vec<MemoryEntry>,
    /// Live entries by id, pointing at their latest state.
    live: HashMap<MemoryEntryId, MemoryEntry>,
    /// Ids evicted after being logged; rebuild must not resurrect them.
    tombstones: HashSet<MemoryEntryId>,
    /// Flat id map, one slot per live vector, scanned on search.
    id_map: Vec<MemoryEntryId>,
}

impl VectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            log: Vec::new(),
            live: HashMap::new(),
            tombstones: HashSet::new(),
            id_map: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Insert an entry, normalizing its vector. Rejects dimension
    /// mismatches instead of truncating.
    pub fn insert(&mut self, mut entry: MemoryEntry) -> Result<MemoryEntryId, MemoryError> {
        if entry.vector.len() != self.dim {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dim,
                got: entry.vector.len(),
            });
        }
        normalize(&mut entry.vector);
        let id = entry.id;
        self.log.push(entry.clone());
        self.live.insert(id, entry);
        self.id_map.push(id);
        Ok(id)
    }

    pub fn get(&self, id: MemoryEntryId) -> Option<&MemoryEntry> {
        self.live.get(&id)
    }

    pub fn get_mut(&mut self, id: MemoryEntryId) -> Option<&mut MemoryEntry> {
        self.live.get_mut(&id)
    }

    pub fn remove(&mut self, id: MemoryEntryId) -> Option<MemoryEntry> {
        let removed = self.live.remove(&id);
        if removed.is_some() {
            self.tombstones.insert(id);
            self.id_map.retain(|slot| *slot != id);
        }
        removed
    }

    /// Append the entry's current state to the log so a later rebuild
    /// restores it rather than the insert-time snapshot.
    pub fn log_current_state(&mut self, id: MemoryEntryId) {
        if let Some(entry) = self.live.get(&id) {
            self.log.push(entry.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.live.values()
    }

    /// Nearest neighbours by inner product (cosine, since vectors are
    /// normalized). Ties broken by most-recent `last_accessed_at`. A
    /// kind filter restricts the scan itself, so `k` hits of that kind
    /// come back whenever the index holds that many.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        kind: Option<MemoryKind>,
    ) -> Result<Vec<(MemoryEntryId, f64)>, MemoryError> {
        if query.len() != self.dim {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dim,
                got: query.len(),
            });
        }
        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<(MemoryEntryId, f64)> = self
            .id_map
            .iter()
            .filter_map(|id| {
                let entry = self.live.get(id)?;
                if kind.is_some_and(|kind| entry.kind != kind) {
                    return None;
                }
                Some((*id, inner_product(&query, &entry.vector)))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ta = self.live.get(&a.0).map(|e| e.last_accessed_at);
                    let tb = self.live.get(&b.0).map(|e| e.last_accessed_at);
                    tb.cmp(&ta)
                })
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Check index/store consistency. Every id map slot must resolve to a
    /// live entry with a vector of the right dimension.
    pub fn verify(&self) -> Result<(), MemoryError> {
        if self.id_map.len() != self.live.len() {
            return Err(MemoryError::Corruption(format!(
                "id map has {} slots but {} live entries",
                self.id_map.len(),
                self.live.len()
            )));
        }
        for id in &self.id_map {
            match self.live.get(id) {
                Some(entry) if entry.vector.len() == self.dim => {}
                Some(entry) => {
                    return Err(MemoryError::Corruption(format!(
                        "entry {:?} has vector of dimension {}",
                        id,
                        entry.vector.len()
                    )))
                }
                None => {
                    return Err(MemoryError::Corruption(format!(
                        "id map references missing entry {:?}",
                        id
                    )))
                }
            }
        }
        Ok(())
    }

    /// Rebuild the id map and live set from the append-only log.
    ///
    /// Later log records win (the log may contain superseded states), and
    /// entries with malformed vectors are treated as fatal: a log that
    /// cannot reconstruct a consistent index is unrecoverable.
    pub fn rebuild_from_log(&mut self) -> Result<usize, MemoryError> {
        let mut rebuilt: HashMap<MemoryEntryId, MemoryEntry> = HashMap::new();
        for entry in &self.log {
            if self.tombstones.contains(&entry.id) {
                continue;
            }
            if entry.vector.len() != self.dim {
                return Err(MemoryError::Fatal(format!(
                    "log entry {:?} has vector of dimension {}, expected {}",
                    entry.id,
                    entry.vector.len(),
                    self.dim
                )));
            }
            rebuilt.insert(entry.id, entry.clone());
        }
        self.id_map = rebuilt.keys().copied().collect();
        let recovered = rebuilt.len();
        self.live = rebuilt;
        Ok(recovered)
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        self.id_map.push(MemoryEntryId::new());
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

fn inner_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (*x as f64) * (*y as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemoryKind;

    fn entry(vector: Vec<f32>) -> MemoryEntry {
        MemoryEntry::new(MemoryKind::Episodic, vector, serde_json::json!({}))
    }

    #[test]
    fn search_orders_by_similarity() {
        let mut index = VectorIndex::new(3);
        let a = index.insert(entry(vec![1.0, 0.0, 0.0])).unwrap();
        let b = index.insert(entry(vec![0.0, 1.0, 0.0])).unwrap();
        index.insert(entry(vec![0.0, 0.0, 1.0])).unwrap();

        let hits = index.search(&[0.9, 0.4, 0.0], 2, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, a);
        assert_eq!(hits[1].0, b);
        assert!(hits[0].1 >= hits[1].1);
    }

    #[test]
    fn search_kind_filter_restricts_the_scan() {
        let mut index = VectorIndex::new(2);
        index.insert(entry(vec![1.0, 0.0])).unwrap();
        index.insert(entry(vec![0.9, 0.1])).unwrap();
        let plan = index
            .insert(MemoryEntry::new(
                MemoryKind::Plan,
                vec![0.0, 1.0],
                serde_json::json!({}),
            ))
            .unwrap();

        // The plan entry is the worst match for the query but must still
        // surface when the scan is restricted to its kind.
        let hits = index.search(&[1.0, 0.0], 1, Some(MemoryKind::Plan)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, plan);
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let index = VectorIndex::new(3);
        let err = index.search(&[1.0], 1, None).unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { expected: 3, got: 1 }));
    }

    #[test]
    fn verify_detects_dangling_id_map_slot() {
        let mut index = VectorIndex::new(2);
        index.insert(entry(vec![1.0, 0.0])).unwrap();
        assert!(index.verify().is_ok());

        index.corrupt_for_test();
        assert!(matches!(index.verify(), Err(MemoryError::Corruption(_))));
    }

    #[test]
    fn rebuild_recovers_from_corruption() {
        let mut index = VectorIndex::new(2);
        index.insert(entry(vec![1.0, 0.0])).unwrap();
        index.insert(entry(vec![0.0, 1.0])).unwrap();
        index.corrupt_for_test();

        let recovered = index.rebuild_from_log().unwrap();
        assert_eq!(recovered, 2);
        assert!(index.verify().is_ok());
        assert_eq!(index.len(), 2);
    }
}
