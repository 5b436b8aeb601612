// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Memory maintenance — background task for decay and consolidation.
//!
//! Runs the store's decay tick and clustering pass on a fixed cadence,
//! on the store's single-writer path so maintenance never interleaves
//! with an in-flight write from an analysis stage.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::application::store::MemoryStore;

/// Configuration for the maintenance cycle.
#[derive(Debug, Clone)]
pub struct MemoryMaintenanceConfig {
    /// How often to run decay + clustering (in seconds).
    pub interval_seconds: u64,

    /// Run the clustering pass every Nth cycle (clustering is heavier
    /// than decay and tolerates staleness).
    pub cluster_every: u32,

    /// Whether maintenance is enabled.
    pub enabled: bool,
}

impl Default for MemoryMaintenanceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
            cluster_every: 4,
            enabled: true,
        }
    }
}

/// Background maintenance task over a [`MemoryStore`].
pub struct MemoryMaintenance {
    store: Arc<dyn MemoryStore>,
    config: MemoryMaintenanceConfig,
    shutdown_token: tokio_util::sync::CancellationToken,
}

impl MemoryMaintenance {
    pub fn new(store: Arc<dyn MemoryStore>, config: MemoryMaintenanceConfig) -> Self {
        Self {
            store,
            config,
            shutdown_token: tokio_util::sync::CancellationToken::new(),
        }
    }

    /// Get a handle to trigger shutdown.
    pub fn shutdown_token(&self) -> tokio_util::sync::CancellationToken {
        self.shutdown_token.clone()
    }

    /// Start the maintenance loop on a background task.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("memory maintenance is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            cluster_every = self.config.cluster_every,
            "starting memory maintenance background task"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds));
        let mut cycle: u32 = 0;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    cycle = cycle.wrapping_add(1);
                    match self.maintenance_cycle(cycle).await {
                        Ok(evicted) => debug!(cycle, evicted, "maintenance cycle complete"),
                        Err(e) => warn!(cycle, "maintenance cycle failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("shutdown signal received, stopping memory maintenance");
                    break;
                }
            }
        }
    }

    /// Execute a single maintenance cycle: decay always, clustering on
    /// its own slower cadence.
    async fn maintenance_cycle(&self, cycle: u32) -> Result<usize> {
        let evicted = self.store.decay_tick().await?;

        if self.config.cluster_every > 0 && cycle % self.config.cluster_every == 0 {
            let clusters = self.store.cluster().await?;
            debug!(clusters = clusters.len(), "clustering pass complete");
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ClusterId, MemoryEntry, MemoryEntryId, MemoryError, MemoryKind,
    };
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStore {
        decay_calls: AtomicUsize,
        cluster_calls: AtomicUsize,
    }

    #[async_trait]
    impl MemoryStore for CountingStore {
        async fn put(&self, _entry: MemoryEntry) -> Result<MemoryEntryId, MemoryError> {
            Ok(MemoryEntryId::new())
        }

        async fn recall(
            &self,
            _query: &[f32],
            _k: usize,
            _kind_filter: Option<MemoryKind>,
        ) -> Result<Vec<(MemoryEntry, f64)>, MemoryError> {
            Ok(vec![])
        }

        async fn reinforce(&self, _id: MemoryEntryId, _delta: f64) -> Result<(), MemoryError> {
            Ok(())
        }

        async fn decay_tick(&self) -> Result<usize, MemoryError> {
            self.decay_calls.fetch_add(1, Ordering::SeqCst);
            Ok(3)
        }

        async fn cluster(
            &self,
        ) -> Result<HashMap<ClusterId, HashSet<MemoryEntryId>>, MemoryError> {
            self.cluster_calls.fetch_add(1, Ordering::SeqCst);
            Ok(HashMap::new())
        }

        async fn link(&self, _a: MemoryEntryId, _b: MemoryEntryId) -> Result<(), MemoryError> {
            Ok(())
        }

        async fn get(&self, _id: MemoryEntryId) -> Result<Option<MemoryEntry>, MemoryError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn cycle_runs_decay_and_clusters_on_cadence() {
        let store = Arc::new(CountingStore::default());
        let maintenance = MemoryMaintenance::new(
            store.clone(),
            MemoryMaintenanceConfig {
                cluster_every: 2,
                ..MemoryMaintenanceConfig::default()
            },
        );

        assert_eq!(maintenance.maintenance_cycle(1).await.unwrap(), 3);
        assert_eq!(maintenance.maintenance_cycle(2).await.unwrap(), 3);

        assert_eq!(store.decay_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.cluster_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_maintenance_does_no_work() {
        let store = Arc::new(CountingStore::default());
        let maintenance = Arc::new(MemoryMaintenance::new(
            store.clone(),
            MemoryMaintenanceConfig {
                enabled: false,
                ..MemoryMaintenanceConfig::default()
            },
        ));

        let handle = maintenance.start();
        handle.await.unwrap();
        assert_eq!(store.decay_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_token_stops_the_loop() {
        let store = Arc::new(CountingStore::default());
        let maintenance = Arc::new(MemoryMaintenance::new(
            store,
            MemoryMaintenanceConfig {
                interval_seconds: 3600,
                ..MemoryMaintenanceConfig::default()
            },
        ));
        let token = maintenance.shutdown_token();

        let handle = maintenance.start();
        token.cancel();
        handle.await.unwrap();
    }
}
