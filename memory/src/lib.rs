// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Argus Memory — Discovery Memory Bounded Context
//!
//! Append-only, similarity-searchable repository of past observations,
//! hypotheses, and validated outcomes. Every analysis stage writes here;
//! pattern matching, planning, and the agent pool read from it to bias
//! future search toward what has worked before.
//!
//! Entries carry a fixed-dimension embedding, an importance weight in
//! `[0, 1]`, and explicit association links. Importance decays on a
//! maintenance cadence and is reinforced when an entry contributes to a
//! later successful decision; validated exploits are protected from
//! eviction.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{EventBus, MemoryStore, InMemoryMemoryStore, MemoryStoreConfig, NullEventBus};
pub use application::{MemoryMaintenance, MemoryMaintenanceConfig};
pub use infrastructure::{Embedder, HashingEmbedder, EMBEDDING_DIM};
