// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Application layer for the discovery memory bounded context.

pub mod maintenance;
pub mod store;

pub use maintenance::{MemoryMaintenance, MemoryMaintenanceConfig};
pub use store::{EventBus, InMemoryMemoryStore, MemoryStore, MemoryStoreConfig, NullEventBus};
