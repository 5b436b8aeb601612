// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer for the discovery memory bounded context.

pub mod entry;
pub mod error;
pub mod events;

pub use entry::{MemoryEntry, MemoryEntryId, MemoryKind, ClusterId};
pub use error::MemoryError;
pub use events::MemoryEvent;
