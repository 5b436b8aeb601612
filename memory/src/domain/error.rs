// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use super::entry::MemoryEntryId;

/// Errors surfaced by the discovery memory.
///
/// `Corruption` is recoverable while the append-only log can rebuild the
/// index; an unrecoverable log is surfaced as `Fatal` and requires
/// operator intervention.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("entry {0:?} not found")]
    NotFound(MemoryEntryId),

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("index inconsistency detected: {0}")]
    Corruption(String),

    #[error("memory store is unrecoverable: {0}")]
    Fatal(String),
}
