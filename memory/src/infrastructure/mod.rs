// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure layer for the discovery memory bounded context.

pub mod embedding;
pub mod index;

pub use embedding::{Embedder, HashingEmbedder, EMBEDDING_DIM};
pub use index::VectorIndex;
