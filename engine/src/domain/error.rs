// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Engine-level error taxonomy.

use thiserror::Error;

use argus_memory::MemoryError;

use super::reasoning::ReasoningError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// An agent could not produce a usable proposal even after the
    /// pattern-only fallback.
    #[error("agent {role} failed to propose: {reason}")]
    ProposeFailed { role: String, reason: String },

    /// Root consensus stayed below threshold after the bounded retry
    /// and no degraded outcome could be surfaced.
    #[error("no consensus reached: best confidence {best_confidence:.3}")]
    NoConsensus { best_confidence: f64 },

    /// Plan search hit the step ceiling without a terminal step.
    #[error("planning exhausted after {steps_expanded} expansions")]
    PlanningExhausted { steps_expanded: usize },

    /// Validation concluded against the plan; carries the rounds as
    /// evidence.
    #[error("plan rejected by validation: {success_rounds} of {conclusive_rounds} conclusive rounds succeeded")]
    ValidationRejected {
        success_rounds: usize,
        conclusive_rounds: usize,
        evidence: Vec<crate::domain::validation::ValidationResult>,
    },

    #[error("reasoning provider error: {0}")]
    Reasoning(#[from] ReasoningError),

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
