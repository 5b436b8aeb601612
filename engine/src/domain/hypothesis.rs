// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Hypothesis
//!
//! A candidate vulnerability claim with supporting evidence, not yet
//! validated. Immutable after creation; a revision mints a new id.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::proposal::AgentRole;

/// Unique identifier for a [`Hypothesis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HypothesisId(pub Uuid);

impl HypothesisId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HypothesisId {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed set of vulnerability classes the engine reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityClass {
    Reentrancy,
    FlashLoan,
    OracleManipulation,
    Governance,
    AccessControl,
    IntegerOverflow,
}

impl VulnerabilityClass {
    /// Stable wire name, used in payloads and embeddings.
    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilityClass::Reentrancy => "reentrancy",
            VulnerabilityClass::FlashLoan => "flash_loan",
            VulnerabilityClass::OracleManipulation => "oracle_manipulation",
            VulnerabilityClass::Governance => "governance",
            VulnerabilityClass::AccessControl => "access_control",
            VulnerabilityClass::IntegerOverflow => "integer_overflow",
        }
    }
}

/// A candidate vulnerability claim. `supporting_patterns` are ids of
/// the pattern matches that produced it; `confidence` is the claim's
/// own prior, refined later by consensus and validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub id: HypothesisId,
    pub vulnerability_class: VulnerabilityClass,
    /// Target reference, usually `contract.function`.
    pub target_ref: String,
    pub supporting_patterns: HashSet<String>,
    pub proposed_by: AgentRole,
    pub confidence: f64,
}

impl Hypothesis {
    pub fn new(
        vulnerability_class: VulnerabilityClass,
        target_ref: impl Into<String>,
        proposed_by: AgentRole,
        confidence: f64,
    ) -> Self {
        Self {
            id: HypothesisId::new(),
            vulnerability_class,
            target_ref: target_ref.into(),
            supporting_patterns: HashSet::new(),
            proposed_by,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn with_patterns<I: IntoIterator<Item = String>>(mut self, patterns: I) -> Self {
        self.supporting_patterns.extend(patterns);
        self
    }

    /// Text used when embedding this hypothesis for memory storage.
    pub fn embedding_text(&self) -> String {
        format!(
            "{} {} {}",
            self.vulnerability_class.as_str(),
            self.target_ref,
            self.supporting_patterns
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ")
        )
    }
}
