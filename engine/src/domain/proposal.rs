// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Proposals & Decisions
//!
//! The consensus vocabulary: each agent produces a [`Proposal`] per
//! orchestration round; the orchestrator reduces proposals to one
//! [`Decision`] per domain and then one root decision.
//!
//! # Determinism
//!
//! `AgentRole` and `DecisionDomain` expose stable wire names whose
//! lexical order is the tie-breaking order everywhere in consensus, so
//! outcomes never depend on task scheduling.

use serde::{Deserialize, Serialize};

use super::hypothesis::HypothesisId;
use super::plan::PlanId;

/// Closed set of agent roles. Not an open plugin surface: orchestration
/// weighting depends on knowing every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Analyst,
    Explorer,
    Validator,
    Synthesizer,
    Adversary,
    MemoryKeeper,
}

impl AgentRole {
    pub const ALL: [AgentRole; 6] = [
        AgentRole::Analyst,
        AgentRole::Explorer,
        AgentRole::Validator,
        AgentRole::Synthesizer,
        AgentRole::Adversary,
        AgentRole::MemoryKeeper,
    ];

    /// Stable wire name; lexical order over these names is the
    /// deterministic tie-break order.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Analyst => "analyst",
            AgentRole::Explorer => "explorer",
            AgentRole::Validator => "validator",
            AgentRole::Synthesizer => "synthesizer",
            AgentRole::Adversary => "adversary",
            AgentRole::MemoryKeeper => "memory_keeper",
        }
    }

    /// How much the orchestrator trusts this role's confidence.
    pub fn trust_factor(&self) -> f64 {
        match self {
            AgentRole::Validator => 1.0,
            AgentRole::Analyst => 0.95,
            AgentRole::Synthesizer => 0.9,
            AgentRole::Adversary => 0.85,
            AgentRole::Explorer => 0.75,
            AgentRole::MemoryKeeper => 0.7,
        }
    }

    /// Sampling temperature bias: exploratory roles run hot,
    /// verification roles run cold.
    pub fn temperature(&self) -> f32 {
        match self {
            AgentRole::Analyst => 0.4,
            AgentRole::Explorer => 0.85,
            AgentRole::Validator => 0.3,
            AgentRole::Synthesizer => 0.6,
            AgentRole::Adversary => 0.8,
            AgentRole::MemoryKeeper => 0.4,
        }
    }

    /// Domain meta-group this role reports into.
    pub fn domain(&self) -> DecisionDomain {
        match self {
            AgentRole::Analyst | AgentRole::Validator => DecisionDomain::SecurityTechnical,
            AgentRole::Adversary | AgentRole::Synthesizer => DecisionDomain::Economic,
            AgentRole::Explorer | AgentRole::MemoryKeeper => DecisionDomain::Creative,
        }
    }
}

/// Domain meta-agent groupings for the middle consensus level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionDomain {
    SecurityTechnical,
    Economic,
    Creative,
}

impl DecisionDomain {
    pub const ALL: [DecisionDomain; 3] = [
        DecisionDomain::SecurityTechnical,
        DecisionDomain::Economic,
        DecisionDomain::Creative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionDomain::SecurityTechnical => "security_technical",
            DecisionDomain::Economic => "economic",
            DecisionDomain::Creative => "creative",
        }
    }
}

/// What a proposal (or decision) says about the subject under review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Pursue: plan to validation, hypothesis to planning.
    Pursue,
    /// Drop: not worth further budget.
    Reject,
    /// Needs another pass with revised inputs.
    Revise,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pursue => "pursue",
            Verdict::Reject => "reject",
            Verdict::Revise => "revise",
        }
    }
}

/// One agent's output for one orchestration round. Ephemeral: owned by
/// the orchestrator for that round only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub agent_role: AgentRole,
    pub plan_id: Option<PlanId>,
    pub hypothesis_id: Option<HypothesisId>,
    pub verdict: Verdict,
    pub rationale: String,
    pub confidence: f64,
}

impl Proposal {
    /// Consensus weight: confidence scaled by the role's trust factor.
    pub fn weight(&self) -> f64 {
        self.confidence.clamp(0.0, 1.0) * self.agent_role.trust_factor()
    }
}

/// Which reduction level produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionLevel {
    Leaf,
    Meta,
    Root,
}

/// An immutable consensus outcome at one level of the hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub level: DecisionLevel,
    /// Domain is present at the meta level, `None` at root.
    pub domain: Option<DecisionDomain>,
    pub aggregated_proposals: Vec<Proposal>,
    pub outcome: Verdict,
    /// Winning weight's share of total weight in the group, in `[0, 1]`.
    pub consensus_confidence: f64,
    /// Set when consensus fell below threshold and the orchestrator
    /// surfaced a degraded single-domain outcome instead.
    pub degraded: bool,
}
