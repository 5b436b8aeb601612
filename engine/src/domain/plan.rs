// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Attack Plan Aggregate
//!
//! An ordered, executable sequence realizing a [`Hypothesis`]. Plans
//! form a tree through backtracking: an alternative keeps a
//! back-reference to the branch it diverged from rather than owning
//! children.
//!
//! [`Hypothesis`]: super::hypothesis::Hypothesis

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::hypothesis::HypothesisId;

/// Unique identifier for an [`AttackPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub Uuid);

impl PlanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

/// One step of an attack sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackStep {
    pub action: String,
    pub target: String,
    pub parameters: serde_json::Value,
    /// Conditions that must hold before this step runs.
    pub preconditions: Vec<String>,
    /// Conditions established once this step completes.
    pub postconditions: Vec<String>,
    /// Estimated execution cost (gas / effort units).
    pub cost: f64,
    /// Detection / failure risk contribution in `[0, 1]`.
    pub risk: f64,
    /// True for the step that completes the exploit; search terminates
    /// when a plan reaches one.
    pub terminal: bool,
}

impl AttackStep {
    pub fn new(action: impl Into<String>, target: impl Into<String>, cost: f64, risk: f64) -> Self {
        Self {
            action: action.into(),
            target: target.into(),
            parameters: serde_json::Value::Null,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            cost,
            risk,
            terminal: false,
        }
    }

    pub fn requires(mut self, condition: impl Into<String>) -> Self {
        self.preconditions.push(condition.into());
        self
    }

    pub fn establishes(mut self, condition: impl Into<String>) -> Self {
        self.postconditions.push(condition.into());
        self
    }

    pub fn terminal(mut self) -> Self {
        self.terminal = true;
        self
    }
}

/// An ordered attack sequence with its search metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackPlan {
    pub id: PlanId,
    pub hypothesis_id: HypothesisId,
    pub ordered_steps: Vec<AttackStep>,
    pub estimated_cost: f64,
    pub estimated_risk: f64,
    /// Back-reference to the branch this plan diverged from, if any.
    pub alternative_of: Option<PlanId>,
}

impl AttackPlan {
    pub fn new(hypothesis_id: HypothesisId, ordered_steps: Vec<AttackStep>) -> Self {
        let estimated_cost = ordered_steps.iter().map(|s| s.cost).sum();
        let estimated_risk = ordered_steps
            .iter()
            .map(|s| s.risk)
            .fold(0.0f64, |acc, r| acc + r)
            .min(1.0);
        Self {
            id: PlanId::new(),
            hypothesis_id,
            ordered_steps,
            estimated_cost,
            estimated_risk,
            alternative_of: None,
        }
    }

    /// True once the sequence ends in a terminal step.
    pub fn is_complete(&self) -> bool {
        self.ordered_steps.last().map_or(false, |s| s.terminal)
    }

    /// Structural signature used to find similar past plans in memory:
    /// the action names in order, ignoring parameters.
    pub fn structure_signature(&self) -> String {
        self.ordered_steps
            .iter()
            .map(|s| s.action.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}
