// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Argus Engine — Decision & Validation Core
//!
//! Coordinates many independent analysis agents over a target's fact
//! snapshot, reduces their conflicting proposals into one ranked
//! decision, confirms candidate exploits by sandboxed re-execution, and
//! scores the confirmed ones.
//!
//! Pipeline: facts → pattern matches → hypotheses → attack plans →
//! hierarchical consensus → fork validation → funds-at-risk score →
//! report hand-off. The discovery memory (`argus-memory`) is written by
//! every stage and read by the pattern, planning, and agent stages.

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
pub use application::{
    funds_at_risk, hypotheses_from_matches, severity, Agent, AgentTask, AnalysisConfig,
    AnalysisEngine, ForkValidator, ForkValidatorConfig, HierarchicalOrchestrator,
    OrchestratorConfig, PatternEngine, PatternEngineConfig, PatternMatch, PlanningConfig,
    PlanningEngine, RoleAgent, UncoveredSignature,
};
pub use infrastructure::{OpenRouterAdapter, ScriptedSandbox, ScriptedSandboxConfig};
