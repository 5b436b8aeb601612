// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Application services for the analysis pipeline.

pub mod agents;
pub mod analysis;
pub mod fork_validator;
pub mod orchestrator;
pub mod pattern_engine;
pub mod planner;
pub mod scorer;

pub use agents::{Agent, AgentTask, RoleAgent};
pub use analysis::{AnalysisConfig, AnalysisEngine};
pub use fork_validator::{ForkValidator, ForkValidatorConfig};
pub use orchestrator::{HierarchicalOrchestrator, OrchestratorConfig};
pub use pattern_engine::{
    hypotheses_from_matches, PatternEngine, PatternEngineConfig, PatternMatch, UncoveredSignature,
};
pub use planner::{PlanningConfig, PlanningEngine};
pub use scorer::{funds_at_risk, severity};
