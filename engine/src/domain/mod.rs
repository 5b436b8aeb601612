// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer for the decision and validation engine.

pub mod error;
pub mod facts;
pub mod hypothesis;
pub mod plan;
pub mod proposal;
pub mod reasoning;
pub mod report;
pub mod sandbox;
pub mod validation;

pub use error::EngineError;
pub use facts::{ExternalCall, FactSnapshot, FunctionFact, StateVariable, StateMutation};
pub use hypothesis::{Hypothesis, HypothesisId, VulnerabilityClass};
pub use plan::{AttackPlan, AttackStep, PlanId};
pub use proposal::{
    AgentRole, Decision, DecisionDomain, DecisionLevel, Proposal, Verdict,
};
pub use reasoning::{ReasoningError, ReasoningProvider, ReasoningRequest, ReasoningResponse};
pub use report::{ExploitReport, ReportSink};
pub use sandbox::{ExecutionParams, ExecutionTrace, SandboxError, SandboxExecutor};
pub use validation::{RoundOutcome, ValidationResult, ValidationSummary};
