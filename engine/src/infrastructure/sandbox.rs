// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Scripted Sandbox
//!
//! Deterministic local stand-in for a real fork-execution backend, used
//! by the CLI and integration tests. Outcomes are a pure function of
//! the plan and the execution parameters, so repeated validations of
//! the same plan reproduce bit-identical round results.

use async_trait::async_trait;

use crate::domain::plan::AttackPlan;
use crate::domain::sandbox::{ExecutionParams, ExecutionTrace, SandboxError, SandboxExecutor};

#[derive(Debug, Clone)]
pub struct ScriptedSandboxConfig {
    /// Value a successful run extracts, in the snapshot's base unit.
    pub extractable_value: f64,
    /// How strongly timing jitter pushes a plan toward failure. A run
    /// fails once `estimated_risk + fragility × jitter_seconds ≥ 1.0`.
    pub fragility: f64,
    /// Rounds that fail with an infrastructure error on every attempt.
    pub broken_rounds: Vec<usize>,
    /// Whether rounds run on isolated forks (enables parallelism).
    pub isolated: bool,
}

impl Default for ScriptedSandboxConfig {
    fn default() -> Self {
        Self {
            extractable_value: 0.0,
            fragility: 0.0,
            broken_rounds: Vec::new(),
            isolated: true,
        }
    }
}

pub struct ScriptedSandbox {
    config: ScriptedSandboxConfig,
}

impl ScriptedSandbox {
    pub fn new(config: ScriptedSandboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SandboxExecutor for ScriptedSandbox {
    async fn execute(
        &self,
        plan: &AttackPlan,
        params: ExecutionParams,
    ) -> Result<ExecutionTrace, SandboxError> {
        let round = (params.timing_jitter_ms / 250) as usize;
        if self.config.broken_rounds.contains(&round) {
            return Err(SandboxError::Infrastructure(format!(
                "fork unavailable for round {round}"
            )));
        }
        if !plan.is_complete() {
            return Err(SandboxError::ExploitFailed(
                "plan has no terminal step".to_string(),
            ));
        }
        let jitter_seconds = params.timing_jitter_ms as f64 / 1000.0;
        let effective_risk = plan.estimated_risk + self.config.fragility * jitter_seconds;
        if effective_risk >= 1.0 {
            return Ok(ExecutionTrace {
                exploit_succeeded: false,
                extracted_value: 0.0,
                steps_executed: plan.ordered_steps.len().saturating_sub(1),
                transcript: format!("reverted under perturbation (risk {effective_risk:.2})"),
            });
        }
        Ok(ExecutionTrace {
            exploit_succeeded: true,
            extracted_value: self.config.extractable_value * params.state_scale,
            steps_executed: plan.ordered_steps.len(),
            transcript: format!(
                "executed {} steps, extracted {:.2}",
                plan.ordered_steps.len(),
                self.config.extractable_value * params.state_scale
            ),
        })
    }

    fn supports_isolation(&self) -> bool {
        self.config.isolated
    }
}
