// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Sandbox Executor Port
//!
//! Boundary to the fork-execution backend. The engine never touches
//! chain state directly; it submits a plan with per-round execution
//! parameters and reads back a trace.
//!
//! Error split matters here: [`SandboxError::Infrastructure`] means the
//! harness broke (retryable, round may become inconclusive), while
//! [`SandboxError::ExploitFailed`] means the harness worked and the
//! exploit did not.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::plan::AttackPlan;

/// Per-round execution knobs. Round 0 always runs unperturbed; later
/// rounds vary timing and input ordering to probe robustness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Simulated block-timing offset in milliseconds.
    pub timing_jitter_ms: u64,
    /// Left-rotation applied to non-terminal step parameters.
    pub input_rotation: usize,
    /// Initial state scale factor relative to the forked snapshot.
    pub state_scale: f64,
}

impl ExecutionParams {
    /// Baseline: the plan exactly as written against the fork as-is.
    pub fn baseline() -> Self {
        Self {
            timing_jitter_ms: 0,
            input_rotation: 0,
            state_scale: 1.0,
        }
    }

    /// Deterministic perturbation for a given round index. Round 0 is
    /// the baseline; the schedule is fixed so reruns reproduce results.
    pub fn for_round(round: usize) -> Self {
        if round == 0 {
            return Self::baseline();
        }
        Self {
            timing_jitter_ms: (round as u64) * 250,
            input_rotation: round % 4,
            state_scale: 1.0 + 0.05 * ((round % 3) as f64) - 0.05,
        }
    }
}

/// What happened when a plan ran against forked state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// True when the exploit realized its effect.
    pub exploit_succeeded: bool,
    /// Value extracted, in the fact snapshot's base unit.
    pub extracted_value: f64,
    /// Steps actually executed before termination.
    pub steps_executed: usize,
    /// Backend-specific transcript for the report.
    pub transcript: String,
}

#[derive(Debug, Error)]
pub enum SandboxError {
    /// The harness itself failed (fork unavailable, timeout, crash).
    #[error("sandbox infrastructure failure: {0}")]
    Infrastructure(String),
    /// The harness ran fine and the exploit reverted or had no effect.
    #[error("exploit failed: {0}")]
    ExploitFailed(String),
}

/// Port implemented by fork-execution adapters.
#[async_trait]
pub trait SandboxExecutor: Send + Sync {
    async fn execute(
        &self,
        plan: &AttackPlan,
        params: ExecutionParams,
    ) -> Result<ExecutionTrace, SandboxError>;

    /// True when rounds run on isolated forks and may execute in
    /// parallel; false forces sequential rounds on shared state.
    fn supports_isolation(&self) -> bool;
}
