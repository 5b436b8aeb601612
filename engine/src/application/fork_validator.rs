// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Fork Validator
//!
//! Confirms a candidate plan by re-executing it against forked state
//! across several rounds. Round 0 runs the plan exactly as written;
//! later rounds perturb timing and input ordering on a deterministic
//! schedule to probe robustness. State resets between rounds; rounds
//! run in parallel only when the executor guarantees isolation.
//!
//! Infrastructure failures are retried a fixed number of times and then
//! the round becomes `Inconclusive`, excluded from the accept/reject
//! majority. Acceptance requires successes to strictly exceed half of
//! the conclusive rounds.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::error::EngineError;
use crate::domain::plan::AttackPlan;
use crate::domain::sandbox::{ExecutionParams, SandboxError, SandboxExecutor};
use crate::domain::validation::{RoundOutcome, ValidationResult, ValidationSummary};

#[derive(Debug, Clone)]
pub struct ForkValidatorConfig {
    /// Validation rounds per plan, including the round-0 baseline.
    pub rounds: usize,
    /// Infrastructure retries per round before it goes inconclusive.
    pub infra_retry_limit: usize,
}

impl Default for ForkValidatorConfig {
    fn default() -> Self {
        Self {
            rounds: 5,
            infra_retry_limit: 2,
        }
    }
}

pub struct ForkValidator {
    executor: Arc<dyn SandboxExecutor>,
    config: ForkValidatorConfig,
}

impl ForkValidator {
    pub fn new(executor: Arc<dyn SandboxExecutor>, config: ForkValidatorConfig) -> Self {
        Self { executor, config }
    }

    /// Run all rounds for one plan. On cancellation the remaining
    /// rounds are abandoned and completed ones are returned.
    pub async fn validate(
        &self,
        plan: &AttackPlan,
        cancel: &CancellationToken,
    ) -> Vec<ValidationResult> {
        let mut results = if self.executor.supports_isolation() {
            let futures = (0..self.config.rounds).map(|round| async move {
                tokio::select! {
                    result = self.run_round(plan, round) => Some(result),
                    _ = cancel.cancelled() => None,
                }
            });
            join_all(futures).await.into_iter().flatten().collect()
        } else {
            let mut results = Vec::with_capacity(self.config.rounds);
            for round in 0..self.config.rounds {
                if cancel.is_cancelled() {
                    warn!(round, "validation cancelled, summarizing completed rounds");
                    break;
                }
                results.push(self.run_round(plan, round).await);
            }
            results
        };
        results.sort_by_key(|r| r.round);
        results
    }

    /// Fold round results into the acceptance verdict.
    pub fn summarize(&self, plan: &AttackPlan, rounds: Vec<ValidationResult>) -> ValidationSummary {
        let summary = ValidationSummary::from_rounds(plan.id, rounds);
        if summary.accepted {
            counter!("argus_validation_accepted_total").increment(1);
        } else {
            counter!("argus_validation_rejected_total").increment(1);
        }
        summary
    }

    /// Validate and require acceptance; rejection carries the rounds as
    /// evidence.
    pub async fn confirm(
        &self,
        plan: &AttackPlan,
        cancel: &CancellationToken,
    ) -> Result<ValidationSummary, EngineError> {
        let rounds = self.validate(plan, cancel).await;
        let summary = self.summarize(plan, rounds);
        if summary.accepted {
            Ok(summary)
        } else {
            Err(EngineError::ValidationRejected {
                success_rounds: summary.success_rounds,
                conclusive_rounds: summary.success_rounds + summary.failure_rounds,
                evidence: summary.rounds,
            })
        }
    }

    async fn run_round(&self, plan: &AttackPlan, round: usize) -> ValidationResult {
        let params = ExecutionParams::for_round(round);
        let mut attempts = 0usize;
        loop {
            match self.executor.execute(plan, params).await {
                Ok(trace) => {
                    let outcome = if trace.exploit_succeeded {
                        RoundOutcome::Success
                    } else {
                        RoundOutcome::Failure
                    };
                    debug!(round, outcome = ?outcome, extracted = trace.extracted_value, "round finished");
                    return ValidationResult {
                        plan_id: plan.id,
                        round,
                        outcome,
                        extracted_value: trace.extracted_value,
                        detail: trace.transcript,
                        finished_at: Utc::now(),
                    };
                }
                Err(SandboxError::ExploitFailed(detail)) => {
                    return ValidationResult {
                        plan_id: plan.id,
                        round,
                        outcome: RoundOutcome::Failure,
                        extracted_value: 0.0,
                        detail,
                        finished_at: Utc::now(),
                    };
                }
                Err(SandboxError::Infrastructure(detail)) => {
                    attempts += 1;
                    if attempts > self.config.infra_retry_limit {
                        warn!(round, attempts, "round inconclusive after infrastructure retries");
                        counter!("argus_validation_inconclusive_total").increment(1);
                        return ValidationResult {
                            plan_id: plan.id,
                            round,
                            outcome: RoundOutcome::Inconclusive,
                            extracted_value: 0.0,
                            detail,
                            finished_at: Utc::now(),
                        };
                    }
                    debug!(round, attempts, "retrying round after infrastructure failure");
                }
            }
        }
    }
}
