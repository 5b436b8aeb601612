// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Validation Outcomes
//!
//! Results of running a candidate plan against forked state. A round
//! that fails for infrastructure reasons is `Inconclusive` and never
//! counts toward the exploit majority either way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanId;

/// Outcome of one validation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    /// The exploit succeeded under this round's perturbation.
    Success,
    /// The exploit ran to completion but did not realize its effect.
    Failure,
    /// Infrastructure failed after retries; excluded from the majority.
    Inconclusive,
}

/// One validation round's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub plan_id: PlanId,
    /// Zero-based round index; also seeds the round's perturbation.
    pub round: usize,
    pub outcome: RoundOutcome,
    /// Value extracted this round, in the fact snapshot's base unit.
    pub extracted_value: f64,
    pub detail: String,
    pub finished_at: DateTime<Utc>,
}

/// Aggregate over all rounds for one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub plan_id: PlanId,
    pub rounds: Vec<ValidationResult>,
    /// True when successes form a strict majority of conclusive rounds.
    pub accepted: bool,
    pub success_rounds: usize,
    pub failure_rounds: usize,
    pub inconclusive_rounds: usize,
    /// Set when any perturbed variation failed while the baseline
    /// succeeded. Informational only; never flips `accepted`.
    pub low_robustness: bool,
    /// Largest extracted value across successful rounds.
    pub observed_impact: f64,
}

impl ValidationSummary {
    /// Fold per-round results into the acceptance verdict. Acceptance
    /// requires successes to strictly exceed half of the conclusive
    /// rounds; an all-inconclusive run is rejected.
    pub fn from_rounds(plan_id: PlanId, rounds: Vec<ValidationResult>) -> Self {
        let success_rounds = rounds
            .iter()
            .filter(|r| r.outcome == RoundOutcome::Success)
            .count();
        let failure_rounds = rounds
            .iter()
            .filter(|r| r.outcome == RoundOutcome::Failure)
            .count();
        let inconclusive_rounds = rounds.len() - success_rounds - failure_rounds;
        let conclusive = success_rounds + failure_rounds;
        let accepted = conclusive > 0 && 2 * success_rounds > conclusive;
        let baseline_succeeded = rounds
            .iter()
            .any(|r| r.round == 0 && r.outcome == RoundOutcome::Success);
        let low_robustness = baseline_succeeded
            && rounds
                .iter()
                .any(|r| r.round > 0 && r.outcome == RoundOutcome::Failure);
        let observed_impact = rounds
            .iter()
            .filter(|r| r.outcome == RoundOutcome::Success)
            .map(|r| r.extracted_value)
            .fold(0.0f64, f64::max);
        Self {
            plan_id,
            rounds,
            accepted,
            success_rounds,
            failure_rounds,
            inconclusive_rounds,
            low_robustness,
            observed_impact,
        }
    }
}
