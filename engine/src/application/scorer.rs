// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Funds-at-Risk Scorer
//!
//! Maps a validation outcome to a `[0, 100]` severity score:
//! `round(100 × (0.6 × success_rate + 0.4 × impact_ratio))`, minus a
//! fixed 15-point penalty when the exploit was fragile under
//! perturbation, clamped. No successful round means zero, always.

use crate::domain::facts::FactSnapshot;
use crate::domain::validation::ValidationSummary;

const SUCCESS_WEIGHT: f64 = 0.6;
const IMPACT_WEIGHT: f64 = 0.4;
const ROBUSTNESS_PENALTY: i64 = 15;

/// Severity from the raw components. Monotonic in both rates.
pub fn funds_at_risk(success_rate: f64, impact_ratio: f64, low_robustness: bool) -> u8 {
    if success_rate <= 0.0 {
        return 0;
    }
    let success_rate = success_rate.clamp(0.0, 1.0);
    let impact_ratio = impact_ratio.clamp(0.0, 1.0);
    let base = (100.0 * (SUCCESS_WEIGHT * success_rate + IMPACT_WEIGHT * impact_ratio)).round()
        as i64;
    let penalized = if low_robustness {
        base - ROBUSTNESS_PENALTY
    } else {
        base
    };
    penalized.clamp(0, 100) as u8
}

/// Severity straight from a validation summary, with the snapshot's
/// total value locked as the impact denominator.
pub fn severity(summary: &ValidationSummary, snapshot: &FactSnapshot) -> u8 {
    let conclusive = summary.success_rounds + summary.failure_rounds;
    if conclusive == 0 || summary.success_rounds == 0 {
        return 0;
    }
    let success_rate = summary.success_rounds as f64 / conclusive as f64;
    let impact_ratio = if snapshot.total_value_locked > 0.0 {
        summary.observed_impact / snapshot.total_value_locked
    } else {
        0.0
    };
    funds_at_risk(success_rate, impact_ratio, summary.low_robustness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_success_scores_zero_regardless_of_impact() {
        assert_eq!(funds_at_risk(0.0, 1.0, false), 0);
        assert_eq!(funds_at_risk(0.0, 1.0, true), 0);
    }

    #[test]
    fn full_success_and_impact_scores_one_hundred() {
        assert_eq!(funds_at_risk(1.0, 1.0, false), 100);
    }

    #[test]
    fn robustness_penalty_subtracts_fifteen() {
        assert_eq!(funds_at_risk(1.0, 1.0, true), 85);
        // 0.8 success, 1.0 impact: round(100 × 0.88) = 88, minus 15.
        assert_eq!(funds_at_risk(0.8, 1.0, true), 73);
    }

    #[test]
    fn score_is_monotonic_in_success_rate() {
        let mut previous = 0;
        for step in 1..=10 {
            let score = funds_at_risk(step as f64 / 10.0, 0.5, false);
            assert!(score >= previous, "step {step}");
            previous = score;
        }
    }

    #[test]
    fn score_is_monotonic_in_impact_ratio() {
        let mut previous = 0;
        for step in 0..=10 {
            let score = funds_at_risk(0.5, step as f64 / 10.0, false);
            assert!(score >= previous, "step {step}");
            previous = score;
        }
    }

    #[test]
    fn penalty_never_goes_below_zero() {
        // round(100 × 0.6 × 0.1) = 6, penalty would go negative.
        assert_eq!(funds_at_risk(0.1, 0.0, true), 0);
    }

    #[test]
    fn out_of_range_inputs_are_clamped() {
        assert_eq!(funds_at_risk(2.0, 3.0, false), 100);
    }
}
