// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Pattern/Invariant Engine
//!
//! Matches a fact snapshot against a catalogue of vulnerability
//! patterns. Each pattern is evaluated independently and concurrently;
//! a match's confidence is the detector's base score scaled by the
//! pattern's historical precision:
//!
//! ```text
//! confidence = base_match × confidence_weight × (1 − false_positive_rate)
//! ```
//!
//! Validation outcomes feed back through [`PatternEngine::learn`]:
//! confirmed exploits raise a pattern's weight, confirmed false
//! positives raise its running false-positive rate. Fact combinations
//! no pattern covers are tracked, and one seen across enough
//! independent discoveries becomes a new learned pattern.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::facts::{FactSnapshot, FunctionFact, StateMutation};
use crate::domain::hypothesis::{Hypothesis, VulnerabilityClass};
use crate::domain::proposal::AgentRole;
use crate::domain::validation::ValidationSummary;

/// Fact combinations the builtin catalogue does not cover. Each value
/// doubles as the recurrence key for pattern birth and as the promoted
/// pattern's detector, so a learned pattern matches exactly the
/// combination it was born from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncoveredSignature {
    /// Attacker-controllable external call with no state write after it.
    ControllableCallNoLateWrite,
    /// Share or supply accounting skewed without any external call.
    DonationSkewsShares,
}

impl UncoveredSignature {
    pub fn as_str(&self) -> &'static str {
        match self {
            UncoveredSignature::ControllableCallNoLateWrite => "controllable_call_no_late_write",
            UncoveredSignature::DonationSkewsShares => "donation_skews_shares",
        }
    }

    fn base(&self, function: &FunctionFact) -> f64 {
        match self {
            UncoveredSignature::ControllableCallNoLateWrite => {
                let controllable_call = function
                    .external_calls
                    .iter()
                    .any(|c| c.attacker_controllable);
                let write_after_call = function
                    .state_writes
                    .iter()
                    .any(|(_, m)| *m == StateMutation::AfterExternalCall);
                if function.permissionless && controllable_call && !write_after_call {
                    1.0
                } else {
                    0.0
                }
            }
            UncoveredSignature::DonationSkewsShares => {
                let skews_shares = function.state_writes.iter().any(|(name, _)| {
                    let n = name.to_ascii_lowercase();
                    n.contains("share") || n.contains("supply")
                });
                if function.permissionless && function.external_calls.is_empty() && skews_shares {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// One pattern hit against a specific target function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub pattern_id: String,
    pub vulnerability_class: VulnerabilityClass,
    /// `contract.function` style reference into the snapshot.
    pub target_ref: String,
    /// Detector's raw evidence score in `[0, 1]`.
    pub base_match: f64,
    /// Precision-scaled confidence in `[0, 1]`.
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct PatternEngineConfig {
    /// Matches below this confidence are dropped.
    pub min_confidence: f64,
    /// Multiplier applied to a pattern's weight on confirmed success.
    pub success_boost: f64,
    /// Independent recurrences before an uncovered combination becomes
    /// a learned pattern.
    pub birth_threshold: usize,
    /// Initial confidence weight for learned patterns.
    pub learned_initial_weight: f64,
}

impl Default for PatternEngineConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            success_boost: 1.05,
            birth_threshold: 3,
            learned_initial_weight: 0.6,
        }
    }
}

#[derive(Debug, Clone)]
struct PatternState {
    class: VulnerabilityClass,
    confidence_weight: f64,
    false_positive_rate: f64,
    confirmed_successes: u64,
    confirmed_failures: u64,
    /// Present for promoted patterns: the fact combination they detect.
    /// Builtin patterns dispatch on `class` instead.
    signature: Option<UncoveredSignature>,
}

impl PatternState {
    fn builtin(class: VulnerabilityClass, weight: f64) -> Self {
        Self {
            class,
            confidence_weight: weight,
            false_positive_rate: 0.0,
            confirmed_successes: 0,
            confirmed_failures: 0,
            signature: None,
        }
    }
}

/// Catalogue plus matching and feedback. Cheap to share behind `Arc`.
pub struct PatternEngine {
    config: PatternEngineConfig,
    patterns: RwLock<HashMap<String, PatternState>>,
    /// Uncovered fact signatures and the distinct targets they were
    /// seen on, pending pattern birth.
    uncovered: RwLock<HashMap<UncoveredSignature, HashSet<String>>>,
}

impl PatternEngine {
    pub fn new(config: PatternEngineConfig) -> Self {
        let mut patterns = HashMap::new();
        patterns.insert(
            "reentrancy.state_after_call".to_string(),
            PatternState::builtin(VulnerabilityClass::Reentrancy, 0.9),
        );
        patterns.insert(
            "flash_loan.atomic_leverage".to_string(),
            PatternState::builtin(VulnerabilityClass::FlashLoan, 0.85),
        );
        patterns.insert(
            "oracle.spot_price_dependence".to_string(),
            PatternState::builtin(VulnerabilityClass::OracleManipulation, 0.85),
        );
        patterns.insert(
            "governance.unguarded_execution".to_string(),
            PatternState::builtin(VulnerabilityClass::Governance, 0.8),
        );
        patterns.insert(
            "access_control.unprotected_privileged".to_string(),
            PatternState::builtin(VulnerabilityClass::AccessControl, 0.95),
        );
        patterns.insert(
            "arithmetic.unchecked_overflow".to_string(),
            PatternState::builtin(VulnerabilityClass::IntegerOverflow, 0.7),
        );
        Self {
            config,
            patterns: RwLock::new(patterns),
            uncovered: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate every catalogue pattern against the snapshot. Patterns
    /// run as independent tasks; results are merged and sorted by
    /// confidence descending, target ref ascending on ties.
    pub async fn match_facts(&self, snapshot: &Arc<FactSnapshot>) -> Vec<PatternMatch> {
        let states: Vec<PatternSnapshot> = {
            let guard = self.patterns.read();
            let mut states: Vec<_> = guard
                .iter()
                .map(|(id, p)| PatternSnapshot {
                    pattern_id: id.clone(),
                    class: p.class,
                    weight: p.confidence_weight,
                    fp_rate: p.false_positive_rate,
                    signature: p.signature,
                })
                .collect();
            states.sort_by(|a, b| a.pattern_id.cmp(&b.pattern_id));
            states
        };
        let tasks = states.into_iter().map(|state| {
            let snapshot = Arc::clone(snapshot);
            tokio::spawn(async move { evaluate_pattern(&state, &snapshot) })
        });
        let mut matches: Vec<PatternMatch> = join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| joined.ok())
            .flatten()
            .filter(|m| m.confidence >= self.config.min_confidence)
            .collect();
        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_ref.cmp(&b.target_ref))
        });
        debug!(total = matches.len(), target = %snapshot.target, "pattern matching finished");
        matches
    }

    /// Feed a validation outcome back into the catalogue. `pattern_ids`
    /// are the patterns whose matches supported the validated plan.
    pub fn learn(&self, summary: &ValidationSummary, pattern_ids: &[String]) {
        let mut guard = self.patterns.write();
        for id in pattern_ids {
            let Some(state) = guard.get_mut(id) else { continue };
            if summary.accepted {
                state.confirmed_successes += 1;
                state.confidence_weight = (state.confidence_weight * self.config.success_boost).min(1.0);
            } else {
                state.confirmed_failures += 1;
            }
            let total = state.confirmed_successes + state.confirmed_failures;
            if total > 0 {
                state.false_positive_rate = state.confirmed_failures as f64 / total as f64;
            }
            debug!(
                pattern = %id,
                weight = state.confidence_weight,
                fp_rate = state.false_positive_rate,
                "pattern feedback applied"
            );
        }
    }

    /// Record a fact combination no catalogue pattern covered. Once the
    /// same signature recurs across enough distinct targets it is
    /// promoted to a learned pattern.
    pub fn record_uncovered(
        &self,
        signature: UncoveredSignature,
        target: &str,
        class: VulnerabilityClass,
    ) -> Option<String> {
        let recurrences = {
            let mut guard = self.uncovered.write();
            let targets = guard.entry(signature).or_default();
            targets.insert(target.to_string());
            targets.len()
        };
        if recurrences < self.config.birth_threshold {
            return None;
        }
        let pattern_id = format!("learned.{}", signature.as_str());
        let mut guard = self.patterns.write();
        if guard.contains_key(&pattern_id) {
            return None;
        }
        guard.insert(
            pattern_id.clone(),
            PatternState {
                class,
                confidence_weight: self.config.learned_initial_weight,
                false_positive_rate: 0.0,
                confirmed_successes: 0,
                confirmed_failures: 0,
                signature: Some(signature),
            },
        );
        info!(pattern = %pattern_id, recurrences, "learned pattern promoted");
        self.uncovered.write().remove(&signature);
        Some(pattern_id)
    }

    pub fn confidence_weight(&self, pattern_id: &str) -> Option<f64> {
        self.patterns.read().get(pattern_id).map(|p| p.confidence_weight)
    }

    pub fn is_learned(&self, pattern_id: &str) -> bool {
        self.patterns
            .read()
            .get(pattern_id)
            .map_or(false, |p| p.signature.is_some())
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new(PatternEngineConfig::default())
    }
}

/// Group matches into one hypothesis per (class, target) pair.
/// Hypothesis confidence is the strongest supporting match.
pub fn hypotheses_from_matches(matches: &[PatternMatch]) -> Vec<Hypothesis> {
    let mut grouped: HashMap<(VulnerabilityClass, String), Vec<&PatternMatch>> = HashMap::new();
    for m in matches {
        grouped
            .entry((m.vulnerability_class, m.target_ref.clone()))
            .or_default()
            .push(m);
    }
    let mut out: Vec<Hypothesis> = grouped
        .into_iter()
        .map(|((class, target_ref), group)| {
            let confidence = group
                .iter()
                .map(|m| m.confidence)
                .fold(0.0f64, f64::max);
            Hypothesis::new(class, target_ref, AgentRole::Analyst, confidence)
                .with_patterns(group.iter().map(|m| m.pattern_id.clone()))
        })
        .collect();
    out.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.target_ref.cmp(&b.target_ref))
    });
    out
}

/// Read-only view of one pattern taken under the catalogue lock, so
/// evaluation tasks run without holding it.
struct PatternSnapshot {
    pattern_id: String,
    class: VulnerabilityClass,
    weight: f64,
    fp_rate: f64,
    signature: Option<UncoveredSignature>,
}

fn evaluate_pattern(state: &PatternSnapshot, snapshot: &FactSnapshot) -> Vec<PatternMatch> {
    let mut out = Vec::new();
    for function in &snapshot.functions {
        let base = match state.signature {
            Some(signature) => signature.base(function),
            None => match state.class {
                VulnerabilityClass::Reentrancy => reentrancy_base(function),
                VulnerabilityClass::FlashLoan => flash_loan_base(snapshot, function),
                VulnerabilityClass::OracleManipulation => oracle_base(function),
                VulnerabilityClass::Governance => governance_base(snapshot, function),
                VulnerabilityClass::AccessControl => access_control_base(function),
                VulnerabilityClass::IntegerOverflow => overflow_base(function),
            },
        };
        if base <= 0.0 {
            continue;
        }
        out.push(PatternMatch {
            pattern_id: state.pattern_id.clone(),
            vulnerability_class: state.class,
            target_ref: format!("{}.{}", snapshot.target, function.name),
            base_match: base,
            confidence: base * state.weight * (1.0 - state.fp_rate),
        });
    }
    out
}

fn has_reentrancy_guard(function: &FunctionFact) -> bool {
    function
        .guards
        .iter()
        .any(|g| g.to_ascii_lowercase().contains("reentran"))
}

fn writes_value_state(function: &FunctionFact) -> bool {
    function
        .state_writes
        .iter()
        .any(|(name, _)| !name.is_empty())
}

fn reentrancy_base(function: &FunctionFact) -> f64 {
    if !function.permissionless || has_reentrancy_guard(function) {
        return 0.0;
    }
    let controllable_call = function
        .external_calls
        .iter()
        .any(|c| c.attacker_controllable);
    let write_after_call = function
        .state_writes
        .iter()
        .any(|(_, m)| *m == StateMutation::AfterExternalCall);
    match (controllable_call, write_after_call) {
        (true, true) => 1.0,
        // Value-forwarding call with late write is still suspicious
        // even when controllability was not established.
        (false, true) if function.external_calls.iter().any(|c| c.transfers_value) => 0.7,
        _ => 0.0,
    }
}

fn flash_loan_base(snapshot: &FactSnapshot, function: &FunctionFact) -> f64 {
    if !snapshot.flash_loanable || !function.permissionless {
        return 0.0;
    }
    if function.reads_external_price && writes_value_state(function) {
        1.0
    } else if writes_value_state(function) {
        0.6
    } else {
        0.0
    }
}

fn oracle_base(function: &FunctionFact) -> f64 {
    if !function.permissionless || !function.reads_external_price {
        return 0.0;
    }
    if writes_value_state(function) || function.external_calls.iter().any(|c| c.transfers_value) {
        1.0
    } else {
        0.5
    }
}

fn governance_base(snapshot: &FactSnapshot, function: &FunctionFact) -> f64 {
    if !snapshot.has_governance || !function.permissionless {
        return 0.0;
    }
    let name = function.name.to_ascii_lowercase();
    let is_governance_surface =
        name.contains("vote") || name.contains("propose") || name.contains("execute");
    if is_governance_surface && function.guards.is_empty() {
        1.0
    } else if is_governance_surface {
        0.5
    } else {
        0.0
    }
}

fn access_control_base(function: &FunctionFact) -> f64 {
    if !function.permissionless || !function.guards.is_empty() {
        return 0.0;
    }
    let privileged = function
        .external_calls
        .iter()
        .any(|c| c.transfers_value)
        || function
            .state_writes
            .iter()
            .any(|(name, _)| {
                let n = name.to_ascii_lowercase();
                n.contains("owner") || n.contains("admin") || n.contains("role")
            });
    if privileged {
        1.0
    } else {
        0.0
    }
}

fn overflow_base(function: &FunctionFact) -> f64 {
    if function.unchecked_arithmetic && function.permissionless {
        1.0
    } else if function.unchecked_arithmetic {
        0.4
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::facts::{ExternalCall, StateVariable};
    use crate::domain::plan::PlanId;
    use crate::domain::validation::{RoundOutcome, ValidationResult};
    use chrono::Utc;

    fn vulnerable_withdraw() -> FunctionFact {
        FunctionFact {
            name: "withdraw".to_string(),
            calls: vec![],
            external_calls: vec![ExternalCall {
                callee: "msg.sender".to_string(),
                attacker_controllable: true,
                transfers_value: true,
            }],
            state_writes: vec![("balances".to_string(), StateMutation::AfterExternalCall)],
            guards: vec![],
            permissionless: true,
            reads_external_price: false,
            unchecked_arithmetic: false,
        }
    }

    fn snapshot(functions: Vec<FunctionFact>) -> Arc<FactSnapshot> {
        Arc::new(FactSnapshot {
            target: "Vault".to_string(),
            version: "1".to_string(),
            functions,
            state_variables: vec![StateVariable {
                name: "balances".to_string(),
                holds_value: true,
            }],
            total_value_locked: 1_000_000.0,
            flash_loanable: false,
            has_governance: false,
        })
    }

    fn accepted_summary() -> ValidationSummary {
        let id = PlanId::new();
        ValidationSummary::from_rounds(
            id,
            vec![ValidationResult {
                plan_id: id,
                round: 0,
                outcome: RoundOutcome::Success,
                extracted_value: 10.0,
                detail: String::new(),
                finished_at: Utc::now(),
            }],
        )
    }

    #[tokio::test]
    async fn reentrancy_detector_fires_on_write_after_controllable_call() {
        let engine = Arc::new(PatternEngine::default());
        let matches = engine.match_facts(&snapshot(vec![vulnerable_withdraw()])).await;
        let m = matches
            .iter()
            .find(|m| m.pattern_id == "reentrancy.state_after_call")
            .expect("reentrancy match");
        assert_eq!(m.target_ref, "Vault.withdraw");
        assert!((m.confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn guarded_function_does_not_match_reentrancy() {
        let mut f = vulnerable_withdraw();
        f.guards.push("nonReentrant".to_string());
        let engine = Arc::new(PatternEngine::default());
        let matches = engine.match_facts(&snapshot(vec![f])).await;
        assert!(matches
            .iter()
            .all(|m| m.pattern_id != "reentrancy.state_after_call"));
    }

    #[tokio::test]
    async fn low_confidence_matches_are_dropped() {
        // Unchecked arithmetic in a privileged function scores
        // 0.4 × 0.7 = 0.28, below the 0.5 floor.
        let f = FunctionFact {
            name: "accrue".to_string(),
            calls: vec![],
            external_calls: vec![],
            state_writes: vec![("index".to_string(), StateMutation::NoExternalCall)],
            guards: vec!["onlyOwner".to_string()],
            permissionless: false,
            reads_external_price: false,
            unchecked_arithmetic: true,
        };
        let engine = Arc::new(PatternEngine::default());
        let matches = engine.match_facts(&snapshot(vec![f])).await;
        assert!(matches.is_empty());
    }

    #[test]
    fn confirmed_success_raises_weight_and_failure_raises_fp_rate() {
        let engine = PatternEngine::default();
        let ids = vec!["arithmetic.unchecked_overflow".to_string()];
        engine.learn(&accepted_summary(), &ids);
        let boosted = engine.confidence_weight(&ids[0]).unwrap();
        assert!((boosted - 0.7 * 1.05).abs() < 1e-9);

        let rejected = ValidationSummary::from_rounds(PlanId::new(), vec![]);
        engine.learn(&rejected, &ids);
        // 1 success, 1 failure.
        let guard = engine.patterns.read();
        let state = guard.get(&ids[0]).unwrap();
        assert!((state.false_positive_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn weight_boost_is_capped_at_one() {
        let engine = PatternEngine::default();
        let ids = vec!["access_control.unprotected_privileged".to_string()];
        for _ in 0..20 {
            engine.learn(&accepted_summary(), &ids);
        }
        assert!(engine.confidence_weight(&ids[0]).unwrap() <= 1.0);
    }

    #[test]
    fn uncovered_signature_births_pattern_after_three_targets() {
        let engine = PatternEngine::default();
        let sig = UncoveredSignature::DonationSkewsShares;
        assert!(engine
            .record_uncovered(sig, "VaultA", VulnerabilityClass::FlashLoan)
            .is_none());
        assert!(engine
            .record_uncovered(sig, "VaultB", VulnerabilityClass::FlashLoan)
            .is_none());
        let born = engine
            .record_uncovered(sig, "VaultC", VulnerabilityClass::FlashLoan)
            .expect("pattern born");
        assert!(engine.is_learned(&born));
        assert!((engine.confidence_weight(&born).unwrap() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn learned_pattern_matches_the_combination_that_birthed_it() {
        let engine = Arc::new(PatternEngine::default());
        let sig = UncoveredSignature::ControllableCallNoLateWrite;
        for target in ["VaultA", "VaultB", "VaultC"] {
            engine.record_uncovered(sig, target, VulnerabilityClass::Reentrancy);
        }

        // Controllable call, no write after it: the builtin reentrancy
        // detector stays silent, the learned pattern fires.
        let f = FunctionFact {
            name: "claim".to_string(),
            calls: vec![],
            external_calls: vec![ExternalCall {
                callee: "msg.sender".to_string(),
                attacker_controllable: true,
                transfers_value: false,
            }],
            state_writes: vec![("claimed".to_string(), StateMutation::BeforeExternalCall)],
            guards: vec![],
            permissionless: true,
            reads_external_price: false,
            unchecked_arithmetic: false,
        };
        let matches = engine.match_facts(&snapshot(vec![f])).await;
        let learned = matches
            .iter()
            .find(|m| m.pattern_id == "learned.controllable_call_no_late_write")
            .expect("learned pattern match");
        assert_eq!(learned.target_ref, "Vault.claim");
        assert!((learned.confidence - 0.6).abs() < 1e-9);
        assert!(matches
            .iter()
            .all(|m| m.pattern_id != "reentrancy.state_after_call"));
    }

    #[tokio::test]
    async fn learned_pattern_does_not_duplicate_builtin_coverage() {
        let engine = Arc::new(PatternEngine::default());
        let sig = UncoveredSignature::ControllableCallNoLateWrite;
        for target in ["VaultA", "VaultB", "VaultC"] {
            engine.record_uncovered(sig, target, VulnerabilityClass::Reentrancy);
        }

        // Write after the controllable call: builtin reentrancy covers
        // it and the learned predicate stays silent.
        let matches = engine.match_facts(&snapshot(vec![vulnerable_withdraw()])).await;
        assert!(matches
            .iter()
            .any(|m| m.pattern_id == "reentrancy.state_after_call"));
        assert!(matches
            .iter()
            .all(|m| m.pattern_id != "learned.controllable_call_no_late_write"));
    }

    #[test]
    fn hypotheses_group_by_class_and_target() {
        let matches = vec![
            PatternMatch {
                pattern_id: "reentrancy.state_after_call".to_string(),
                vulnerability_class: VulnerabilityClass::Reentrancy,
                target_ref: "Vault.withdraw".to_string(),
                base_match: 1.0,
                confidence: 0.9,
            },
            PatternMatch {
                pattern_id: "access_control.unprotected_privileged".to_string(),
                vulnerability_class: VulnerabilityClass::Reentrancy,
                target_ref: "Vault.withdraw".to_string(),
                base_match: 1.0,
                confidence: 0.6,
            },
        ];
        let hypotheses = hypotheses_from_matches(&matches);
        assert_eq!(hypotheses.len(), 1);
        assert_eq!(hypotheses[0].supporting_patterns.len(), 2);
        assert!((hypotheses[0].confidence - 0.9).abs() < 1e-9);
    }
}
