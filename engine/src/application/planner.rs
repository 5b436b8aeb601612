// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Planning Engine
//!
//! Builds an executable [`AttackPlan`] for a hypothesis by
//! lowest-estimated-cost-first search over per-class action templates.
//! Each template is a sequence of slots (setup, execution, cleanup) with
//! alternative actions per slot; dead ends backtrack to the nearest
//! unexplored sibling through the frontier, never restart.
//!
//! Cost ties are broken by historical success rate recalled from the
//! discovery memory for structurally similar past plans, then by the
//! lexical order of the step sequence so search order is deterministic.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use argus_memory::{Embedder, MemoryKind, MemoryStore};

use crate::domain::error::EngineError;
use crate::domain::facts::FactSnapshot;
use crate::domain::hypothesis::{Hypothesis, VulnerabilityClass};
use crate::domain::plan::{AttackPlan, AttackStep};

#[derive(Debug, Clone)]
pub struct PlanningConfig {
    /// Frontier expansions before the search gives up.
    pub max_steps: usize,
    /// Branches whose cumulative risk exceeds this are pruned.
    pub risk_ceiling: f64,
    /// Neighbours consulted when computing historical action bias.
    pub history_k: usize,
    /// Minimum similarity for a past plan to count as precedent.
    pub history_threshold: f64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            risk_ceiling: 1.0,
            history_k: 8,
            history_threshold: 0.7,
        }
    }
}

#[derive(Clone)]
struct StepTemplate {
    action: &'static str,
    cost: f64,
    risk: f64,
    terminal: bool,
    establishes: &'static str,
}

impl StepTemplate {
    const fn step(action: &'static str, cost: f64, risk: f64, establishes: &'static str) -> Self {
        Self {
            action,
            cost,
            risk,
            terminal: false,
            establishes,
        }
    }

    const fn exit(action: &'static str, cost: f64, risk: f64, establishes: &'static str) -> Self {
        Self {
            action,
            cost,
            risk,
            terminal: true,
            establishes,
        }
    }
}

/// Slots in order; each slot lists alternative actions.
type Template = Vec<Vec<StepTemplate>>;

fn template_for(class: VulnerabilityClass) -> Template {
    use StepTemplate as T;
    match class {
        VulnerabilityClass::Reentrancy => vec![
            vec![
                T::step("deploy_attacker_contract", 2.0, 0.05, "callback_ready"),
                T::step("reuse_existing_contract", 1.0, 0.1, "callback_ready"),
            ],
            vec![T::step("seed_initial_deposit", 1.0, 0.05, "position_open")],
            vec![
                T::step("trigger_reentrant_withdraw", 1.5, 0.2, "balance_drained"),
                T::step("trigger_reentrant_claim", 1.8, 0.15, "balance_drained"),
            ],
            vec![T::exit("drain_and_exit", 1.0, 0.1, "funds_extracted")],
        ],
        VulnerabilityClass::FlashLoan => vec![
            vec![T::step("borrow_flash_liquidity", 1.0, 0.05, "capital_acquired")],
            vec![
                T::step("swap_to_skew_pool", 2.0, 0.2, "state_skewed"),
                T::step("donate_to_inflate_shares", 1.5, 0.25, "state_skewed"),
            ],
            vec![T::step("exploit_mispriced_position", 2.0, 0.2, "value_captured")],
            vec![T::exit("repay_and_keep_profit", 1.0, 0.05, "funds_extracted")],
        ],
        VulnerabilityClass::OracleManipulation => vec![
            vec![
                T::step("borrow_flash_liquidity", 1.0, 0.05, "price_lever_ready"),
                T::step("acquire_price_lever", 2.0, 0.15, "price_lever_ready"),
            ],
            vec![T::step("move_spot_price", 2.5, 0.25, "price_skewed")],
            vec![T::step("act_on_stale_valuation", 1.5, 0.15, "value_captured")],
            vec![T::exit("unwind_position", 1.0, 0.1, "funds_extracted")],
        ],
        VulnerabilityClass::Governance => vec![
            vec![
                T::step("borrow_flash_liquidity", 1.0, 0.05, "voting_power"),
                T::step("accumulate_voting_power", 3.0, 0.2, "voting_power"),
            ],
            vec![T::step("submit_malicious_proposal", 1.0, 0.3, "proposal_live")],
            vec![T::step("force_quorum_and_pass", 2.0, 0.25, "proposal_passed")],
            vec![T::exit("execute_payload", 1.0, 0.15, "funds_extracted")],
        ],
        VulnerabilityClass::AccessControl => vec![
            vec![T::step("locate_unguarded_entry", 0.5, 0.05, "entry_located")],
            vec![
                T::step("invoke_privileged_function", 1.0, 0.2, "privilege_used"),
                T::step("escalate_via_role_grant", 1.5, 0.25, "privilege_used"),
            ],
            vec![T::exit("extract_funds", 1.0, 0.1, "funds_extracted")],
        ],
        VulnerabilityClass::IntegerOverflow => vec![
            vec![T::step("craft_boundary_inputs", 0.5, 0.05, "inputs_ready")],
            vec![T::step("trigger_wraparound", 1.0, 0.25, "balance_corrupted")],
            vec![T::exit("redeem_inflated_balance", 1.0, 0.15, "funds_extracted")],
        ],
    }
}

/// A partial step sequence on the frontier.
struct FrontierNode {
    /// Chosen alternative index per filled slot.
    choices: Vec<usize>,
    cost: f64,
    risk: f64,
    /// Historical bias of the chosen actions, higher preferred on ties.
    bias: f64,
    /// Action names joined, for deterministic lexical tie-break.
    signature: String,
}

impl PartialEq for FrontierNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for FrontierNode {}

impl PartialOrd for FrontierNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierNode {
    // BinaryHeap is a max-heap: "greater" means popped first. Lower
    // cost wins, then higher bias, then lexically smaller signature.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| self.bias.total_cmp(&other.bias))
            .then_with(|| other.signature.cmp(&self.signature))
    }
}

pub struct PlanningEngine {
    config: PlanningConfig,
    memory: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
}

impl PlanningEngine {
    pub fn new(
        config: PlanningConfig,
        memory: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            memory,
            embedder,
        }
    }

    /// Produce the lowest-cost complete plan for the hypothesis.
    pub async fn plan(
        &self,
        hypothesis: &Hypothesis,
        facts: &FactSnapshot,
    ) -> Result<AttackPlan, EngineError> {
        let mut plans = self.search(hypothesis, facts, 1).await?;
        Ok(plans.remove(0))
    }

    /// Produce up to `limit` complete plans in cost order. Plans after
    /// the first reference the best plan through `alternative_of`.
    pub async fn plan_with_alternatives(
        &self,
        hypothesis: &Hypothesis,
        facts: &FactSnapshot,
        limit: usize,
    ) -> Result<Vec<AttackPlan>, EngineError> {
        self.search(hypothesis, facts, limit.max(1)).await
    }

    async fn search(
        &self,
        hypothesis: &Hypothesis,
        facts: &FactSnapshot,
        limit: usize,
    ) -> Result<Vec<AttackPlan>, EngineError> {
        let template = template_for(hypothesis.vulnerability_class);
        let bias = self.action_bias(hypothesis).await;
        let mut frontier = BinaryHeap::new();
        frontier.push(FrontierNode {
            choices: Vec::new(),
            cost: 0.0,
            risk: 0.0,
            bias: 0.0,
            signature: String::new(),
        });

        let mut complete: Vec<AttackPlan> = Vec::new();
        let mut expansions = 0usize;

        while let Some(node) = frontier.pop() {
            expansions += 1;
            if expansions > self.config.max_steps {
                if complete.is_empty() {
                    return Err(EngineError::PlanningExhausted {
                        steps_expanded: expansions - 1,
                    });
                }
                break;
            }

            let slot = node.choices.len();
            if slot == template.len() {
                let plan = self.materialize(hypothesis, facts, &template, &node);
                debug!(
                    signature = %node.signature,
                    cost = node.cost,
                    "complete plan found"
                );
                complete.push(plan);
                if complete.len() >= limit {
                    break;
                }
                continue;
            }

            for (idx, alt) in template[slot].iter().enumerate() {
                let risk = node.risk + alt.risk;
                if risk > self.config.risk_ceiling {
                    continue;
                }
                let signature = if node.signature.is_empty() {
                    alt.action.to_string()
                } else {
                    format!("{} -> {}", node.signature, alt.action)
                };
                let action_bias = bias.get(alt.action).copied().unwrap_or(0.5);
                frontier.push(FrontierNode {
                    choices: node.choices.iter().copied().chain([idx]).collect(),
                    cost: node.cost + alt.cost,
                    risk,
                    bias: node.bias + action_bias,
                    signature,
                });
            }
        }

        if complete.is_empty() {
            return Err(EngineError::PlanningExhausted {
                steps_expanded: expansions,
            });
        }
        let parent = complete[0].id;
        for alt in complete.iter_mut().skip(1) {
            alt.alternative_of = Some(parent);
        }
        Ok(complete)
    }

    fn materialize(
        &self,
        hypothesis: &Hypothesis,
        facts: &FactSnapshot,
        template: &Template,
        node: &FrontierNode,
    ) -> AttackPlan {
        let mut established: Option<&'static str> = None;
        let steps = node
            .choices
            .iter()
            .enumerate()
            .map(|(slot, &idx)| {
                let t = &template[slot][idx];
                let mut step = AttackStep::new(t.action, &hypothesis.target_ref, t.cost, t.risk)
                    .establishes(t.establishes);
                if let Some(prev) = established {
                    step = step.requires(prev);
                }
                step.parameters = json!({ "snapshot_version": facts.version });
                if t.terminal {
                    step = step.terminal();
                }
                established = Some(t.establishes);
                step
            })
            .collect();
        let mut plan = AttackPlan::new(hypothesis.id, steps);
        plan.estimated_risk = node.risk.min(1.0);
        plan
    }

    /// Historical success rate per action, from past plans in memory
    /// structurally similar to this hypothesis. Unknown actions get a
    /// neutral 0.5.
    async fn action_bias(&self, hypothesis: &Hypothesis) -> HashMap<String, f64> {
        let query = self
            .embedder
            .embed(&format!("plan {}", hypothesis.embedding_text()));
        let neighbours = match self
            .memory
            .recall(&query, self.config.history_k, Some(MemoryKind::Plan))
            .await
        {
            Ok(n) => n,
            Err(_) => return HashMap::new(),
        };
        let mut totals: HashMap<String, (u64, u64)> = HashMap::new();
        for (entry, similarity) in neighbours {
            if similarity < self.config.history_threshold {
                continue;
            }
            let accepted = entry.payload["accepted"].as_bool().unwrap_or(false);
            let Some(signature) = entry.payload["signature"].as_str() else {
                continue;
            };
            for action in signature.split(" -> ") {
                let counts = totals.entry(action.to_string()).or_insert((0, 0));
                counts.1 += 1;
                if accepted {
                    counts.0 += 1;
                }
            }
        }
        totals
            .into_iter()
            .map(|(action, (ok, total))| (action, ok as f64 / total.max(1) as f64))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proposal::AgentRole;
    use argus_memory::{
        HashingEmbedder, InMemoryMemoryStore, MemoryStoreConfig, NullEventBus, EMBEDDING_DIM,
    };

    fn engine(config: PlanningConfig) -> PlanningEngine {
        let store = Arc::new(InMemoryMemoryStore::new(
            MemoryStoreConfig::default(),
            Arc::new(NullEventBus),
        ));
        PlanningEngine::new(config, store, Arc::new(HashingEmbedder::new(EMBEDDING_DIM)))
    }

    fn facts() -> FactSnapshot {
        FactSnapshot {
            target: "Vault".to_string(),
            version: "1".to_string(),
            functions: vec![],
            state_variables: vec![],
            total_value_locked: 1_000_000.0,
            flash_loanable: true,
            has_governance: false,
        }
    }

    #[tokio::test]
    async fn picks_the_lowest_cost_branch() {
        let hypothesis = Hypothesis::new(
            VulnerabilityClass::Reentrancy,
            "Vault.withdraw",
            AgentRole::Analyst,
            0.9,
        );
        let plan = engine(PlanningConfig::default())
            .plan(&hypothesis, &facts())
            .await
            .expect("plan");
        assert!(plan.is_complete());
        // reuse_existing_contract (1.0) beats deploy_attacker_contract
        // (2.0) and trigger_reentrant_withdraw (1.5) beats claim (1.8).
        assert_eq!(
            plan.structure_signature(),
            "reuse_existing_contract -> seed_initial_deposit -> trigger_reentrant_withdraw -> drain_and_exit"
        );
        assert!((plan.estimated_cost - 4.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn risk_ceiling_prunes_and_backtracks_to_siblings() {
        let hypothesis = Hypothesis::new(
            VulnerabilityClass::Reentrancy,
            "Vault.withdraw",
            AgentRole::Analyst,
            0.9,
        );
        // Ceiling excludes the cheapest branch: reuse (0.1) + deposit
        // (0.05) + withdraw (0.2) + exit (0.1) = 0.45 > 0.42. The claim
        // sibling keeps cumulative risk at 0.40 and wins instead.
        let plan = engine(PlanningConfig {
            risk_ceiling: 0.42,
            ..PlanningConfig::default()
        })
        .plan(&hypothesis, &facts())
        .await
        .expect("plan");
        assert_eq!(
            plan.structure_signature(),
            "reuse_existing_contract -> seed_initial_deposit -> trigger_reentrant_claim -> drain_and_exit"
        );
    }

    #[tokio::test]
    async fn impossible_ceiling_exhausts_planning() {
        let hypothesis = Hypothesis::new(
            VulnerabilityClass::Governance,
            "Dao.execute",
            AgentRole::Analyst,
            0.8,
        );
        let err = engine(PlanningConfig {
            risk_ceiling: 0.1,
            ..PlanningConfig::default()
        })
        .plan(&hypothesis, &facts())
        .await
        .expect_err("no viable branch");
        assert!(matches!(err, EngineError::PlanningExhausted { .. }));
    }

    #[tokio::test]
    async fn tiny_budget_exhausts_planning() {
        let hypothesis = Hypothesis::new(
            VulnerabilityClass::OracleManipulation,
            "Amm.swap",
            AgentRole::Analyst,
            0.8,
        );
        let err = engine(PlanningConfig {
            max_steps: 2,
            ..PlanningConfig::default()
        })
        .plan(&hypothesis, &facts())
        .await
        .expect_err("budget too small");
        assert!(matches!(err, EngineError::PlanningExhausted { .. }));
    }

    #[tokio::test]
    async fn alternatives_reference_the_best_plan() {
        let hypothesis = Hypothesis::new(
            VulnerabilityClass::FlashLoan,
            "Vault.deposit",
            AgentRole::Analyst,
            0.8,
        );
        let plans = engine(PlanningConfig::default())
            .plan_with_alternatives(&hypothesis, &facts(), 2)
            .await
            .expect("plans");
        assert_eq!(plans.len(), 2);
        assert!(plans[0].alternative_of.is_none());
        assert_eq!(plans[1].alternative_of, Some(plans[0].id));
        assert!(plans[0].estimated_cost <= plans[1].estimated_cost);
    }
}
