// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Hierarchical Orchestrator
//!
//! Three-level consensus over the agent pool:
//!
//! 1. **Leaf** — every agent proposes concurrently under a round
//!    timeout; late or failed agents are excluded. The survivors reduce
//!    to a flat weighted-majority decision over the whole pool.
//! 2. **Meta** — proposals group by decision domain; each domain takes
//!    the weighted-majority verdict, weight = confidence × role trust.
//! 3. **Root** — the same reduction over the domain decisions. Below
//!    the confidence threshold the orchestrator re-proposes once, then
//!    surfaces the highest-confidence single domain outcome as a
//!    degraded decision.
//!
//! Every tie is broken lexically (role wire name at leaf/meta, domain
//! name at root) so repeated runs over the same proposals reduce
//! identically regardless of task scheduling.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::domain::error::EngineError;
use crate::domain::proposal::{
    Decision, DecisionDomain, DecisionLevel, Proposal, Verdict,
};

use super::agents::{Agent, AgentTask};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-agent proposal timeout for one round.
    pub round_timeout: Duration,
    /// Minimum root consensus confidence before degrading.
    pub min_root_confidence: f64,
    /// Bounded re-proposal rounds after a below-threshold root.
    pub max_retries: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            round_timeout: Duration::from_secs(30),
            min_root_confidence: 0.6,
            max_retries: 1,
        }
    }
}

pub struct HierarchicalOrchestrator {
    agents: Vec<Arc<dyn Agent>>,
    config: OrchestratorConfig,
}

impl HierarchicalOrchestrator {
    pub fn new(agents: Vec<Arc<dyn Agent>>, config: OrchestratorConfig) -> Self {
        Self { agents, config }
    }

    /// Run the full hierarchy for one task.
    pub async fn decide(&self, task: &AgentTask) -> Result<Decision, EngineError> {
        let mut best: Option<Decision> = None;
        for attempt in 0..=self.config.max_retries {
            counter!("argus_orchestrator_rounds_total").increment(1);
            let leaf = self.leaf_round(task).await;
            if leaf.aggregated_proposals.is_empty() {
                warn!(attempt, "no agent produced a proposal this round");
                continue;
            }
            let domain_decisions = meta_reduce(&leaf.aggregated_proposals);
            let root = root_reduce(&domain_decisions, &leaf.aggregated_proposals);
            if root.outcome != leaf.outcome {
                debug!(
                    flat = %leaf.outcome.as_str(),
                    hierarchical = %root.outcome.as_str(),
                    "domain grouping overrode the flat majority"
                );
            }
            if root.consensus_confidence >= self.config.min_root_confidence {
                info!(
                    outcome = %root.outcome.as_str(),
                    confidence = root.consensus_confidence,
                    attempt,
                    "root consensus reached"
                );
                counter!("argus_orchestrator_consensus_total").increment(1);
                return Ok(root);
            }
            debug!(
                confidence = root.consensus_confidence,
                attempt, "root consensus below threshold"
            );
            if best
                .as_ref()
                .map_or(true, |b| root.consensus_confidence > b.consensus_confidence)
            {
                best = Some(root);
            }
        }

        // Degrade: surface the strongest single domain outcome as a
        // low-confidence root decision.
        let degraded = best.and_then(|root| {
            let proposals: Vec<Proposal> = root.aggregated_proposals;
            let domains = meta_reduce(&proposals);
            domains
                .into_iter()
                .max_by(|(da, a), (db, b)| {
                    a.consensus_confidence
                        .total_cmp(&b.consensus_confidence)
                        // Lexically smaller name wins, so it must
                        // compare as the maximum here.
                        .then_with(|| db.as_str().cmp(da.as_str()))
                })
                .map(|(domain, decision)| Decision {
                    level: DecisionLevel::Root,
                    domain: Some(domain),
                    aggregated_proposals: proposals,
                    outcome: decision.outcome,
                    consensus_confidence: decision.consensus_confidence,
                    degraded: true,
                })
        });
        match degraded {
            Some(decision) => {
                counter!("argus_orchestrator_degraded_total").increment(1);
                warn!(
                    domain = decision.domain.map(|d| d.as_str()).unwrap_or("none"),
                    confidence = decision.consensus_confidence,
                    "degraded to single-domain outcome"
                );
                Ok(decision)
            }
            None => Err(EngineError::NoConsensus {
                best_confidence: 0.0,
            }),
        }
    }

    /// Fan all agents out concurrently; exclude timeouts and failures.
    /// The surviving proposals reduce to a flat leaf-level decision.
    async fn leaf_round(&self, task: &AgentTask) -> Decision {
        let futures = self.agents.iter().map(|agent| {
            let agent = Arc::clone(agent);
            let timeout = self.config.round_timeout;
            async move {
                let role = agent.role();
                match tokio::time::timeout(timeout, agent.propose(task)).await {
                    Ok(Ok(proposal)) => Some(proposal),
                    Ok(Err(err)) => {
                        warn!(role = %role.as_str(), error = %err, "agent excluded from round");
                        counter!("argus_orchestrator_agent_failures_total").increment(1);
                        None
                    }
                    Err(_) => {
                        warn!(role = %role.as_str(), "agent timed out, excluded from round");
                        counter!("argus_orchestrator_agent_timeouts_total").increment(1);
                        None
                    }
                }
            }
        });
        let proposals: Vec<Proposal> =
            join_all(futures).await.into_iter().flatten().collect();
        leaf_reduce(proposals)
    }
}

/// Reduce one round's surviving proposals into the leaf decision: the
/// flat weighted majority over the whole pool, before any domain
/// grouping.
fn leaf_reduce(mut proposals: Vec<Proposal>) -> Decision {
    // Stable deliberation order independent of completion order.
    proposals.sort_by(|a, b| a.agent_role.as_str().cmp(b.agent_role.as_str()));
    let members: Vec<&Proposal> = proposals.iter().collect();
    let (outcome, consensus_confidence) = weighted_majority(&members);
    Decision {
        level: DecisionLevel::Leaf,
        domain: None,
        aggregated_proposals: proposals,
        outcome,
        consensus_confidence,
        degraded: false,
    }
}

/// Weighted-majority reduction of one proposal group. Returns the
/// winning verdict and its share of total weight. Verdict ties go to
/// the verdict backed by the lexically smallest role name.
fn weighted_majority(proposals: &[&Proposal]) -> (Verdict, f64) {
    let mut by_verdict: BTreeMap<&'static str, (Verdict, f64, &'static str)> = BTreeMap::new();
    let mut total = 0.0;
    for p in proposals {
        let weight = p.weight();
        total += weight;
        let entry = by_verdict
            .entry(p.verdict.as_str())
            .or_insert((p.verdict, 0.0, p.agent_role.as_str()));
        entry.1 += weight;
        if p.agent_role.as_str() < entry.2 {
            entry.2 = p.agent_role.as_str();
        }
    }
    let (verdict, winning, _) = by_verdict
        .into_values()
        .max_by(|(_, wa, ra), (_, wb, rb)| wa.total_cmp(wb).then_with(|| rb.cmp(ra)))
        .unwrap_or((Verdict::Reject, 0.0, ""));
    let confidence = if total > 0.0 { winning / total } else { 0.0 };
    (verdict, confidence)
}

/// Reduce proposals into per-domain decisions. Empty domains are
/// skipped. Iterates in lexical domain order.
fn meta_reduce(proposals: &[Proposal]) -> Vec<(DecisionDomain, Decision)> {
    let mut domains: Vec<DecisionDomain> = DecisionDomain::ALL.to_vec();
    domains.sort_by_key(|d| d.as_str());
    domains
        .into_iter()
        .filter_map(|domain| {
            let members: Vec<&Proposal> = proposals
                .iter()
                .filter(|p| p.agent_role.domain() == domain)
                .collect();
            if members.is_empty() {
                return None;
            }
            let (outcome, consensus_confidence) = weighted_majority(&members);
            Some((
                domain,
                Decision {
                    level: DecisionLevel::Meta,
                    domain: Some(domain),
                    aggregated_proposals: members.into_iter().cloned().collect(),
                    outcome,
                    consensus_confidence,
                    degraded: false,
                },
            ))
        })
        .collect()
}

/// Reduce domain decisions into the root decision, weighting each
/// domain by its own consensus confidence. Ties go to the lexically
/// smallest domain name.
fn root_reduce(domains: &[(DecisionDomain, Decision)], proposals: &[Proposal]) -> Decision {
    let mut by_verdict: BTreeMap<&'static str, (Verdict, f64, &'static str)> = BTreeMap::new();
    let mut total = 0.0;
    for (domain, decision) in domains {
        let weight = decision.consensus_confidence;
        total += weight;
        let entry = by_verdict
            .entry(decision.outcome.as_str())
            .or_insert((decision.outcome, 0.0, domain.as_str()));
        entry.1 += weight;
        if domain.as_str() < entry.2 {
            entry.2 = domain.as_str();
        }
    }
    let (outcome, winning, _) = by_verdict
        .into_values()
        .max_by(|(_, wa, da), (_, wb, db)| wa.total_cmp(wb).then_with(|| db.cmp(da)))
        .unwrap_or((Verdict::Reject, 0.0, ""));
    let consensus_confidence = if total > 0.0 { winning / total } else { 0.0 };
    Decision {
        level: DecisionLevel::Root,
        domain: None,
        aggregated_proposals: proposals.to_vec(),
        outcome,
        consensus_confidence,
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::facts::FactSnapshot;
    use crate::domain::hypothesis::{Hypothesis, VulnerabilityClass};
    use crate::domain::proposal::AgentRole;
    use async_trait::async_trait;

    struct FixedAgent {
        role: AgentRole,
        verdict: Verdict,
        confidence: f64,
    }

    #[async_trait]
    impl Agent for FixedAgent {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn propose(&self, task: &AgentTask) -> Result<Proposal, EngineError> {
            Ok(Proposal {
                agent_role: self.role,
                plan_id: None,
                hypothesis_id: Some(task.hypothesis.id),
                verdict: self.verdict,
                rationale: String::new(),
                confidence: self.confidence,
            })
        }
    }

    struct StalledAgent {
        role: AgentRole,
    }

    #[async_trait]
    impl Agent for StalledAgent {
        fn role(&self) -> AgentRole {
            self.role
        }

        async fn propose(&self, _task: &AgentTask) -> Result<Proposal, EngineError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn task() -> AgentTask {
        AgentTask {
            snapshot: Arc::new(FactSnapshot {
                target: "Vault".to_string(),
                version: "1".to_string(),
                functions: vec![],
                state_variables: vec![],
                total_value_locked: 0.0,
                flash_loanable: false,
                has_governance: false,
            }),
            hypothesis: Hypothesis::new(
                VulnerabilityClass::Reentrancy,
                "Vault.withdraw",
                AgentRole::Analyst,
                0.9,
            ),
            plan: None,
            matches: vec![],
        }
    }

    fn fixed(role: AgentRole, verdict: Verdict, confidence: f64) -> Arc<dyn Agent> {
        Arc::new(FixedAgent {
            role,
            verdict,
            confidence,
        })
    }

    fn unanimous_pool(verdict: Verdict, confidence: f64) -> Vec<Arc<dyn Agent>> {
        AgentRole::ALL
            .iter()
            .map(|&role| fixed(role, verdict, confidence))
            .collect()
    }

    #[tokio::test]
    async fn unanimous_pool_reaches_full_consensus() {
        let orchestrator =
            HierarchicalOrchestrator::new(unanimous_pool(Verdict::Pursue, 0.9), OrchestratorConfig::default());
        let decision = orchestrator.decide(&task()).await.expect("decision");
        assert_eq!(decision.level, DecisionLevel::Root);
        assert_eq!(decision.outcome, Verdict::Pursue);
        assert!((decision.consensus_confidence - 1.0).abs() < 1e-9);
        assert!(!decision.degraded);
    }

    #[tokio::test]
    async fn reduction_is_deterministic_over_a_fixed_proposal_set() {
        let agents = vec![
            fixed(AgentRole::Analyst, Verdict::Pursue, 0.9),
            fixed(AgentRole::Validator, Verdict::Reject, 0.9),
            fixed(AgentRole::Adversary, Verdict::Pursue, 0.7),
            fixed(AgentRole::Synthesizer, Verdict::Pursue, 0.7),
            fixed(AgentRole::Explorer, Verdict::Revise, 0.8),
            fixed(AgentRole::MemoryKeeper, Verdict::Revise, 0.8),
        ];
        let orchestrator =
            HierarchicalOrchestrator::new(agents, OrchestratorConfig::default());
        let first = orchestrator.decide(&task()).await.expect("decision");
        for _ in 0..10 {
            let again = orchestrator.decide(&task()).await.expect("decision");
            assert_eq!(again.outcome, first.outcome);
            assert!((again.consensus_confidence - first.consensus_confidence).abs() < 1e-12);
            assert_eq!(again.degraded, first.degraded);
        }
    }

    #[test]
    fn leaf_reduce_takes_the_flat_majority_in_role_order() {
        let proposal = |role: AgentRole, verdict, confidence| Proposal {
            agent_role: role,
            plan_id: None,
            hypothesis_id: None,
            verdict,
            rationale: String::new(),
            confidence,
        };
        let leaf = leaf_reduce(vec![
            proposal(AgentRole::Validator, Verdict::Pursue, 0.9),
            proposal(AgentRole::Adversary, Verdict::Reject, 0.4),
            proposal(AgentRole::Analyst, Verdict::Pursue, 0.9),
        ]);

        assert_eq!(leaf.level, DecisionLevel::Leaf);
        assert_eq!(leaf.domain, None);
        assert_eq!(leaf.outcome, Verdict::Pursue);
        assert!(!leaf.degraded);
        // pursue weight 0.9 + 0.9×0.95 over total 2.095
        let expected = (0.9 + 0.9 * 0.95) / (0.9 + 0.9 * 0.95 + 0.4 * 0.85);
        assert!((leaf.consensus_confidence - expected).abs() < 1e-9);
        let order: Vec<&str> = leaf
            .aggregated_proposals
            .iter()
            .map(|p| p.agent_role.as_str())
            .collect();
        assert_eq!(order, vec!["adversary", "analyst", "validator"]);
    }

    #[tokio::test]
    async fn timed_out_agent_is_excluded_not_fatal() {
        let mut agents: Vec<Arc<dyn Agent>> = vec![Arc::new(StalledAgent {
            role: AgentRole::Explorer,
        })];
        for &role in AgentRole::ALL.iter().filter(|r| **r != AgentRole::Explorer) {
            agents.push(fixed(role, Verdict::Pursue, 0.9));
        }
        let orchestrator = HierarchicalOrchestrator::new(
            agents,
            OrchestratorConfig {
                round_timeout: Duration::from_millis(50),
                ..OrchestratorConfig::default()
            },
        );
        let decision = orchestrator.decide(&task()).await.expect("decision");
        assert_eq!(decision.outcome, Verdict::Pursue);
        assert_eq!(decision.aggregated_proposals.len(), 5);
    }

    #[tokio::test]
    async fn split_pool_degrades_to_strongest_domain() {
        // Security pursues strongly, economic rejects strongly,
        // creative revises weakly: no verdict reaches 0.6 at root.
        let agents = vec![
            fixed(AgentRole::Analyst, Verdict::Pursue, 0.9),
            fixed(AgentRole::Validator, Verdict::Pursue, 0.9),
            fixed(AgentRole::Adversary, Verdict::Reject, 0.9),
            fixed(AgentRole::Synthesizer, Verdict::Reject, 0.9),
            fixed(AgentRole::Explorer, Verdict::Revise, 0.4),
            fixed(AgentRole::MemoryKeeper, Verdict::Revise, 0.4),
        ];
        let orchestrator =
            HierarchicalOrchestrator::new(agents, OrchestratorConfig::default());
        let decision = orchestrator.decide(&task()).await.expect("decision");
        assert!(decision.degraded);
        assert!(decision.domain.is_some());
        assert!((decision.consensus_confidence - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_pool_is_no_consensus() {
        let orchestrator = HierarchicalOrchestrator::new(vec![], OrchestratorConfig::default());
        let err = orchestrator.decide(&task()).await.expect_err("no agents");
        assert!(matches!(err, EngineError::NoConsensus { .. }));
    }
}
