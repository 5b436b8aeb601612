// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Pool
//!
//! Six fixed-role agents deliberate over the same task and return
//! independent proposals. Each agent consults the reasoning provider at
//! its role's temperature; when the provider times out or returns
//! something unparseable the agent degrades to a pattern-only proposal
//! with dampened confidence rather than failing the round.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::error::EngineError;
use crate::domain::facts::FactSnapshot;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::plan::AttackPlan;
use crate::domain::proposal::{AgentRole, Proposal, Verdict};
use crate::domain::reasoning::{ReasoningProvider, ReasoningRequest};

use super::pattern_engine::PatternMatch;

/// Confidence multiplier applied when an agent falls back to pattern
/// evidence alone.
const FALLBACK_DAMPENING: f64 = 0.5;

/// What a round deliberates over: a hypothesis, optionally the plan
/// realizing it, and the pattern evidence that produced it.
#[derive(Debug, Clone)]
pub struct AgentTask {
    pub snapshot: Arc<FactSnapshot>,
    pub hypothesis: Hypothesis,
    pub plan: Option<AttackPlan>,
    pub matches: Vec<PatternMatch>,
}

/// One deliberating participant in the orchestration hierarchy.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn propose(&self, task: &AgentTask) -> Result<Proposal, EngineError>;
}

/// Provider-backed agent for a fixed role.
pub struct RoleAgent {
    role: AgentRole,
    provider: Arc<dyn ReasoningProvider>,
}

impl RoleAgent {
    pub fn new(role: AgentRole, provider: Arc<dyn ReasoningProvider>) -> Self {
        Self { role, provider }
    }

    /// Build the full six-role pool over one provider.
    pub fn pool(provider: Arc<dyn ReasoningProvider>) -> Vec<Arc<dyn Agent>> {
        AgentRole::ALL
            .iter()
            .map(|&role| Arc::new(RoleAgent::new(role, Arc::clone(&provider))) as Arc<dyn Agent>)
            .collect()
    }

    fn system_framing(&self) -> &'static str {
        match self.role {
            AgentRole::Analyst => {
                "You analyze contract facts for concrete vulnerability evidence. \
                 Be precise and cite the facts you rely on."
            }
            AgentRole::Explorer => {
                "You look for unconventional attack angles others would miss. \
                 Novelty over certainty."
            }
            AgentRole::Validator => {
                "You are the skeptic. Find the reason the claimed exploit would \
                 fail in practice."
            }
            AgentRole::Synthesizer => {
                "You combine the evidence into a coherent economic attack story \
                 and judge whether it holds together."
            }
            AgentRole::Adversary => {
                "You think like the attacker: is this worth executing, and what \
                 is the realistic payoff?"
            }
            AgentRole::MemoryKeeper => {
                "You judge this claim against precedent: has this shape of \
                 attack worked before, and where did it break?"
            }
        }
    }

    fn task_payload(&self, task: &AgentTask) -> String {
        json!({
            "target": task.snapshot.target,
            "hypothesis": task.hypothesis,
            "plan": task.plan,
            "pattern_matches": task.matches,
            "instructions": "Respond with a single JSON object: \
                {\"verdict\": \"pursue\"|\"reject\"|\"revise\", \
                \"confidence\": <0..1>, \"rationale\": \"...\"}",
        })
        .to_string()
    }

    /// Pattern-only degraded proposal; `None` when there is no evidence
    /// to stand on.
    fn fallback(&self, task: &AgentTask) -> Option<Proposal> {
        let strongest = task
            .matches
            .iter()
            .map(|m| m.confidence)
            .fold(f64::NEG_INFINITY, f64::max);
        if !strongest.is_finite() || strongest <= 0.0 {
            return None;
        }
        Some(Proposal {
            agent_role: self.role,
            plan_id: task.plan.as_ref().map(|p| p.id),
            hypothesis_id: Some(task.hypothesis.id),
            verdict: Verdict::Pursue,
            rationale: "degraded: pattern evidence only".to_string(),
            confidence: (strongest * FALLBACK_DAMPENING).clamp(0.0, 1.0),
        })
    }
}

#[derive(Deserialize, Serialize)]
struct ProposalWire {
    verdict: String,
    confidence: f64,
    rationale: String,
}

/// Extract the first JSON object from provider output. Providers wrap
/// answers in prose often enough that strict parsing loses rounds.
fn parse_proposal(content: &str) -> Option<ProposalWire> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

fn parse_verdict(raw: &str) -> Option<Verdict> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pursue" => Some(Verdict::Pursue),
        "reject" => Some(Verdict::Reject),
        "revise" => Some(Verdict::Revise),
        _ => None,
    }
}

#[async_trait]
impl Agent for RoleAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn propose(&self, task: &AgentTask) -> Result<Proposal, EngineError> {
        let request =
            ReasoningRequest::for_role(self.role, self.system_framing(), self.task_payload(task));
        match self.provider.complete(request).await {
            Ok(response) => {
                if let Some(wire) = parse_proposal(&response.content) {
                    if let Some(verdict) = parse_verdict(&wire.verdict) {
                        debug!(role = %self.role.as_str(), verdict = %verdict.as_str(), "proposal received");
                        return Ok(Proposal {
                            agent_role: self.role,
                            plan_id: task.plan.as_ref().map(|p| p.id),
                            hypothesis_id: Some(task.hypothesis.id),
                            verdict,
                            rationale: wire.rationale,
                            confidence: wire.confidence.clamp(0.0, 1.0),
                        });
                    }
                }
                warn!(role = %self.role.as_str(), "unparseable provider output, degrading");
            }
            Err(err) => {
                warn!(role = %self.role.as_str(), error = %err, "provider failed, degrading");
            }
        }
        self.fallback(task).ok_or_else(|| EngineError::ProposeFailed {
            role: self.role.as_str().to_string(),
            reason: "provider failed and no pattern evidence to fall back on".to_string(),
        })
    }
}
