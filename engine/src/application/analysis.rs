// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Analysis Pipeline
//!
//! End-to-end run over one fact snapshot: pattern matching →
//! hypotheses → planning → hierarchical consensus → fork validation →
//! severity scoring → report hand-off.
//!
//! Failure isolation: one hypothesis failing at any stage never
//! discards the run; the pipeline logs it and moves on. The overall
//! deadline cancels top-down and completed reports survive it.
//!
//! After every validation the pipeline closes the learning loop:
//! hypothesis, plan, and validation lineage is written to the discovery
//! memory (validated exploits protected), contributing memories are
//! reinforced, and the pattern catalogue receives the outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use metrics::counter;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use argus_memory::{Embedder, MemoryEntry, MemoryKind, MemoryStore};

use crate::domain::error::EngineError;
use crate::domain::facts::FactSnapshot;
use crate::domain::hypothesis::Hypothesis;
use crate::domain::plan::AttackPlan;
use crate::domain::proposal::Verdict;
use crate::domain::report::{ExploitReport, ReportSink};
use crate::domain::validation::ValidationSummary;

use super::agents::AgentTask;
use super::fork_validator::ForkValidator;
use super::orchestrator::HierarchicalOrchestrator;
use super::pattern_engine::{
    hypotheses_from_matches, PatternEngine, PatternMatch, UncoveredSignature,
};
use super::planner::PlanningEngine;
use super::scorer::severity;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Overall wall-clock budget; `None` runs unbounded.
    pub deadline: Option<Duration>,
    /// Hypotheses processed concurrently.
    pub planning_workers: usize,
    /// Importance feedback applied to memories that contributed to an
    /// accepted exploit.
    pub reinforce_delta: f64,
    /// Neighbours reinforced per accepted exploit.
    pub reinforce_k: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            deadline: None,
            planning_workers: 2,
            reinforce_delta: 0.1,
            reinforce_k: 5,
        }
    }
}

pub struct AnalysisEngine {
    patterns: Arc<PatternEngine>,
    planner: Arc<PlanningEngine>,
    orchestrator: Arc<HierarchicalOrchestrator>,
    validator: Arc<ForkValidator>,
    memory: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    sink: Arc<dyn ReportSink>,
    config: AnalysisConfig,
}

impl AnalysisEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patterns: Arc<PatternEngine>,
        planner: Arc<PlanningEngine>,
        orchestrator: Arc<HierarchicalOrchestrator>,
        validator: Arc<ForkValidator>,
        memory: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        sink: Arc<dyn ReportSink>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            patterns,
            planner,
            orchestrator,
            validator,
            memory,
            embedder,
            sink,
            config,
        }
    }

    /// Analyze one snapshot. Returns every report that survived
    /// validation before the deadline; an empty vector is a valid
    /// outcome, not an error.
    pub async fn analyze(
        &self,
        snapshot: Arc<FactSnapshot>,
    ) -> Result<Vec<ExploitReport>, EngineError> {
        let cancel = CancellationToken::new();
        let deadline_guard = self.config.deadline.map(|budget| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                warn!("analysis deadline reached, cancelling remaining work");
                cancel.cancel();
            })
        });

        let matches = self.patterns.match_facts(&snapshot).await;
        self.track_uncovered(&snapshot, &matches);
        let hypotheses = hypotheses_from_matches(&matches);
        info!(
            target = %snapshot.target,
            matches = matches.len(),
            hypotheses = hypotheses.len(),
            "analysis started"
        );

        let mut reports = Vec::new();
        let mut pipeline = stream::iter(hypotheses.into_iter().map(|hypothesis| {
            let snapshot = Arc::clone(&snapshot);
            let matches = matches.clone();
            let cancel = cancel.clone();
            async move { self.process(snapshot, hypothesis, matches, cancel).await }
        }))
        .buffer_unordered(self.config.planning_workers.max(1));

        loop {
            tokio::select! {
                next = pipeline.next() => match next {
                    Some(Some(report)) => reports.push(report),
                    Some(None) => {}
                    None => break,
                },
                _ = cancel.cancelled() => break,
            }
        }

        // The timer must not outlive the analysis it guards.
        if let Some(guard) = deadline_guard {
            guard.abort();
        }

        // Stable output order regardless of worker completion order.
        reports.sort_by(|a, b| {
            b.severity_score
                .cmp(&a.severity_score)
                .then_with(|| a.hypothesis.target_ref.cmp(&b.hypothesis.target_ref))
        });
        info!(reports = reports.len(), "analysis finished");
        Ok(reports)
    }

    /// One hypothesis through planning, consensus, validation, and
    /// learning. `None` means it was dropped along the way.
    async fn process(
        &self,
        snapshot: Arc<FactSnapshot>,
        hypothesis: Hypothesis,
        matches: Vec<PatternMatch>,
        cancel: CancellationToken,
    ) -> Option<ExploitReport> {
        let supporting: Vec<PatternMatch> = matches
            .into_iter()
            .filter(|m| hypothesis.supporting_patterns.contains(&m.pattern_id))
            .collect();

        let plan = match self.planner.plan(&hypothesis, &snapshot).await {
            Ok(plan) => plan,
            Err(err) => {
                warn!(target = %hypothesis.target_ref, error = %err, "planning failed, hypothesis dropped");
                counter!("argus_analysis_planning_failures_total").increment(1);
                return None;
            }
        };

        let task = AgentTask {
            snapshot: Arc::clone(&snapshot),
            hypothesis: hypothesis.clone(),
            plan: Some(plan.clone()),
            matches: supporting,
        };
        let decision = match self.orchestrator.decide(&task).await {
            Ok(decision) => decision,
            Err(err) => {
                warn!(target = %hypothesis.target_ref, error = %err, "consensus failed, hypothesis dropped");
                return None;
            }
        };
        if decision.outcome != Verdict::Pursue {
            debug!(
                target = %hypothesis.target_ref,
                outcome = %decision.outcome.as_str(),
                "consensus declined to pursue"
            );
            return None;
        }

        let rounds = self.validator.validate(&plan, &cancel).await;
        if rounds.is_empty() {
            return None;
        }
        let summary = self.validator.summarize(&plan, rounds);

        let pattern_ids: Vec<String> = hypothesis.supporting_patterns.iter().cloned().collect();
        self.patterns.learn(&summary, &pattern_ids);

        if !summary.accepted {
            debug!(target = %hypothesis.target_ref, "plan rejected by validation");
            self.record_lineage(&hypothesis, &plan, &summary).await;
            return None;
        }

        self.record_lineage(&hypothesis, &plan, &summary).await;
        self.reinforce_contributors(&hypothesis).await;

        let severity_score = severity(&summary, &snapshot);
        let report = ExploitReport {
            target: snapshot.target.clone(),
            hypothesis,
            plan,
            validation: summary,
            severity_score,
            contributing_patterns: pattern_ids,
            generated_at: Utc::now(),
        };
        if let Err(err) = self.sink.deliver(&report).await {
            warn!(error = %err, "report delivery failed, keeping report in results");
        }
        counter!("argus_analysis_reports_total").increment(1);
        Some(report)
    }

    /// Write hypothesis → plan → validation lineage into memory.
    /// Validated exploits are protected from eviction.
    async fn record_lineage(
        &self,
        hypothesis: &Hypothesis,
        plan: &AttackPlan,
        summary: &ValidationSummary,
    ) {
        let protected = summary.accepted;
        let importance = if protected { 0.9 } else { 0.4 };

        let hypothesis_entry = MemoryEntry::new(
            MemoryKind::Episodic,
            self.embedder.embed(&hypothesis.embedding_text()),
            json!({
                "hypothesis_id": hypothesis.id,
                "class": hypothesis.vulnerability_class.as_str(),
                "target_ref": hypothesis.target_ref,
            }),
        )
        .with_importance(importance);
        let plan_entry = MemoryEntry::new(
            MemoryKind::Plan,
            self.embedder
                .embed(&format!("plan {}", hypothesis.embedding_text())),
            json!({
                "plan_id": plan.id,
                "signature": plan.structure_signature(),
                "accepted": summary.accepted,
                "estimated_cost": plan.estimated_cost,
            }),
        )
        .with_importance(importance);
        let validation_entry = MemoryEntry::new(
            MemoryKind::Episodic,
            self.embedder
                .embed(&format!("validation {}", hypothesis.embedding_text())),
            json!({
                "plan_id": plan.id,
                "accepted": summary.accepted,
                "success_rounds": summary.success_rounds,
                "observed_impact": summary.observed_impact,
            }),
        )
        .with_importance(importance);

        let entries = if protected {
            [
                hypothesis_entry.protected(),
                plan_entry.protected(),
                validation_entry.protected(),
            ]
        } else {
            [hypothesis_entry, plan_entry, validation_entry]
        };

        let mut ids = Vec::with_capacity(3);
        for entry in entries {
            match self.memory.put(entry).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    warn!(error = %err, "lineage write failed");
                    return;
                }
            }
        }
        for pair in ids.windows(2) {
            if let Err(err) = self.memory.link(pair[0], pair[1]).await {
                warn!(error = %err, "lineage link failed");
            }
        }
    }

    /// Reward the memories most similar to an accepted exploit.
    async fn reinforce_contributors(&self, hypothesis: &Hypothesis) {
        let query = self.embedder.embed(&hypothesis.embedding_text());
        let neighbours = match self.memory.recall(&query, self.config.reinforce_k, None).await {
            Ok(n) => n,
            Err(err) => {
                warn!(error = %err, "contributor recall failed");
                return;
            }
        };
        for (entry, _) in neighbours {
            if let Err(err) = self.memory.reinforce(entry.id, self.config.reinforce_delta).await {
                debug!(error = %err, "reinforcement skipped");
            }
        }
    }

    /// Track suspicious fact combinations the catalogue did not cover,
    /// feeding eventual pattern birth.
    fn track_uncovered(&self, snapshot: &FactSnapshot, matches: &[PatternMatch]) {
        use crate::domain::facts::StateMutation;

        for function in snapshot.permissionless_functions() {
            let target_ref = format!("{}.{}", snapshot.target, function.name);
            if matches.iter().any(|m| m.target_ref == target_ref) {
                continue;
            }
            let controllable_call = function
                .external_calls
                .iter()
                .any(|c| c.attacker_controllable);
            let write_after_call = function
                .state_writes
                .iter()
                .any(|(_, m)| *m == StateMutation::AfterExternalCall);
            if controllable_call && !write_after_call {
                self.patterns.record_uncovered(
                    UncoveredSignature::ControllableCallNoLateWrite,
                    &target_ref,
                    crate::domain::hypothesis::VulnerabilityClass::Reentrancy,
                );
            }
        }
    }
}
