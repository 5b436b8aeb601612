// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! Final analysis output and the sink it is delivered through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hypothesis::Hypothesis;
use super::plan::AttackPlan;
use super::validation::ValidationSummary;

/// A validated exploit candidate with its full lineage, ready for a
/// human reviewer. Only plans that survived validation become reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExploitReport {
    pub target: String,
    pub hypothesis: Hypothesis,
    pub plan: AttackPlan,
    pub validation: ValidationSummary,
    /// Funds-at-risk severity in `[0, 100]`.
    pub severity_score: u8,
    /// Pattern ids that contributed to the hypothesis.
    pub contributing_patterns: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Delivery port for finished reports.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, report: &ExploitReport) -> anyhow::Result<()>;
}
