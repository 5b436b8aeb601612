// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! # Argus CLI
//!
//! The `argus` binary runs one analysis: read a fact snapshot, drive
//! the full discovery pipeline, and emit validated exploit reports as
//! JSON lines.
//!
//! With `OPENROUTER_API_KEY` set the agent pool deliberates through the
//! OpenRouter adapter; without it agents degrade to pattern-only
//! proposals, which keeps the pipeline usable offline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use tracing::info;

use argus_engine::{
    AnalysisConfig, AnalysisEngine, ExploitReport, ForkValidator, ForkValidatorConfig,
    HierarchicalOrchestrator, OpenRouterAdapter, OrchestratorConfig, PatternEngine,
    PatternEngineConfig, PlanningConfig, PlanningEngine, ReportSink, RoleAgent, ScriptedSandbox,
    ScriptedSandboxConfig,
};
use argus_engine::domain::facts::FactSnapshot;
use argus_engine::domain::reasoning::{
    ReasoningError, ReasoningProvider, ReasoningRequest, ReasoningResponse,
};
use argus_memory::{
    HashingEmbedder, InMemoryMemoryStore, MemoryMaintenance, MemoryMaintenanceConfig,
    MemoryStore, MemoryStoreConfig, NullEventBus, EMBEDDING_DIM,
};

/// Argus - discover, rank, and validate candidate exploits
#[derive(Parser)]
#[command(name = "argus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the fact snapshot (JSON)
    facts: PathBuf,

    /// Write reports to this file instead of stdout (JSON lines)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Overall analysis deadline in seconds
    #[arg(long, default_value = "300")]
    deadline_secs: u64,

    /// Validation rounds per candidate plan
    #[arg(long, default_value = "5")]
    rounds: usize,

    /// OpenRouter-compatible endpoint for the reasoning provider
    #[arg(
        long,
        env = "ARGUS_REASONING_ENDPOINT",
        default_value = "https://openrouter.ai/api/v1"
    )]
    reasoning_endpoint: String,

    /// Reasoning model identifier
    #[arg(long, env = "ARGUS_REASONING_MODEL", default_value = "deepseek/deepseek-chat")]
    reasoning_model: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "ARGUS_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

/// Provider used when no API key is configured; every call fails as
/// unavailable so agents fall back to pattern evidence.
struct OfflineProvider;

#[async_trait]
impl ReasoningProvider for OfflineProvider {
    async fn complete(
        &self,
        _request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ReasoningError> {
        Err(ReasoningError::Unavailable(
            "no reasoning provider configured".to_string(),
        ))
    }

    fn provider_name(&self) -> &str {
        "offline"
    }
}

/// Writes one JSON object per report to the chosen destination.
struct JsonLinesSink {
    output: Option<PathBuf>,
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    async fn deliver(&self, report: &ExploitReport) -> Result<()> {
        let line = serde_json::to_string(report)?;
        match &self.output {
            Some(path) => {
                use tokio::io::AsyncWriteExt;
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .with_context(|| format!("opening {}", path.display()))?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
            }
            None => println!("{line}"),
        }
        Ok(())
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let raw = tokio::fs::read_to_string(&cli.facts)
        .await
        .with_context(|| format!("reading {}", cli.facts.display()))?;
    let snapshot: Arc<FactSnapshot> =
        Arc::new(serde_json::from_str(&raw).context("parsing fact snapshot")?);
    info!(target = %snapshot.target, version = %snapshot.version, "fact snapshot loaded");

    let memory = Arc::new(InMemoryMemoryStore::new(
        MemoryStoreConfig::default(),
        Arc::new(NullEventBus),
    ));
    let maintenance = Arc::new(MemoryMaintenance::new(
        memory.clone() as Arc<dyn MemoryStore>,
        MemoryMaintenanceConfig::default(),
    ));
    let shutdown = maintenance.shutdown_token();
    let maintenance_handle = maintenance.start();

    let provider: Arc<dyn ReasoningProvider> = match std::env::var("OPENROUTER_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(OpenRouterAdapter::new(
            cli.reasoning_endpoint.clone(),
            key,
            cli.reasoning_model.clone(),
        )),
        _ => {
            info!("OPENROUTER_API_KEY not set, running with pattern-only agents");
            Arc::new(OfflineProvider)
        }
    };

    let embedder = Arc::new(HashingEmbedder::new(EMBEDDING_DIM));
    let patterns = Arc::new(PatternEngine::new(PatternEngineConfig::default()));
    let planner = Arc::new(PlanningEngine::new(
        PlanningConfig::default(),
        memory.clone() as Arc<dyn MemoryStore>,
        embedder.clone(),
    ));
    let orchestrator = Arc::new(HierarchicalOrchestrator::new(
        RoleAgent::pool(provider),
        OrchestratorConfig::default(),
    ));
    let validator = Arc::new(ForkValidator::new(
        Arc::new(ScriptedSandbox::new(ScriptedSandboxConfig {
            extractable_value: snapshot.total_value_locked,
            ..ScriptedSandboxConfig::default()
        })),
        ForkValidatorConfig {
            rounds: cli.rounds,
            ..ForkValidatorConfig::default()
        },
    ));
    let engine = AnalysisEngine::new(
        patterns,
        planner,
        orchestrator,
        validator,
        memory.clone() as Arc<dyn MemoryStore>,
        embedder,
        Arc::new(JsonLinesSink { output: cli.output }),
        AnalysisConfig {
            deadline: Some(Duration::from_secs(cli.deadline_secs)),
            ..AnalysisConfig::default()
        },
    );

    let reports = engine.analyze(snapshot).await?;
    info!(reports = reports.len(), "analysis complete");

    shutdown.cancel();
    let _ = maintenance_handle.await;

    if reports.is_empty() {
        info!("no validated exploits found");
    }
    Ok(())
}
