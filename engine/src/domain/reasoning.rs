// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
//! # Reasoning Provider Port
//!
//! Anti-corruption boundary in front of external reasoning backends.
//! Agents speak this port only; provider wire formats stay in the
//! infrastructure adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::proposal::AgentRole;

/// A single reasoning call on behalf of one agent role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningRequest {
    pub role: AgentRole,
    /// Sampling temperature, normally [`AgentRole::temperature`].
    pub temperature: f32,
    /// System framing for the role.
    pub system: String,
    /// Task payload, usually serialized facts plus instructions.
    pub task: String,
}

impl ReasoningRequest {
    pub fn for_role(role: AgentRole, system: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            role,
            temperature: role.temperature(),
            system: system.into(),
            task: task.into(),
        }
    }
}

/// Raw provider output, before proposal parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: u64,
}

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("provider rate limited: {0}")]
    RateLimited(String),
    #[error("provider rejected request: {0}")]
    InvalidRequest(String),
    #[error("provider authentication failed: {0}")]
    Unauthorized(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ReasoningError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReasoningError::RateLimited(_)
                | ReasoningError::Unavailable(_)
                | ReasoningError::Transport(_)
        )
    }
}

/// Port implemented by reasoning backend adapters.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn complete(&self, request: ReasoningRequest) -> Result<ReasoningResponse, ReasoningError>;

    /// Adapter identity for logs and reports.
    fn provider_name(&self) -> &str;
}
