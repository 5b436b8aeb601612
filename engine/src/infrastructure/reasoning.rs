// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0
// OpenRouter Reasoning Adapter
//
// Anti-Corruption Layer for the OpenRouter chat-completions API.
// Also works with OpenAI-compatible endpoints (LM Studio, vLLM, etc.)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::reasoning::{
    ReasoningError, ReasoningProvider, ReasoningRequest, ReasoningResponse,
};

pub struct OpenRouterAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    total_tokens: u64,
}

impl OpenRouterAdapter {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ReasoningProvider for OpenRouterAdapter {
    async fn complete(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ReasoningError> {
        // Translate our domain types to the provider's types
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.task,
                },
            ],
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                ReasoningError::Unauthorized(error_text)
            } else if status == 429 {
                ReasoningError::RateLimited(error_text)
            } else if status.is_server_error() {
                ReasoningError::Unavailable(format!("HTTP {}: {}", status, error_text))
            } else {
                ReasoningError::InvalidRequest(format!("HTTP {}: {}", status, error_text))
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;

        // Translate the provider's response back to our domain types
        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| ReasoningError::MalformedResponse("no choices in response".into()))?;

        Ok(ReasoningResponse {
            content: choice.message.content.clone(),
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: parsed.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }

    fn provider_name(&self) -> &str {
        "openrouter"
    }
}
