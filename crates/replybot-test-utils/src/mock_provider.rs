// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use replybot_core::ReplybotError;
use replybot_core::traits::{PluginAdapter, ProviderAdapter};
use replybot_core::types::{AdapterType, GenerationRequest, GenerationResponse, HealthStatus};

/// Text returned when no outcome is queued.
pub const DEFAULT_RESPONSE: &str = "mock response";

/// A provider that pops pre-configured outcomes from a FIFO queue.
///
/// Queued errors surface as [`ReplybotError::Provider`] with the given
/// message, so quota phrases reach the rate limiter unchanged.
#[derive(Default)]
pub struct MockProvider {
    outcomes: Mutex<VecDeque<Result<GenerationResponse, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load successful responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let outcomes = responses
            .into_iter()
            .map(|text| {
                Ok(GenerationResponse {
                    text,
                    tokens_used: Some(20),
                })
            })
            .collect();
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(GenerationResponse {
            text: text.into(),
            tokens_used: Some(20),
        }));
    }

    /// Queue a response that reports no token usage.
    pub async fn push_unmetered_response(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(GenerationResponse {
            text: text.into(),
            tokens_used: None,
        }));
    }

    pub async fn push_error(&self, message: impl Into<String>) {
        self.outcomes.lock().await.push_back(Err(message.into()));
    }

    /// Every request received so far, in order.
    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplybotError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReplybotError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ReplybotError> {
        self.requests.lock().await.push(request);
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ReplybotError::provider(message)),
            None => Ok(GenerationResponse {
                text: DEFAULT_RESPONSE.to_string(),
                tokens_used: Some(20),
            }),
        }
    }
}
