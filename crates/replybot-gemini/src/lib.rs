// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gemini provider adapter for the replybot pipeline.
//!
//! Implements [`ProviderAdapter`] for the Gemini REST `generateContent`
//! endpoint. Search grounding is requested per call.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use replybot_config::model::GeminiConfig;
use replybot_core::error::ReplybotError;
use replybot_core::traits::{PluginAdapter, ProviderAdapter};
use replybot_core::types::{AdapterType, GenerationRequest, GenerationResponse, HealthStatus};
use tracing::{debug, info};

use crate::client::GeminiClient;
use crate::types::GenerateContentRequest;

/// Gemini provider implementing [`ProviderAdapter`].
pub struct GeminiProvider {
    client: GeminiClient,
}

impl GeminiProvider {
    /// Creates the provider; fails when no API key is configured.
    pub fn new(config: &GeminiConfig) -> Result<Self, ReplybotError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ReplybotError::Config("gemini.api_key is not set".into()))?;
        let client = GeminiClient::new(
            api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(base_url = %config.base_url, "Gemini provider initialized");
        Ok(Self { client })
    }

    #[cfg(test)]
    fn with_client(client: GeminiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ReplybotError> {
        // No probe call: every request spends quota.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ReplybotError> {
        debug!("Gemini provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ReplybotError> {
        let body =
            GenerateContentRequest::from_prompt(&request.prompt, request.enable_search_grounding);
        let response = self
            .client
            .generate_content(request.model.as_str(), &body)
            .await?;

        Ok(GenerationResponse {
            text: response.first_candidate_text(),
            tokens_used: response.usage_metadata.and_then(|u| u.total_token_count),
        })
    }
}
