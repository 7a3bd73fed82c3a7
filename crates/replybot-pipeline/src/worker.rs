// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claims queued jobs and generates their responses.

use std::sync::Arc;
use std::time::Duration;

use replybot_core::types::{
    FailureOutcome, GenerationRequest, GroundingFeature, Job, ModelId,
};
use replybot_core::{JobStore, ProviderAdapter, ReplybotError};
use replybot_limiter::RateLimiter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::schedule::ticker;

/// Response installed when every generation attempt failed.
pub const FALLBACK_RESPONSE: &str =
    "I apologize, but I'm unable to generate a response at this time. Please try again later.";

/// Wraps the mention text in the instructions sent to the model.
pub fn build_prompt(message: &str) -> String {
    format!(
        "You are a helpful AI assistant responding to a message on Bluesky (microblogging social media service).\n\
         Please provide a thoughtful, engaging, and helpful response to the following user message.\n\
         Keep your response concise and appropriate for social media (maximum 300 characters).\n\
         \n\
         User message: \n\
         {message}\n"
    )
}

/// Rough token count for providers that do not report usage.
pub fn estimate_tokens(prompt: &str, response: &str) -> u64 {
    ((prompt.len() + response.len()) / 4) as u64
}

/// A response and the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub text: String,
    pub model: ModelId,
    pub used_grounding: bool,
}

/// What one worker tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Nothing was queued.
    Idle,
    Answered { job_id: i64, model: ModelId },
    Requeued { job_id: i64, retry_count: u32 },
    /// Retries ran out; the job now carries the fallback response.
    FellBack { job_id: i64, retry_count: u32 },
}

pub struct ResponseWorker {
    provider: Arc<dyn ProviderAdapter>,
    store: Arc<dyn JobStore>,
    limiter: Arc<RateLimiter>,
    models: Vec<ModelId>,
    grounding_enabled: bool,
    max_retries: u32,
}

impl ResponseWorker {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        store: Arc<dyn JobStore>,
        limiter: Arc<RateLimiter>,
        models: Vec<ModelId>,
        grounding_enabled: bool,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            store,
            limiter,
            models,
            grounding_enabled,
            max_retries,
        }
    }

    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        info!(models = ?self.models, "response worker started");
        let mut ticker = ticker(period);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "worker tick failed");
                    }
                }
            }
        }
        info!("response worker stopped");
    }

    /// Claims at most one job and drives it to `ready` or back to `queued`.
    pub async fn run_once(&self) -> Result<WorkOutcome, ReplybotError> {
        let Some(job) = self.store.claim_next().await? else {
            return Ok(WorkOutcome::Idle);
        };
        info!(job_id = job.id, author = %job.author_handle, retry_count = job.retry_count, "processing job");
        self.process(&job).await
    }

    async fn process(&self, job: &Job) -> Result<WorkOutcome, ReplybotError> {
        match self.generate(&job.content).await {
            Ok(generated) => {
                self.store
                    .complete_with_response(
                        job.id,
                        &generated.text,
                        generated.model.as_str(),
                        generated.used_grounding,
                    )
                    .await?;
                info!(
                    job_id = job.id,
                    model = %generated.model,
                    grounding = generated.used_grounding,
                    "response ready"
                );
                Ok(WorkOutcome::Answered {
                    job_id: job.id,
                    model: generated.model,
                })
            }
            Err(e) => {
                warn!(job_id = job.id, error = %e, "generation failed");
                let outcome = self
                    .store
                    .mark_failed(job.id, &e.to_string(), self.max_retries, FALLBACK_RESPONSE)
                    .await?;
                Ok(match outcome {
                    FailureOutcome::Requeued { retry_count } => {
                        info!(job_id = job.id, retry_count, "job requeued");
                        WorkOutcome::Requeued {
                            job_id: job.id,
                            retry_count,
                        }
                    }
                    FailureOutcome::Exhausted { retry_count } => {
                        warn!(job_id = job.id, retry_count, "retries exhausted, using fallback response");
                        WorkOutcome::FellBack {
                            job_id: job.id,
                            retry_count,
                        }
                    }
                })
            }
        }
    }

    /// Tries each configured model in order until one produces text.
    pub async fn generate(&self, message: &str) -> Result<Generated, ReplybotError> {
        let prompt = build_prompt(message);
        let mut refusals = Vec::new();

        for &model in &self.models {
            let admission = self.limiter.can_use(model).await;
            if !admission.allowed {
                let reason = admission.reason.unwrap_or_default();
                info!(model = %model, reason = %reason, "model unavailable, trying next");
                refusals.push(format!("{model}: {reason}"));
                continue;
            }

            let grounding = self.grounding_enabled
                && self
                    .limiter
                    .can_use_grounding(GroundingFeature::GoogleSearch)
                    .await;
            debug!(model = %model, grounding, "requesting generation");

            let request = GenerationRequest {
                model,
                prompt: prompt.clone(),
                enable_search_grounding: grounding,
            };
            let response = match self.provider.generate(request).await {
                Ok(response) => response,
                Err(e) => {
                    let message = e.to_string();
                    match self.limiter.record_failure(model, &message).await {
                        Ok(true) => info!(model = %model, "quota error recorded"),
                        Ok(false) => {}
                        Err(pe) => warn!(model = %model, error = %pe, "failed to persist quota failure"),
                    }
                    warn!(model = %model, error = %message, "generation error, trying next model");
                    refusals.push(format!("{model}: {message}"));
                    continue;
                }
            };

            if response.text.trim().is_empty() {
                warn!(model = %model, "empty response, trying next model");
                refusals.push(format!("{model}: empty response"));
                continue;
            }

            let tokens = response
                .tokens_used
                .unwrap_or_else(|| estimate_tokens(&prompt, &response.text));
            if let Err(e) = self.limiter.record_usage(model, tokens).await {
                warn!(model = %model, error = %e, "failed to persist model usage");
            }
            if grounding
                && let Err(e) = self
                    .limiter
                    .record_grounding(GroundingFeature::GoogleSearch)
                    .await
            {
                warn!(error = %e, "failed to persist grounding usage");
            }

            return Ok(Generated {
                text: response.text,
                model,
                used_grounding: grounding,
            });
        }

        Err(ReplybotError::ModelsExhausted {
            message: if refusals.is_empty() {
                "no models configured".to_string()
            } else {
                refusals.join("; ")
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_message_after_instructions() {
        let prompt = build_prompt("explain recursion");
        assert!(prompt.starts_with("You are a helpful AI assistant responding to a message on Bluesky"));
        assert!(prompt.contains("(maximum 300 characters).\n\nUser message: \nexplain recursion\n"));
        assert!(prompt.ends_with("explain recursion\n"));
    }

    #[test]
    fn token_estimate_is_quarter_of_bytes() {
        assert_eq!(estimate_tokens("abcd", "efgh"), 2);
        assert_eq!(estimate_tokens("", "abc"), 0);
    }
}
