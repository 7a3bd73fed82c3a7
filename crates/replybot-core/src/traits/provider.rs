// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for language model integrations.

use async_trait::async_trait;

use crate::error::ReplybotError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{GenerationRequest, GenerationResponse};

/// Adapter for a language model API.
///
/// Errors should carry the provider's own message text: the rate limiter
/// inspects it for quota-exhaustion phrases.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends one prompt and returns the first candidate's text.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, ReplybotError>;
}
