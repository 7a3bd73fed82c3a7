// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the replybot pipeline.

use thiserror::Error;

/// The primary error type used across all adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum ReplybotError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migrations).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Feed adapter errors (authentication, notification listing, posting).
    #[error("feed error: {message}")]
    Feed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (API failure, quota responses, malformed payloads).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every configured model was refused by the rate limiter or failed.
    #[error("models exhausted: {message}")]
    ModelsExhausted { message: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Work was abandoned because shutdown was requested.
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ReplybotError {
    /// Shorthand for a storage error built from a plain message.
    pub fn storage(message: impl Into<String>) -> Self {
        ReplybotError::Storage {
            source: message.into().into(),
        }
    }

    /// Shorthand for a feed error without an underlying cause.
    pub fn feed(message: impl Into<String>) -> Self {
        ReplybotError::Feed {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a provider error without an underlying cause.
    pub fn provider(message: impl Into<String>) -> Self {
        ReplybotError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
