// SPDX-FileCopyrightText: 2026 Replybot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Covers constraints serde cannot express: known timezones, sane budgets,
//! non-zero intervals. All errors are collected rather than failing fast.

use std::collections::HashSet;

use chrono_tz::Tz;

use crate::diagnostic::ConfigError;
use crate::model::ReplybotConfig;

/// Smallest post budget that leaves room for content next to a `(99/99)` marker.
const MIN_BUDGET: usize = 20;

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ReplybotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    if config.limiter.timezone.parse::<Tz>().is_err() {
        invalid(format!(
            "limiter.timezone `{}` is not a known IANA timezone",
            config.limiter.timezone
        ));
    }

    if config.limiter.max_consecutive_failures == 0 {
        invalid("limiter.max_consecutive_failures must be at least 1".to_string());
    }

    if config.agent.max_retries == 0 {
        invalid("agent.max_retries must be at least 1".to_string());
    }

    if config.agent.models.is_empty() {
        invalid("agent.models must list at least one model".to_string());
    }

    let mut seen = HashSet::new();
    for model in &config.agent.models {
        if !seen.insert(model) {
            invalid(format!("agent.models lists `{model}` more than once"));
        }
    }

    if config.bluesky.page_size == 0 || config.bluesky.page_size > 100 {
        invalid(format!(
            "bluesky.page_size must be between 1 and 100, got {}",
            config.bluesky.page_size
        ));
    }

    let schedule = &config.schedule;
    for (key, value) in [
        ("schedule.ingest_interval_secs", schedule.ingest_interval_secs),
        ("schedule.worker_interval_secs", schedule.worker_interval_secs),
        ("schedule.dispatch_interval_secs", schedule.dispatch_interval_secs),
        ("schedule.reaper_interval_secs", schedule.reaper_interval_secs),
        ("schedule.stale_timeout_secs", schedule.stale_timeout_secs),
    ] {
        if value == 0 {
            invalid(format!("{key} must be greater than zero"));
        }
    }

    let dispatch = &config.dispatch;
    if dispatch.post_budget < MIN_BUDGET {
        invalid(format!(
            "dispatch.post_budget must be at least {MIN_BUDGET}, got {}",
            dispatch.post_budget
        ));
    }
    if dispatch.thread_budget < MIN_BUDGET {
        invalid(format!(
            "dispatch.thread_budget must be at least {MIN_BUDGET}, got {}",
            dispatch.thread_budget
        ));
    }
    if dispatch.thread_budget > dispatch.post_budget {
        invalid(format!(
            "dispatch.thread_budget ({}) must not exceed dispatch.post_budget ({})",
            dispatch.thread_budget, dispatch.post_budget
        ));
    }
    if dispatch.batch_size == 0 {
        invalid("dispatch.batch_size must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the credentials `serve` needs; other commands run without them.
pub fn validate_credentials(config: &ReplybotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut require = |present: bool, key: &str, env_var: &str| {
        if !present {
            errors.push(ConfigError::MissingCredential {
                key: key.to_string(),
                env_var: env_var.to_string(),
            });
        }
    };

    require(
        config.agent.mention_handle().is_some(),
        "agent.bot_handle",
        "REPLYBOT_AGENT_BOT_HANDLE",
    );
    require(
        non_empty(&config.bluesky.identifier),
        "bluesky.identifier",
        "REPLYBOT_BLUESKY_IDENTIFIER",
    );
    require(
        non_empty(&config.bluesky.app_password),
        "bluesky.app_password",
        "REPLYBOT_BLUESKY_APP_PASSWORD",
    );
    require(
        non_empty(&config.gemini.api_key),
        "gemini.api_key",
        "REPLYBOT_GEMINI_API_KEY",
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
